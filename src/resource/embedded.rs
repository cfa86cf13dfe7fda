use anyhow::Result;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Cursor, Read};

use super::ResourceBundle;

/// Bundle of resources held in memory, typically filled with `include_bytes!`:
///
/// ```ignore
/// let bundle = EmbeddedBundle::new().with(
///     "/native/linux/x86_64/libNRJavaSerial.so",
///     include_bytes!("../native/linux/x86_64/libNRJavaSerial.so"),
/// );
/// ```
#[derive(Default, Clone)]
pub struct EmbeddedBundle {
    entries: HashMap<String, Cow<'static, [u8]>>,
}

impl EmbeddedBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource under its absolute resource path.
    pub fn with(mut self, resource_path: &str, bytes: impl Into<Cow<'static, [u8]>>) -> Self {
        self.insert(resource_path, bytes);
        self
    }

    pub fn insert(&mut self, resource_path: &str, bytes: impl Into<Cow<'static, [u8]>>) {
        let key = format!("/{}", super::relative(resource_path));
        self.entries.insert(key, bytes.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceBundle for EmbeddedBundle {
    fn describe(&self) -> String {
        format!("embedded bundle ({} resources)", self.entries.len())
    }

    fn open(&self, resource_path: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let key = format!("/{}", super::relative(resource_path));
        Ok(self.entries.get(&key).map(|bytes| {
            let reader: Box<dyn Read + Send> = Box::new(Cursor::new(bytes.clone().into_owned()));
            reader
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_bundle_normalizes_leading_slash() {
        let bundle = EmbeddedBundle::new()
            .with("native/osx/libFoo.jnilib", b"macho".as_slice())
            .with("/native/linux/PPC/libFoo.so", vec![1u8, 2, 3]);
        assert_eq!(bundle.len(), 2);

        let mut reader = bundle.open("/native/osx/libFoo.jnilib").unwrap().unwrap();
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).unwrap();
        assert_eq!(bytes, b"macho");

        assert!(bundle.open("native/linux/PPC/libFoo.so").unwrap().is_some());
        assert!(bundle.open("/native/linux/ARM/libFoo.so").unwrap().is_none());
    }
}
