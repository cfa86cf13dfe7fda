//! Describe native binaries with goblin.
//!
//! Used for diagnostics: when a bundled driver refuses to load, knowing that
//! it is a 32-bit ARM ELF on an x86_64 host usually explains why.

use anyhow::{Context, Result, bail};
use goblin::Object;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryFormat {
    Elf,
    Pe,
    MachO,
    MachOUniversal,
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinaryInfo {
    pub format: BinaryFormat,
    /// Machine architecture as named by the object format, e.g. "X86_64" or "ARM"
    pub arch: String,
    /// 32 or 64, 0 when not applicable
    pub bits: u8,
    /// Whether the object is a loadable library rather than an executable
    pub is_library: bool,
}

impl fmt::Display for BinaryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_library { "library" } else { "object" };
        match self.bits {
            0 => write!(f, "{:?} {} ({})", self.format, kind, self.arch),
            bits => write!(f, "{:?} {}-bit {} ({})", self.format, bits, kind, self.arch),
        }
    }
}

/// Identify the object format and target architecture of `bytes`.
pub fn describe(bytes: &[u8]) -> Result<BinaryInfo> {
    let object = Object::parse(bytes).context("Failed to parse native binary")?;
    let info = match object {
        Object::Elf(elf) => BinaryInfo {
            format: BinaryFormat::Elf,
            arch: goblin::elf::header::machine_to_str(elf.header.e_machine).to_string(),
            bits: if elf.is_64 { 64 } else { 32 },
            is_library: elf.header.e_type == goblin::elf::header::ET_DYN,
        },
        Object::PE(pe) => BinaryInfo {
            format: BinaryFormat::Pe,
            arch: pe_machine_name(pe.header.coff_header.machine).to_string(),
            bits: if pe.is_64 { 64 } else { 32 },
            is_library: pe.is_lib,
        },
        Object::Mach(goblin::mach::Mach::Binary(macho)) => BinaryInfo {
            format: BinaryFormat::MachO,
            arch: goblin::mach::cputype::get_arch_name_from_types(
                macho.header.cputype,
                macho.header.cpusubtype,
            )
            .unwrap_or("unknown")
            .to_string(),
            bits: if macho.is_64 { 64 } else { 32 },
            is_library: matches!(
                macho.header.filetype,
                goblin::mach::header::MH_DYLIB | goblin::mach::header::MH_BUNDLE
            ),
        },
        Object::Mach(goblin::mach::Mach::Fat(fat)) => BinaryInfo {
            format: BinaryFormat::MachOUniversal,
            arch: format!("{} architectures", fat.narches),
            bits: 0,
            is_library: true,
        },
        Object::Archive(_) => BinaryInfo {
            format: BinaryFormat::Archive,
            arch: "static archive".to_string(),
            bits: 0,
            is_library: false,
        },
        _ => bail!("Unrecognised native binary format"),
    };
    Ok(info)
}

fn pe_machine_name(machine: u16) -> &'static str {
    match machine {
        0x014c => "X86",
        0x8664 => "X86_64",
        0x01c0 | 0x01c4 => "ARM",
        0xaa64 => "ARM64",
        _ => "unknown",
    }
}
