use assert_cmd::Command;
use assert_cmd::cargo;
use predicates::prelude::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::tempdir;
use zip::write::SimpleFileOptions;

fn nrserial() -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("nrserial"));
    cmd.env_remove("NRSERIAL_BUNDLE")
        .env_remove("NRSERIAL_TMPDIR")
        .env("NRSERIAL_OS_NAME", "Linux")
        .env("NRSERIAL_OS_ARCH", "amd64");
    cmd
}

fn create_bundle_dir(root: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let file = root.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
    }
}

fn create_jar(path: &Path, files: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, content) in files {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_platform_text() {
    nrserial()
        .arg("platform")
        .assert()
        .success()
        .stdout(predicate::str::contains("linux/x86_64"))
        .stdout(predicate::str::contains(".so"));
}

#[test]
fn test_platform_json() {
    nrserial()
        .env("NRSERIAL_OS_NAME", "Windows 10")
        .env("NRSERIAL_OS_ARCH", "x86")
        .args(["platform", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""subpath": "windows/x86_32""#))
        .stdout(predicate::str::contains(r#""extension": ".dll""#));
}

#[test]
fn test_platform_unsupported() {
    nrserial()
        .env("NRSERIAL_OS_NAME", "SunOS")
        .env("NRSERIAL_OS_ARCH", "sparcv9")
        .arg("platform")
        .assert()
        .success()
        .stdout(predicate::str::contains("unsupported"));
}

#[test]
fn test_locate_in_directory_bundle() {
    let bundle = tempdir().unwrap();
    create_bundle_dir(
        bundle.path(),
        &[("native/linux/x86_64/libFoo_legacy.so", "\x7fELF legacy")],
    );

    nrserial()
        .args(["locate", "libFoo", "--bundle"])
        .arg(bundle.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("missing /native/linux/x86_64/libFoo.so"))
        .stdout(predicate::str::contains(
            "found   /native/linux/x86_64/libFoo_legacy.so",
        ));
}

#[test]
fn test_locate_nothing_bundled() {
    let bundle = tempdir().unwrap();

    nrserial()
        .args(["locate", "libFoo"])
        .env("NRSERIAL_BUNDLE", bundle.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No bundled libFoo for platform linux/x86_64"));
}

#[test]
fn test_locate_arm_lists_variants_in_order() {
    let bundle = tempdir().unwrap();
    create_bundle_dir(bundle.path(), &[("native/linux/ARM/libFoov6.so", "v6")]);

    let output = nrserial()
        .env("NRSERIAL_OS_ARCH", "armv7l")
        .args(["locate", "libFoo", "--bundle"])
        .arg(bundle.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0], "missing /native/linux/ARM/libFoov5.so");
    assert_eq!(lines[2], "found   /native/linux/ARM/libFoov6.so");
    assert_eq!(lines[5], "missing /native/linux/ARM/libFoo_legacy.so");
}

#[test]
fn test_stage_from_directory_bundle() {
    let bundle = tempdir().unwrap();
    let staging = tempdir().unwrap();
    create_bundle_dir(
        bundle.path(),
        &[("native/linux/x86_64/libFoo.so", "\x7fELF driver")],
    );

    let output = nrserial()
        .args(["stage", "libFoo", "--bundle"])
        .arg(bundle.path())
        .arg("--tmpdir")
        .arg(staging.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let staged = String::from_utf8(output).unwrap().trim().to_string();
    let staged = Path::new(&staged);
    assert!(staged.starts_with(staging.path()));
    assert!(staged.ends_with("libFoo.so"));
    assert!(
        staged
            .parent()
            .unwrap()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("libFoo_")
    );
    assert_eq!(fs::read(staged).unwrap(), b"\x7fELF driver");
}

#[test]
fn test_stage_from_jar_bundle() {
    let work = tempdir().unwrap();
    let jar = work.path().join("app.jar");
    create_jar(
        &jar,
        &[
            ("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ("native/osx/libFoo.jnilib", "mach-o bytes"),
        ],
    );

    let output = nrserial()
        .env("NRSERIAL_OS_NAME", "Mac OS X")
        .env("NRSERIAL_OS_ARCH", "x86_64")
        .env("NRSERIAL_TMPDIR", work.path())
        .args(["stage", "libFoo", "--bundle"])
        .arg(&jar)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let staged = String::from_utf8(output).unwrap().trim().to_string();
    assert!(staged.ends_with("libFoo.jnilib"));
    assert_eq!(fs::read(&staged).unwrap(), b"mach-o bytes");
}

#[test]
fn test_stage_missing_library_fails() {
    let bundle = tempdir().unwrap();
    let staging = tempdir().unwrap();

    nrserial()
        .args(["stage", "libFoo", "--bundle"])
        .arg(bundle.path())
        .arg("--tmpdir")
        .arg(staging.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to stage for libFoo"));
}

#[test]
fn test_stage_without_usable_tmpdir_fails() {
    let bundle = tempdir().unwrap();
    let work = tempdir().unwrap();
    let blocked = work.path().join("blocked");
    fs::write(&blocked, "not a directory").unwrap();
    create_bundle_dir(
        bundle.path(),
        &[("native/linux/x86_64/libFoo.so", "\x7fELF driver")],
    );

    nrserial()
        .args(["stage", "libFoo", "--bundle"])
        .arg(bundle.path())
        .arg("--tmpdir")
        .arg(&blocked)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to deploy native resource libFoo"));
}

#[test]
fn test_inspect_rejects_garbage() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("libFoo.so");
    fs::write(&file, "this is not a shared object").unwrap();

    nrserial()
        .arg("inspect")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to inspect"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_inspect_own_binary() {
    let exe = cargo::cargo_bin!("nrserial");

    nrserial()
        .arg("inspect")
        .arg(exe)
        .assert()
        .success()
        .stdout(predicate::str::contains("Elf"));
}

#[test]
fn test_load_with_bad_userlib_fails_without_fallback() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("libNothingHere.so");

    nrserial()
        .env("NRSERIAL_TMPDIR", dir.path())
        .args(["load", "libFoo", "--userlib"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Unable to load native resource from given path",
        ))
        .stderr(predicate::str::contains("libNothingHere.so"));
}

#[test]
fn test_load_reports_every_attempt_when_exhausted() {
    let bundle = tempdir().unwrap();
    let staging = tempdir().unwrap();
    create_bundle_dir(
        bundle.path(),
        &[("native/linux/x86_64/libNrserialTest.so", "not an elf")],
    );

    nrserial()
        .env("NRSERIAL_TMPDIR", staging.path())
        .args(["load", "libNrserialTest", "--bundle"])
        .arg(bundle.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Unable to load deployed native resource libNrserialTest for platform linux/x86_64",
        ))
        .stderr(predicate::str::contains("bundled libNrserialTest_legacy"))
        .stderr(predicate::str::contains("system NrserialTest"));
}
