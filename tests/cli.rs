use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn cli_create_list_stat_extract_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let tree = work.path().join("tree");
    fs::create_dir_all(tree.join("nested"))?;
    fs::write(tree.join("file1.txt"), "Hello, this is the first file.\n")?;
    fs::write(tree.join("file2.log"), "Some log data here.\n")?;
    fs::write(tree.join("nested/data.bin"), [0u8, 1, 2, 3, 4, 5])?;

    let archive_dir = tempdir()?;
    let archive_path = archive_dir.path().join("test.parz");

    // Create, with inputs relative to the working directory so the archive
    // paths stay short.
    let mut cmd = Command::cargo_bin("parz")?;
    cmd.current_dir(work.path())
        .arg("create")
        .arg("--output")
        .arg(&archive_path)
        .arg("--codec")
        .arg("deflate")
        .arg("tree");
    cmd.assert().success();
    assert!(archive_path.exists());

    let mut cmd = Command::cargo_bin("parz")?;
    cmd.arg("list").arg(&archive_path);
    cmd.assert().success().stdout(
        predicate::str::contains("tree/file1.txt")
            .and(predicate::str::contains("tree/file2.log"))
            .and(predicate::str::contains("tree/nested/data.bin")),
    );

    let mut cmd = Command::cargo_bin("parz")?;
    cmd.arg("stat").arg(&archive_path);
    cmd.assert().success().stdout(
        predicate::str::contains("compressor: deflate").and(predicate::str::contains("total:")),
    );

    let extract_dir = tempdir()?;
    let mut cmd = Command::cargo_bin("parz")?;
    cmd.arg("extract")
        .arg(&archive_path)
        .arg("-o")
        .arg(extract_dir.path())
        .arg("-y");
    cmd.assert().success();

    let restored = extract_dir.path().join("tree");
    assert_eq!(
        fs::read(restored.join("file1.txt"))?,
        fs::read(tree.join("file1.txt"))?
    );
    assert_eq!(
        fs::read(restored.join("file2.log"))?,
        fs::read(tree.join("file2.log"))?
    );
    assert_eq!(
        fs::read(restored.join("nested/data.bin"))?,
        fs::read(tree.join("nested/data.bin"))?
    );

    Ok(())
}

#[test]
fn cli_rejects_a_non_archive() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let not_archive = work.path().join("junk.bin");
    fs::write(&not_archive, b"PK\x03\x04 definitely not ours")?;

    let mut cmd = Command::cargo_bin("parz")?;
    cmd.arg("list").arg(&not_archive);
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("is not a parz archive"));

    Ok(())
}

#[test]
fn cli_create_without_inputs_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("parz")?;
    cmd.arg("create").arg("--output").arg("x.parz");
    cmd.assert().failure();
    Ok(())
}

#[test]
fn cli_compress_failure_exits_with_the_compress_code() -> Result<(), Box<dyn std::error::Error>> {
    let work = tempdir()?;
    let archive_path = work.path().join("test.parz");

    let mut cmd = Command::cargo_bin("parz")?;
    cmd.arg("create")
        .arg("--output")
        .arg(&archive_path)
        .arg(work.path().join("does-not-exist"));
    cmd.assert().failure().code(2);
    assert!(!archive_path.exists());

    Ok(())
}
