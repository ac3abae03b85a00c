use parz::compressor::{Codec, BLOCK_SIZE};
use parz::error::ArchiveError;
use parz::extract::{self, OverwriteChoice, OverwritePrompt, ReplaceAll, RestoreOptions};
use parz::{compress, stat, Archive};

use rand::{thread_rng, Rng};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::tempdir;

fn write_random_file(path: &Path, len: usize) {
    let mut rng = thread_rng();
    let buf: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect();
    fs::write(path, buf).unwrap();
}

/// Where a restored entry lands for an absolute input path.
fn restored_path(out_dir: &Path, disk_path: &Path) -> PathBuf {
    out_dir.join(parz::walk::normalize_arc_path(disk_path))
}

fn pack(archive_path: &Path, codec: Codec, level: u32, inputs: &[PathBuf]) {
    let archive = Archive::create(archive_path, codec, level).unwrap();
    compress::create(&archive, inputs).unwrap();
}

fn unpack(archive_path: &Path, out_dir: &Path) -> extract::RestoreReport {
    let archive = Archive::open(archive_path).unwrap();
    let opts = RestoreOptions::new(out_dir);
    extract::restore(&archive, &opts, &mut ReplaceAll).unwrap()
}

#[test]
fn roundtrip_boundary_lengths_all_codecs() {
    let sizes = [0, 1, BLOCK_SIZE - 1, BLOCK_SIZE, BLOCK_SIZE + 1, 3 * BLOCK_SIZE + 12345];

    for codec in [Codec::Store, Codec::Deflate, Codec::Lz4, Codec::Zlib] {
        let src = tempdir().unwrap();
        let tree = src.path().join("tree");
        fs::create_dir(&tree).unwrap();
        for (i, size) in sizes.iter().enumerate() {
            write_random_file(&tree.join(format!("f{}.dat", i)), *size);
        }

        let arch = tempdir().unwrap();
        let archive_path = arch.path().join("test.parz");
        pack(&archive_path, codec, 6, &[tree.clone()]);

        let out = tempdir().unwrap();
        let report = unpack(&archive_path, out.path());
        assert!(report.damaged.is_empty(), "{codec}");

        for (i, size) in sizes.iter().enumerate() {
            let original = tree.join(format!("f{}.dat", i));
            let restored = restored_path(out.path(), &original);
            let data = fs::read(&restored).unwrap();
            assert_eq!(data.len(), *size, "{codec} f{}", i);
            assert_eq!(data, fs::read(&original).unwrap(), "{codec} f{}", i);
        }
    }
}

#[test]
fn flipped_data_byte_is_reported_not_fatal() {
    let src = tempdir().unwrap();
    let file = src.path().join("victim.bin");
    write_random_file(&file, BLOCK_SIZE + 77);

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Store, 0, &[file.clone()]);

    // The archive ends with the last stream's checksum.
    let mut bytes = fs::read(&archive_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&archive_path, &bytes).unwrap();

    let out = tempdir().unwrap();
    let report = unpack(&archive_path, out.path());
    assert_eq!(report.damaged, vec![parz::walk::normalize_arc_path(&file)]);

    // Without the integrity pre-check the partial output stays on disk.
    let restored = restored_path(out.path(), &file);
    assert!(restored.exists());
    assert_eq!(fs::read(&restored).unwrap(), fs::read(&file).unwrap());

    // With it, the damaged entry is skipped before anything is written.
    let archive = Archive::open(&archive_path).unwrap();
    let checked_out = tempdir().unwrap();
    let mut opts = RestoreOptions::new(checked_out.path());
    opts.integrity = true;
    let report = extract::restore(&archive, &opts, &mut ReplaceAll).unwrap();
    assert_eq!(report.damaged.len(), 1);
    assert!(!restored_path(checked_out.path(), &file).exists());
}

#[test]
fn flipped_header_byte_is_a_format_error() {
    let src = tempdir().unwrap();
    let file = src.path().join("a.txt");
    fs::write(&file, b"content").unwrap();

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Deflate, 6, &[file]);

    let mut bytes = fs::read(&archive_path).unwrap();
    bytes[4] ^= 0x10; // entry count
    fs::write(&archive_path, &bytes).unwrap();

    let archive = Archive::open(&archive_path).unwrap();
    let err = archive.read_entries().unwrap_err();
    assert!(matches!(err, ArchiveError::Format(_)));

    // A broken magic number is rejected by name at open time.
    bytes[0] ^= 0xff;
    fs::write(&archive_path, &bytes).unwrap();
    let err = Archive::open(&archive_path).unwrap_err();
    assert!(err.to_string().contains("is not a parz archive"));
}

#[test]
fn duplicate_inputs_are_archived_once() {
    let src = tempdir().unwrap();
    let file = src.path().join("once.txt");
    fs::write(&file, b"only one of me").unwrap();

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Lz4, 0, &[file.clone(), file.clone(), file]);

    let archive = Archive::open(&archive_path).unwrap();
    let entries = stat::list(&archive).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn empty_file_stream_is_sentinel_and_crc_only() {
    let src = tempdir().unwrap();
    let file = src.path().join("empty");
    fs::write(&file, b"").unwrap();

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Zlib, 6, &[file.clone()]);

    let arc_path = parz::walk::normalize_arc_path(&file);
    // prelude (7) + file header (tag + path prefix + path + times + size) +
    // stream (sentinel + crc)
    let header_len = 1 + 2 + arc_path.len() + 16 + 8;
    let expected = 7 + header_len + 12;
    assert_eq!(fs::metadata(&archive_path).unwrap().len(), expected as u64);
}

#[test]
fn no_entries_is_an_error() {
    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    let archive = Archive::create(&archive_path, Codec::Deflate, 6).unwrap();
    let err = compress::create(&archive, &[]).unwrap_err();
    assert!(err.to_string().contains("no entries"));
    assert!(!archive_path.exists());
}

struct Canned(OverwriteChoice);

impl OverwritePrompt for Canned {
    fn ask(&mut self, _path: &Path) -> OverwriteChoice {
        self.0
    }
}

#[test]
fn overwrite_prompt_skip_keeps_the_existing_file() {
    let src = tempdir().unwrap();
    let file = src.path().join("kept.txt");
    fs::write(&file, b"from the archive").unwrap();

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Deflate, 6, &[file.clone()]);

    let out = tempdir().unwrap();
    unpack(&archive_path, out.path());

    let restored = restored_path(out.path(), &file);
    fs::write(&restored, b"local edits").unwrap();

    let archive = Archive::open(&archive_path).unwrap();
    let opts = RestoreOptions::new(out.path());

    let report = extract::restore(&archive, &opts, &mut Canned(OverwriteChoice::Skip)).unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(fs::read(&restored).unwrap(), b"local edits");

    let report = extract::restore(&archive, &opts, &mut Canned(OverwriteChoice::Replace)).unwrap();
    assert_eq!(report.restored.len(), 1);
    assert_eq!(fs::read(&restored).unwrap(), b"from the archive");
}

#[cfg(unix)]
#[test]
fn end_to_end_tree_with_symlink_and_empty_dir() {
    let src = tempdir().unwrap();
    let tree = src.path().join("tree");
    fs::create_dir(&tree).unwrap();

    let big = tree.join("ALPHA.bin");
    fs::write(&big, vec![0x42u8; 3 * 1024 * 1024]).unwrap();
    fs::create_dir(tree.join("beta")).unwrap();
    std::os::unix::fs::symlink("ALPHA.bin", tree.join("gamma")).unwrap();

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Deflate, 6, &[tree.clone()]);

    let out = tempdir().unwrap();
    let report = unpack(&archive_path, out.path());
    assert!(report.damaged.is_empty());

    let restored_tree = restored_path(out.path(), &tree);
    assert_eq!(
        fs::read(restored_tree.join("ALPHA.bin")).unwrap(),
        vec![0x42u8; 3 * 1024 * 1024]
    );
    assert!(restored_tree.join("beta").is_dir());
    let target = fs::read_link(restored_tree.join("gamma")).unwrap();
    assert_eq!(target, PathBuf::from("ALPHA.bin"));

    // Modification time survives the round trip at second resolution.
    let secs = |p: &Path| {
        fs::metadata(p)
            .unwrap()
            .modified()
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    };
    assert_eq!(secs(&big), secs(&restored_tree.join("ALPHA.bin")));

    // Listing is case-insensitive on the archive path.
    let archive = Archive::open(&archive_path).unwrap();
    let names: Vec<String> = stat::list(&archive)
        .unwrap()
        .iter()
        .map(|e| e.arc_path().rsplit('/').next().unwrap().to_string())
        .collect();
    let inner: Vec<String> = names.into_iter().filter(|n| n != "tree").collect();
    assert_eq!(inner, ["ALPHA.bin", "beta", "gamma"]);
}

#[test]
fn stat_reports_sizes_and_checksums() {
    let src = tempdir().unwrap();
    let file = src.path().join("data.bin");
    write_random_file(&file, 2 * BLOCK_SIZE);

    let arch = tempdir().unwrap();
    let archive_path = arch.path().join("test.parz");
    pack(&archive_path, Codec::Deflate, 6, &[file.clone()]);

    let archive = Archive::open(&archive_path).unwrap();
    let stat = stat::scan(&archive).unwrap();
    assert_eq!(stat.uncompressed, 2 * BLOCK_SIZE as u64);
    assert!(stat.compressed > 0 && stat.compressed < stat.uncompressed);

    let text = stat.render();
    assert!(text.contains("compressor: deflate"));
    assert!(text.contains("data.bin"));
}
