use std::io::{Cursor, Write};

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use snapshot_archive::load_archive;
use snapshot_fs::{FsError, NodeKind, TreeFs};
use xz2::write::XzEncoder;
use zip::write::FileOptions;

const TEST_MTIME: u64 = 1234567890;

const FLAT_FILE: &[(&str, &[u8])] = &[
    ("foo.txt", b"foo.txt file content"),
    ("bar", b"bar file content"),
    ("empty", b"empty"),
];

const MULTI_LEVEL: &[(&str, &[u8])] = &[
    ("a/b", b"c"),
    ("b", b"d"),
    ("e", b"f"),
    ("g/h/i/j", b"k"),
    ("g/h/i/l", b"mmmmm"),
    ("g/h/n", b"o"),
    ("g/hp", b"r"),
];

const WITH_GZIPED: &[(&str, &[u8])] = &[
    ("a", b"b"),
    ("c.gz", b"dddddddddddddddddddddddddddddddddddddddddddddddddddddd"),
    ("f/g/h.gz", b"iiiiii"),
    ("f/g/j.txt", b"kkkkk"),
];

const WITH_XZIPED: &[(&str, &[u8])] = &[
    ("a", b"b"),
    ("c.xz", b"dddddddddddddddddddddddddddddddddddddddddddddddddddddd"),
    ("f/g/h.xz", b"iiiiii"),
    ("f/g/j.xz", b"kkkkk"),
];

const WITH_BZIPED: &[(&str, &[u8])] = &[
    ("a", b"b"),
    ("c.bz2", b"dddddddddddddddddddddddddddddddddddddddddddddddddddddd"),
    ("f/g/h.bz2", b"iiiiii"),
    ("f/g/j.bz2", b"kkkkk"),
];

fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn xz(content: &[u8]) -> Vec<u8> {
    let mut encoder = XzEncoder::new(Vec::new(), 6);
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn bzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

fn payload_for(path: &str, content: &[u8]) -> Vec<u8> {
    if path.ends_with(".gz") {
        gzip(content)
    } else if path.ends_with(".xz") {
        xz(content)
    } else if path.ends_with(".bz2") {
        bzip(content)
    } else {
        content.to_vec()
    }
}

/// Raw (already-encoded) entries straight into a zip.
fn make_raw_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> = FileOptions::default();
    for (path, content) in entries {
        if path.ends_with('/') {
            writer.add_directory(path.trim_end_matches('/'), options).unwrap();
            continue;
        }
        writer.start_file(*path, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn make_raw_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_mtime(TEST_MTIME);
        if path.ends_with('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_mode(0o755);
            header.set_size(0);
            builder
                .append_data(&mut header, path, std::io::empty())
                .unwrap();
        } else {
            header.set_mode(0o644);
            header.set_size(content.len() as u64);
            builder.append_data(&mut header, path, *content).unwrap();
        }
    }
    builder.into_inner().unwrap()
}

fn make_archive(entries: &[(&str, &[u8])], name: &str) -> Vec<u8> {
    let encoded: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(path, content)| (*path, payload_for(path, content)))
        .collect();
    let raw: Vec<(&str, &[u8])> = encoded
        .iter()
        .map(|(path, payload)| (*path, payload.as_slice()))
        .collect();
    if name.ends_with(".zip") {
        make_raw_zip(&raw)
    } else {
        make_raw_tar(&raw)
    }
}

fn must_new_fs(entries: &[(&str, &[u8])], name: &str) -> TreeFs {
    let bytes = make_archive(entries, name);
    TreeFs::new(load_archive(Cursor::new(bytes), name).unwrap())
}

fn displayed(path: &str) -> &str {
    snapshot_archive::name::strip_codec(path)
}

#[test]
fn open_dir_on_empty_archive() {
    for name in ["archive.tar", "archive.zip"] {
        let fs = must_new_fs(&[], name);
        let entries = fs.open_dir("").unwrap();
        assert!(entries.is_empty(), "{}: expected empty root", name);

        let attr = fs.get_attr("").unwrap();
        assert_eq!(attr.kind, NodeKind::Directory);
    }
}

#[test]
fn open_dir_on_flat_archive() {
    for name in ["archive.tar", "archive.zip"] {
        let fs = must_new_fs(FLAT_FILE, name);
        let entries = fs.open_dir("").unwrap();
        assert_eq!(entries.len(), FLAT_FILE.len());
        for entry in &entries {
            assert!(
                FLAT_FILE.iter().any(|(path, _)| *path == entry.name),
                "{}: unexpected entry '{}'",
                name,
                entry.name
            );
            assert!(entry.is_file);
        }
        assert_eq!(fs.get_attr("empty").unwrap().size, 5);
    }
}

#[test]
fn open_dir_on_a_file_path_is_not_found() {
    for name in ["archive.tar", "archive.zip"] {
        let fs = must_new_fs(FLAT_FILE, name);
        assert!(matches!(fs.open_dir("empty"), Err(FsError::NotFound)));
    }
}

#[test]
fn open_dir_on_multi_level_root_and_subdir() {
    for name in ["archive.tar", "archive.zip"] {
        let fs = must_new_fs(MULTI_LEVEL, name);

        // name -> is_file
        let expected = [("a", false), ("b", true), ("e", true), ("g", false)];
        let entries = fs.open_dir("").unwrap();
        assert_eq!(entries.len(), expected.len());
        for entry in &entries {
            let (_, is_file) = expected
                .iter()
                .find(|(n, _)| *n == entry.name)
                .unwrap_or_else(|| panic!("{}: unexpected entry '{}'", name, entry.name));
            assert_eq!(entry.is_file, *is_file, "{}: kind of '{}'", name, entry.name);
        }

        let expected = [("i", false), ("n", true)];
        let entries = fs.open_dir("g/h").unwrap();
        assert_eq!(entries.len(), expected.len());
        for entry in &entries {
            let (_, is_file) = expected
                .iter()
                .find(|(n, _)| *n == entry.name)
                .unwrap_or_else(|| panic!("{}: unexpected entry '{}'", name, entry.name));
            assert_eq!(entry.is_file, *is_file);
        }
    }
}

#[test]
fn open_returns_decoded_contents() {
    for name in ["archive.tar", "archive.zip"] {
        for entries in [MULTI_LEVEL, WITH_GZIPED, WITH_XZIPED, WITH_BZIPED] {
            let fs = must_new_fs(entries, name);
            for (path, content) in entries {
                let bytes = fs.open(displayed(path)).unwrap_or_else(|e| {
                    panic!("{}: open '{}' failed: {}", name, displayed(path), e)
                });
                assert_eq!(bytes, *content, "{}: content of '{}'", name, path);
            }
        }
    }
}

#[test]
fn get_attr_reports_file_sizes() {
    for name in ["archive.tar", "archive.zip"] {
        for entries in [MULTI_LEVEL, WITH_GZIPED, WITH_XZIPED, WITH_BZIPED] {
            let fs = must_new_fs(entries, name);
            for (path, content) in entries {
                let attr = fs.get_attr(displayed(path)).unwrap();
                assert_eq!(attr.kind, NodeKind::File);
                assert_eq!(attr.size, content.len() as u64, "{}: '{}'", name, path);
                assert_eq!(attr.perm(), 0o555);
            }
            let root = fs.get_attr("").unwrap();
            assert_eq!(root.kind, NodeKind::Directory);
            assert_eq!(root.perm(), 0o755);
        }
    }
}

#[test]
fn explicit_directories_list_their_children() {
    let with_dirs: &[(&str, &[u8])] = &[("a/", b""), ("a/b", b"c"), ("d/", b"")];
    for name in ["archive.tar", "archive.zip"] {
        let fs = must_new_fs(with_dirs, name);
        let entries = fs.open_dir("a").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "b");
        assert!(entries[0].is_file);

        assert!(fs.open_dir("d").unwrap().is_empty());
    }
}

#[test]
fn missing_paths_are_not_found() {
    for name in ["archive.tar", "archive.zip"] {
        let fs = must_new_fs(MULTI_LEVEL, name);
        assert!(matches!(
            fs.open_dir("aaaaaaaaaaaaaa"),
            Err(FsError::NotFound)
        ));
        assert!(matches!(fs.open("aaaaaaaaaaaaaa"), Err(FsError::NotFound)));
        assert!(matches!(
            fs.get_attr("aaaaaaaaaaaaaa"),
            Err(FsError::NotFound)
        ));
    }
}

#[test]
fn undecodable_file_degrades_gracefully() {
    // The entry claims gzip by extension but holds plain text.
    let fs = TreeFs::new(
        load_archive(
            Cursor::new(make_raw_zip(&[("foo.gz", b"malformed")])),
            "archive.zip",
        )
        .unwrap(),
    );

    match fs.open("foo") {
        Err(FsError::Io(_)) => {}
        other => panic!("expected IO error, got {:?}", other.map(|b| b.len())),
    }

    // get_attr swallows the decode failure and reports size zero.
    let attr = fs.get_attr("foo").unwrap();
    assert_eq!(attr.kind, NodeKind::File);
    assert_eq!(attr.size, 0);
}

#[test]
fn nested_zip_is_browsable() {
    let inner = make_archive(MULTI_LEVEL, "inner.zip");
    let outer = make_raw_zip(&[("a/d.zip", inner.as_slice()), ("e", b"f")]);
    let fs = TreeFs::new(load_archive(Cursor::new(outer), "outer.zip").unwrap());

    assert_eq!(fs.get_attr("a/d").unwrap().kind, NodeKind::Directory);
    let attr = fs.get_attr("a/d/b").unwrap();
    assert_eq!(attr.kind, NodeKind::File);
    assert_eq!(fs.open("a/d/b").unwrap(), b"c");
    assert_eq!(fs.open("e").unwrap(), b"f");
}

#[test]
fn nested_tar_is_browsable() {
    let inner = make_archive(MULTI_LEVEL, "inner.tar");
    let outer = make_raw_tar(&[("a/d.tar", inner.as_slice()), ("e", b"f")]);
    let fs = TreeFs::new(load_archive(Cursor::new(outer), "outer.tar").unwrap());

    assert_eq!(fs.get_attr("a/d").unwrap().kind, NodeKind::Directory);
    assert_eq!(fs.open("a/d/b").unwrap(), b"c");
    assert_eq!(fs.open("a/d/g/h/i/l").unwrap(), b"mmmmm");
}

#[test]
fn codec_collision_preserves_both_entries() {
    let gz = gzip(b"B");
    let fs = TreeFs::new(
        load_archive(
            Cursor::new(make_raw_zip(&[("x", b"A"), ("x.gz", gz.as_slice())])),
            "archive.zip",
        )
        .unwrap(),
    );

    let mut names: Vec<String> = fs.open_dir("").unwrap().into_iter().map(|e| e.name).collect();
    names.sort_unstable();
    assert_eq!(names, ["x", "x.gz"]);

    assert_eq!(fs.open("x").unwrap(), b"A");
    assert_eq!(fs.open("x.gz").unwrap(), b"B");
}

#[test]
fn tar_mtime_is_surfaced_in_attributes() {
    let fs = must_new_fs(MULTI_LEVEL, "archive.tar");
    let attr = fs.get_attr("a/b").unwrap();
    assert_eq!(attr.mtime, TEST_MTIME);

    let dir = fs.get_attr("a").unwrap();
    assert_eq!(dir.mtime, 0);

    let fs = must_new_fs(MULTI_LEVEL, "archive.zip");
    assert_eq!(fs.get_attr("a/b").unwrap().mtime, 0);
}
