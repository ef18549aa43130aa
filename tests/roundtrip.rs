//! End-to-end embedding tests
//!
//! Embeds attachments into executables on disk, reopens them through
//! `Attachments` and strips them again.

use std::fs::{self, File};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use stowaway::{
    compatibility_marker, remove, AttachmentList, Attachments, Embedder, StowError,
};
use tempfile::{tempdir, NamedTempFile};

/// Helper: bytes that look like a compatible executable
fn executable() -> Vec<u8> {
    let mut exe = b"\x7fELF\x02\x01\x01 executable image ".to_vec();
    exe.extend((0..=255u8).cycle().take(4096));
    exe.extend_from_slice(&compatibility_marker());
    exe.extend_from_slice(b" rest of the image");
    exe
}

/// Helper: embed `attachments` into `exe` and store the result in a temp file
fn augmented(exe: &[u8], attachments: Vec<(&str, Vec<u8>)>) -> NamedTempFile {
    let mut out = NamedTempFile::new().unwrap();
    let streams = attachments
        .into_iter()
        .map(|(name, data)| (name, Cursor::new(data)));
    Embedder::new()
        .embed(out.as_file_mut(), &mut Cursor::new(exe), streams)
        .unwrap();
    out
}

fn append(path: &Path, data: &[u8]) {
    let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(data).unwrap();
}

#[test]
fn test_embed_and_open() {
    let file = augmented(
        &executable(),
        vec![
            ("att1", b"att1".to_vec()),
            ("num2", b"2".to_vec()),
            ("3", Vec::new()),
            ("four", vec![0, 1, 2, 3]),
        ],
    );

    let mut att = Attachments::open(file.path()).unwrap();
    assert_eq!(att.count(), 4);
    for name in ["att1", "num2", "3", "four"] {
        assert!(att.names().contains(&name), "missing {name}");
    }

    assert_eq!(att.size("3"), 0);
    let mut empty = Vec::new();
    att.reader("3").unwrap().read_to_end(&mut empty).unwrap();
    assert!(empty.is_empty());

    assert_eq!(att.read("att1").unwrap().unwrap(), b"att1");
    assert_eq!(att.read("num2").unwrap().unwrap(), b"2");
    assert_eq!(att.read("four").unwrap().unwrap(), vec![0, 1, 2, 3]);
    assert!(att.reader("unknown").is_none());

    att.close().unwrap();
    assert!(matches!(att.close(), Err(StowError::AlreadyClosed)));
}

#[test]
fn test_open_ignores_data_appended_later() {
    let file = augmented(
        &executable(),
        vec![
            ("att1", b"first content".to_vec()),
            ("att2", b"second content".to_vec()),
        ],
    );
    append(
        file.path(),
        b"some other content attached later via another application",
    );

    let att = Attachments::open(file.path()).unwrap();
    assert_eq!(att.count(), 2);
    assert_eq!(att.size("att1"), 13);
    assert_eq!(att.size("att2"), 14);
    assert_eq!(att.read("att2").unwrap().unwrap(), b"second content");
}

#[test]
fn test_offsets_point_into_file() {
    let exe = executable();
    let file = augmented(&exe, vec![("blob", vec![0xAB; 1000])]);

    let att = Attachments::open(file.path()).unwrap();
    let offset = att.offset("blob");
    assert!(offset > exe.len() as u64);

    let mut raw = File::open(file.path()).unwrap();
    raw.seek(SeekFrom::Start(offset)).unwrap();
    let mut data = vec![0u8; 1000];
    raw.read_exact(&mut data).unwrap();
    assert!(data.iter().all(|&b| b == 0xAB));
}

#[test]
fn test_open_plain_executable() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&executable()).unwrap();

    let mut att = Attachments::open(file.path()).unwrap();
    assert_eq!(att.count(), 0);
    assert!(att.names().is_empty());
    att.close().unwrap();
}

#[test]
fn test_open_current_executable() {
    // The test binary itself carries no container
    let mut att = Attachments::open_current().unwrap();
    assert_eq!(att.count(), 0);
    assert!(att.names().is_empty());
    att.close().unwrap();
}

#[test]
fn test_remove_restores_executable() {
    let exe = executable();
    let file = augmented(&exe, vec![("a", b"alpha".to_vec()), ("b", vec![9; 300])]);

    let mut restored = Vec::new();
    let bytes = remove(&mut restored, &mut File::open(file.path()).unwrap()).unwrap();
    assert_eq!(bytes, exe.len() as u64);
    assert_eq!(restored, exe);

    // Stripped executables can be augmented again
    let mut again = Vec::new();
    Embedder::new()
        .embed(&mut again, &mut Cursor::new(restored), vec![("c", Cursor::new(vec![1u8]))])
        .unwrap();
}

#[test]
fn test_remove_discards_data_appended_later() {
    let exe = executable();
    let file = augmented(&exe, vec![("a", b"alpha".to_vec())]);
    append(file.path(), b"signature block added by another tool");

    let mut restored = Vec::new();
    remove(&mut restored, &mut File::open(file.path()).unwrap()).unwrap();
    assert_eq!(restored, exe);
}

#[test]
fn test_remove_plain_executable() {
    let mut restored = Vec::new();
    let err = remove(&mut restored, &mut Cursor::new(executable())).unwrap_err();
    assert!(matches!(err, StowError::NothingEmbedded));
}

#[test]
fn test_embed_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.json"), br#"{"debug": true}"#).unwrap();
    fs::write(dir.path().join("logo.bin"), vec![7u8; 2048]).unwrap();
    fs::write(
        dir.path().join("attachments.json"),
        r#"{"config": "config.json", "logo": "logo.bin"}"#,
    )
    .unwrap();

    let list = AttachmentList::load(dir.path().join("attachments.json")).unwrap();
    let mut out = NamedTempFile::new().unwrap();
    let mut messages = Vec::new();
    Embedder::new()
        .progress(|message| messages.push(message.to_string()))
        .embed_files(out.as_file_mut(), &mut Cursor::new(executable()), &list)
        .unwrap();
    assert_eq!(messages.len(), 4);

    let att = Attachments::open(out.path()).unwrap();
    assert_eq!(att.count(), 2);
    assert_eq!(att.read("config").unwrap().unwrap(), br#"{"debug": true}"#);
    assert_eq!(att.size("logo"), 2048);
}

#[test]
fn test_embed_files_missing_source() {
    let dir = tempdir().unwrap();
    let list = AttachmentList::new().with_attachment("gone", dir.path().join("missing.bin"));

    let mut out = Vec::new();
    let err = Embedder::new()
        .embed_files(&mut out, &mut Cursor::new(executable()), &list)
        .unwrap_err();
    match err {
        StowError::AttachmentSource { name, .. } => assert_eq!(name, "gone"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(out.is_empty());
}

#[test]
fn test_embed_twice_rejected() {
    let file = augmented(&executable(), vec![("a", b"alpha".to_vec())]);

    let mut out = Vec::new();
    let err = Embedder::new()
        .embed(
            &mut out,
            &mut File::open(file.path()).unwrap(),
            vec![("b", Cursor::new(b"beta".to_vec()))],
        )
        .unwrap_err();
    assert!(matches!(err, StowError::AlreadyEmbedded));
    assert!(out.is_empty());
}

#[test]
fn test_embed_incompatible_unless_disabled() {
    let packed = b"UPX! packed executable without marker".to_vec();

    let mut out = Vec::new();
    let err = Embedder::new()
        .embed(&mut out, &mut Cursor::new(packed.clone()), vec![("a", Cursor::new(vec![1u8]))])
        .unwrap_err();
    assert!(matches!(err, StowError::Incompatible));

    let mut out = Vec::new();
    Embedder::new()
        .skip_compatibility_check()
        .embed(&mut out, &mut Cursor::new(packed), vec![("a", Cursor::new(vec![1u8]))])
        .unwrap();
    assert!(!out.is_empty());
}

#[test]
fn test_concurrent_readers() {
    let file = augmented(
        &executable(),
        vec![("left", vec![1u8; 64 * 1024]), ("right", vec![2u8; 64 * 1024])],
    );
    let att = Attachments::open(file.path()).unwrap();

    std::thread::scope(|scope| {
        for (name, byte) in [("left", 1u8), ("right", 2u8)] {
            let att = &att;
            scope.spawn(move || {
                let mut reader = att.reader(name).unwrap();
                let mut buf = [0u8; 1000];
                let mut total = 0;
                loop {
                    let n = reader.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    assert!(buf[..n].iter().all(|&b| b == byte));
                    total += n;
                }
                assert_eq!(total, 64 * 1024);
            });
        }
    });
}
