//! Integration tests for the archive-backed loader

mod common;

use common::{archive, corrupt, stored_archive, CountingDefiner};
use std::io::Read;
use std::sync::{Arc, Mutex};
use unitpack_loader::{
    ArchiveModuleLoader, EntryError, ImageDefiner, LoadError, LoadEvent, LoaderConfig, UnitImage,
    UnitSource,
};

#[test]
fn test_load_unit_is_idempotent() {
    let definer = CountingDefiner::new();
    let loader = ArchiveModuleLoader::new(definer.clone());
    loader
        .register_archive(archive(&[("a/B.class", b"bee")]))
        .unwrap();

    let first = loader.load_unit("a.B").unwrap();
    let second = loader.load_unit("a.B").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(definer.calls(), 1);
    assert_eq!(loader.loaded_count(), 1);
}

#[test]
fn test_supports_unit_matches_directory() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    let names = ["a/B.class", "a/C.class", "res/logo.png", "META-INF/MANIFEST.MF"];
    let entries: Vec<(&str, &[u8])> = names.iter().map(|n| (*n, &b"x"[..])).collect();
    loader.register_archive(archive(&entries)).unwrap();

    for name in names {
        assert!(loader.supports_unit(name), "{} should be supported", name);
    }
    assert!(!loader.supports_unit("a/D.class"));
    assert!(!loader.supports_unit("a.B"));
    assert!(!loader.supports_unit(""));
}

#[test]
fn test_extracted_bytes_match_entry() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader
        .register_archive(archive(&[("pkg/Big.class", &payload), ("pkg/Other.class", b"o")]))
        .unwrap();

    loader.load_unit("pkg.Big").unwrap();

    let snapshot = loader.snapshot_extracted_bytes();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(&*snapshot["pkg.Big"], payload.as_slice());
    assert!(!snapshot.contains_key("pkg.Other"));
}

#[test]
fn test_snapshot_is_point_in_time() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader
        .register_archive(archive(&[("A.class", b"a"), ("B.class", b"b")]))
        .unwrap();

    loader.load_unit("A").unwrap();
    let before = loader.snapshot_extracted_bytes();
    loader.load_unit("B").unwrap();

    assert_eq!(before.len(), 1);
    assert_eq!(loader.snapshot_extracted_bytes().len(), 2);
}

#[test]
fn test_first_registered_archive_wins() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    let first = loader
        .register_archive(archive(&[("X.class", b"from-first")]))
        .unwrap();
    loader
        .register_archive(archive(&[("X.class", b"from-second")]))
        .unwrap();

    let unit = loader.load_unit("X").unwrap();
    assert_eq!(unit.bytes(), b"from-first");

    let stream = loader.resolve_resource("X.class").unwrap();
    assert_eq!(stream.archive(), first);
    assert_eq!(stream.into_bytes(), b"from-first");
}

#[test]
fn test_missing_unit_leaves_no_state() {
    let definer = CountingDefiner::new();
    let loader = ArchiveModuleLoader::new(definer.clone());
    loader
        .register_archive(archive(&[("does/Exist.class", b"e")]))
        .unwrap();

    for _ in 0..2 {
        match loader.load_unit("does.not.Exist") {
            Err(LoadError::NotFound {
                unit,
                path,
                consulted,
            }) => {
                assert_eq!(unit, "does.not.Exist");
                assert_eq!(path, "does/not/Exist.class");
                assert_eq!(consulted.len(), 1);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(!loader.is_loaded("does.not.Exist"));
        assert!(loader.snapshot_extracted_bytes().is_empty());
    }
    assert_eq!(definer.calls(), 0);
}

#[test]
fn test_missing_unit_with_no_archives() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());

    let error = loader.load_unit("a.B").unwrap_err();
    assert!(error.is_not_found());
    assert!(error.to_string().contains("0 registered archive(s)"));
}

#[test]
fn test_name_to_path_mapping() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader
        .register_archive(archive(&[("a/B.class", b"bee")]))
        .unwrap();

    assert_eq!(loader.config().unit_path("a.B"), "a/B.class");
    assert_eq!(loader.load_unit("a.B").unwrap().name(), "a.B");
    assert!(loader.load_unit("a.B2").unwrap_err().is_not_found());
    assert!(loader.load_unit("a/B").unwrap_err().is_not_found());
}

#[test]
fn test_entry_path_spelling_is_not_a_second_unit() {
    let definer = CountingDefiner::new();
    let loader = ArchiveModuleLoader::new(definer.clone());
    loader
        .register_archive(archive(&[("a/B.class", b"bee")]))
        .unwrap();

    loader.load_unit("a.B").unwrap();
    assert!(loader.load_unit("a/B").unwrap_err().is_not_found());
    assert!(loader.load_unit("").unwrap_err().is_not_found());

    assert_eq!(definer.calls(), 1);
    assert_eq!(
        loader
            .snapshot_extracted_bytes()
            .into_keys()
            .collect::<Vec<String>>(),
        vec!["a.B".to_string()]
    );
    assert!(loader.package().to_bundle(loader.config()).is_ok());
}

#[test]
fn test_misses_leave_no_pending_slots() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader
        .register_archive(archive(&[("a/B.class", b"bee")]))
        .unwrap();

    for i in 0..1000 {
        assert!(loader.load_unit(&format!("missing.U{i}")).is_err());
    }

    assert_eq!(loader.loaded_count(), 0);
    assert!(format!("{loader:?}").contains("pending: 0"));
}

#[test]
fn test_custom_suffix() {
    let config = LoaderConfig::default().with_unit_suffix(".rbin");
    let loader = ArchiveModuleLoader::with_config(config, ImageDefiner::new());
    loader
        .register_archive(archive(&[("std/io.rbin", b"io"), ("std/io.class", b"wrong")]))
        .unwrap();

    assert_eq!(loader.load_unit("std.io").unwrap().bytes(), b"io");
}

#[test]
fn test_malformed_archive_is_rejected() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader.register_archive(archive(&[("A.class", b"a")])).unwrap();

    assert!(loader.register_archive(b"PK\x03\x04 truncated".to_vec()).is_err());
    assert!(loader.register_archive(Vec::new()).is_err());

    assert_eq!(loader.registry().len(), 1);
    assert!(loader.load_unit("A").is_ok());
}

#[test]
fn test_unreadable_entry_falls_through_to_next_archive() {
    let payload = b"BROKEN-UNIT-PAYLOAD-0001";
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader
        .register_archive(corrupt(stored_archive(&[("a/B.class", payload)]), payload))
        .unwrap();
    let healthy = loader
        .register_archive(archive(&[("a/B.class", b"healthy")]))
        .unwrap();

    let unit = loader.load_unit("a.B").unwrap();
    assert_eq!(unit.bytes(), b"healthy");
    assert_eq!(loader.resolve_resource("a/B.class").unwrap().archive(), healthy);
}

#[test]
fn test_unreadable_entry_everywhere_is_decode_error() {
    let payload = b"BROKEN-UNIT-PAYLOAD-0002";
    let definer = CountingDefiner::new();
    let loader = ArchiveModuleLoader::new(definer.clone());
    loader
        .register_archive(corrupt(stored_archive(&[("a/B.class", payload)]), payload))
        .unwrap();

    for _ in 0..2 {
        match loader.load_unit("a.B") {
            Err(LoadError::Decode { unit, failures, .. }) => {
                assert_eq!(unit, "a.B");
                assert_eq!(failures.len(), 1);
            }
            other => panic!("expected Decode, got {:?}", other),
        }
    }
    assert_eq!(definer.calls(), 0);
    assert!(!loader.is_loaded("a.B"));
    assert!(loader.snapshot_extracted_bytes().is_empty());

    let missing = loader.resolve_resource("a/B.class").unwrap_err();
    assert_eq!(missing.unreadable.len(), 1);
}

#[test]
fn test_entry_size_limit() {
    let config = LoaderConfig::default().with_max_entry_size(Some(8));
    let loader = ArchiveModuleLoader::with_config(config, ImageDefiner::new());
    loader
        .register_archive(archive(&[("Big.class", &[1u8; 64]), ("Small.class", b"tiny")]))
        .unwrap();

    match loader.load_unit("Big") {
        Err(LoadError::Decode { failures, .. }) => {
            assert!(matches!(failures[0].1, EntryError::TooLarge { size: 64, limit: 8, .. }));
        }
        other => panic!("expected Decode, got {:?}", other),
    }
    assert!(loader.load_unit("Small").is_ok());
}

#[test]
fn test_delegate_is_consulted_first() {
    let provided = Arc::new(UnitImage::new("a.B", b"from-parent".to_vec()));
    let parent = Arc::clone(&provided);
    let definer = CountingDefiner::new();
    let loader = ArchiveModuleLoader::new(definer.clone())
        .with_delegate(move |name| (name == "a.B").then(|| Arc::clone(&parent)));
    loader
        .register_archive(archive(&[("a/B.class", b"local"), ("a/C.class", b"c")]))
        .unwrap();

    let unit = loader.load_unit("a.B").unwrap();
    assert!(Arc::ptr_eq(&unit, &provided));
    assert!(loader.is_loaded("a.B"));
    assert!(!loader.snapshot_extracted_bytes().contains_key("a.B"));
    assert_eq!(definer.calls(), 0);

    assert_eq!(loader.load_unit("a.C").unwrap().bytes(), b"c");
    assert_eq!(definer.calls(), 1);
}

#[test]
fn test_resource_streams_are_independent() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader
        .register_archive(archive(&[("conf/app.properties", b"key=value\n")]))
        .unwrap();

    let mut first = loader.resolve_resource("conf/app.properties").unwrap();
    let mut head = [0u8; 3];
    first.read_exact(&mut head).unwrap();

    let mut second = loader.resolve_resource("conf/app.properties").unwrap();
    let mut whole = String::new();
    second.read_to_string(&mut whole).unwrap();

    assert_eq!(&head, b"key");
    assert_eq!(whole, "key=value\n");
    assert_eq!(second.name(), "conf/app.properties");
}

#[test]
fn test_resource_not_found() {
    let loader = ArchiveModuleLoader::new(ImageDefiner::new());
    loader.register_archive(archive(&[("a.txt", b"a")])).unwrap();
    loader.register_archive(archive(&[("b.txt", b"b")])).unwrap();

    let missing = loader.resolve_resource("c.txt").unwrap_err();
    assert_eq!(missing.name, "c.txt");
    assert_eq!(missing.consulted.len(), 2);
    assert!(missing.unreadable.is_empty());
}

#[test]
fn test_event_hook_sees_loads() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let loader = ArchiveModuleLoader::new(ImageDefiner::new()).with_event_hook(move |event| {
        let line = match event {
            LoadEvent::ArchiveRegistered { entries, .. } => format!("registered {}", entries),
            LoadEvent::UnitDefined {
                unit,
                source: UnitSource::Archive(_),
                size,
            } => format!("defined {} {}", unit, size),
            LoadEvent::UnitMissing { unit, .. } => format!("missing {}", unit),
            other => format!("{:?}", other),
        };
        sink.lock().unwrap().push(line);
    });

    loader.register_archive(archive(&[("a/B.class", b"bee")])).unwrap();
    loader.load_unit("a.B").unwrap();
    loader.load_unit("a.B").unwrap();
    let _ = loader.load_unit("a.Z");

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["registered 1", "defined a.B 3", "missing a.Z"]
    );
}
