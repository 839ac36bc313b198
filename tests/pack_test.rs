//! Pack reading through the database: lookup, delta chains, verification

mod common;

use common::PackBuilder;
use gitodb::{HashAlgorithm, ObjectDatabase, ObjectKind, OdbError, OdbOptions, Oid, PackIndex};
use tempfile::TempDir;

fn objects_dir(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("objects")
}

#[test]
fn packed_objects_read_back_bit_exact() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    // 500 distinct blobs, as the reference contents.
    let payloads: Vec<Vec<u8>> = (0..500)
        .map(|i| format!("packed object number {} with some body text", i).into_bytes())
        .collect();
    let mut expected = Vec::new();
    for payload in &payloads {
        let (_, oid) = builder.add_base(ObjectKind::Blob, payload);
        expected.push((oid, payload.clone()));
    }

    builder.write_into(&objects_dir(&dir), false);
    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();

    assert_eq!(db.pack_count(), 1);
    for (oid, payload) in &expected {
        assert!(db.exists(oid));
        let (kind, bytes) = db.read_raw(oid).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(&bytes, payload);
        // The content re-hashes to the index's identifier.
        assert_eq!(Oid::for_object(HashAlgorithm::Sha1, kind, &bytes), *oid);
    }

    let packed: Vec<Oid> = db.iter_packed().unwrap().collect();
    assert_eq!(packed.len(), 500);
    assert!(packed.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn ofs_delta_chains_reconstruct() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    let v1 = b"fn main() { println!(\"one\"); }\n".to_vec();
    let mut v2 = v1.clone();
    v2.extend_from_slice(b"// second revision\n");
    let mut v3 = v2.clone();
    v3.extend_from_slice(b"// third revision\n");

    let (base_index, base_oid) = builder.add_base(ObjectKind::Blob, &v1);
    let (mid_index, mid_oid) = builder.add_ofs_delta(base_index, ObjectKind::Blob, &v1, &v2);
    let (_, tip_oid) = builder.add_ofs_delta(mid_index, ObjectKind::Blob, &v2, &v3);

    builder.write_into(&objects_dir(&dir), false);
    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();

    assert_eq!(db.read_raw(&base_oid).unwrap().1, v1);
    assert_eq!(db.read_raw(&mid_oid).unwrap().1, v2);
    assert_eq!(db.read_raw(&tip_oid).unwrap().1, v3);

    // Deltas inherit the effective type of the chain's base.
    assert_eq!(db.read_raw(&tip_oid).unwrap().0, ObjectKind::Blob);
}

#[test]
fn ref_delta_resolves_against_loose_base() {
    let dir = TempDir::new().unwrap();
    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();

    let base_payload = b"loose base object contents".to_vec();
    let base_oid = db.write(ObjectKind::Blob, &base_payload).unwrap();

    let mut derived = base_payload.clone();
    derived.extend_from_slice(b" plus packed delta");

    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);
    let (_, derived_oid) =
        builder.add_ref_delta(base_oid, ObjectKind::Blob, &base_payload, &derived);
    builder.write_into(&objects_dir(&dir), false);
    db.reload().unwrap();

    let (kind, bytes) = db.read_raw(&derived_oid).unwrap();
    assert_eq!(kind, ObjectKind::Blob);
    assert_eq!(bytes, derived);
}

#[test]
fn ref_delta_across_packs() {
    let dir = TempDir::new().unwrap();

    let base_payload = b"base stored in the first pack".to_vec();
    let mut builder_a = PackBuilder::new(HashAlgorithm::Sha1);
    let (_, base_oid) = builder_a.add_base(ObjectKind::Blob, &base_payload);
    builder_a.write_into(&objects_dir(&dir), false);

    let mut derived = base_payload.clone();
    derived.extend_from_slice(b", derived in the second");
    let mut builder_b = PackBuilder::new(HashAlgorithm::Sha1);
    let (_, derived_oid) =
        builder_b.add_ref_delta(base_oid, ObjectKind::Blob, &base_payload, &derived);
    builder_b.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    assert_eq!(db.pack_count(), 2);
    assert_eq!(db.read_raw(&derived_oid).unwrap().1, derived);
}

#[test]
fn unresolved_ref_delta_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    let phantom = Oid::hash(HashAlgorithm::Sha1, b"never stored anywhere");
    let entry_oid = Oid::hash(HashAlgorithm::Sha1, b"the delta entry id");
    let delta = common::simple_delta(b"unused", b"unused");
    builder.add_raw_ref_delta(entry_oid, phantom, delta);
    builder.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    assert!(matches!(
        db.read_raw(&entry_oid).unwrap_err(),
        OdbError::UnresolvedDelta(_)
    ));
}

#[test]
fn ref_delta_cycle_hits_depth_cap() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    let a = Oid::hash(HashAlgorithm::Sha1, b"cycle member a");
    let b = Oid::hash(HashAlgorithm::Sha1, b"cycle member b");
    let delta = common::simple_delta(b"x", b"x");
    builder.add_raw_ref_delta(a, b, delta.clone());
    builder.add_raw_ref_delta(b, a, delta);
    builder.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::with_options(
        objects_dir(&dir),
        HashAlgorithm::Sha1,
        OdbOptions {
            max_delta_depth: 10,
            ..OdbOptions::default()
        },
    )
    .unwrap();

    assert!(matches!(
        db.read_raw(&a).unwrap_err(),
        OdbError::UnresolvedDelta(_)
    ));
}

#[test]
fn v1_index_pack_reads() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    let mut expected = Vec::new();
    for i in 0..40 {
        let payload = format!("v1 indexed object {}", i).into_bytes();
        let (_, oid) = builder.add_base(ObjectKind::Blob, &payload);
        expected.push((oid, payload));
    }
    let (pack_path, _) = builder.write_into(&objects_dir(&dir), true);

    let index =
        PackIndex::open(&pack_path.with_extension("idx"), HashAlgorithm::Sha1).unwrap();
    assert_eq!(index.version(), gitodb::IndexVersion::V1);
    index.verify().unwrap();

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    for (oid, payload) in &expected {
        assert_eq!(&db.read_raw(oid).unwrap().1, payload);
    }
}

#[test]
fn verify_packs_accepts_good_and_rejects_flipped_bytes() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);
    let (base_index, _) = builder.add_base(ObjectKind::Blob, b"verify target one");
    builder.add_ofs_delta(
        base_index,
        ObjectKind::Blob,
        b"verify target one",
        b"verify target one, amended",
    );
    let (pack_path, _) = builder.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    db.verify_packs().unwrap();

    // Flip a byte inside the first entry's compressed body; the trailer no
    // longer matches, which must surface as a checksum error on open or
    // verify.
    let mut bytes = std::fs::read(&pack_path).unwrap();
    let target = 12 + 3;
    bytes[target] ^= 0x40;
    std::fs::write(&pack_path, &bytes).unwrap();

    match ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1) {
        // Discovery skips the broken pack entirely, or keeps it and verify
        // reports the mismatch; either way the corruption cannot pass.
        Ok(db) => match db.verify_packs() {
            Err(OdbError::ChecksumMismatch(_)) => {}
            Err(other) => panic!("expected checksum mismatch, got {}", other),
            Ok(()) => assert_eq!(db.pack_count(), 0, "corrupt pack silently verified"),
        },
        Err(OdbError::ChecksumMismatch(_)) => {}
        Err(other) => panic!("expected checksum mismatch, got {}", other),
    }
}

#[test]
fn pack_entries_larger_than_read_chunks() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    // A compressible payload well past typical buffer sizes.
    let big: Vec<u8> = (0..1_500_000u32).map(|i| (i % 251) as u8).collect();
    let (_, oid) = builder.add_base(ObjectKind::Blob, &big);
    builder.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    let (_, bytes) = db.read_raw(&oid).unwrap();
    assert_eq!(bytes, big);
}

#[test]
fn loose_takes_precedence_over_packed() {
    let dir = TempDir::new().unwrap();
    let payload = b"present in both backends".to_vec();

    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);
    let (_, oid) = builder.add_base(ObjectKind::Blob, &payload);
    builder.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    let written = db.write(ObjectKind::Blob, &payload).unwrap();
    assert_eq!(written, oid);

    // Identifier uniqueness makes the winning backend invisible in content;
    // metrics show the loose path was taken.
    let (_, bytes) = db.read_raw(&oid).unwrap();
    assert_eq!(bytes, payload);
    assert!(db.metrics().loose_reads >= 1);
}

#[test]
fn cache_serves_repeated_delta_reads() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);

    let base = b"cached base payload".to_vec();
    let mut derived = base.clone();
    derived.extend_from_slice(b" with a delta on top");

    let (base_index, _) = builder.add_base(ObjectKind::Blob, &base);
    let (_, derived_oid) = builder.add_ofs_delta(base_index, ObjectKind::Blob, &base, &derived);
    builder.write_into(&objects_dir(&dir), false);

    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    assert_eq!(db.read_raw(&derived_oid).unwrap().1, derived);
    assert_eq!(db.read_raw(&derived_oid).unwrap().1, derived);

    let metrics = db.metrics();
    assert_eq!(metrics.pack_reads, 2);
    assert!(metrics.cache_hits >= 1, "second read should hit the cache");

    // With the cache disabled both reads decode pack bytes.
    let db = ObjectDatabase::with_options(
        objects_dir(&dir),
        HashAlgorithm::Sha1,
        OdbOptions::uncached(),
    )
    .unwrap();
    assert_eq!(db.read_raw(&derived_oid).unwrap().1, derived);
    assert_eq!(db.read_raw(&derived_oid).unwrap().1, derived);
    assert_eq!(db.metrics().cache_hits, 0);
}

#[test]
fn reload_discovers_new_packs() {
    let dir = TempDir::new().unwrap();
    let db = ObjectDatabase::open(objects_dir(&dir), HashAlgorithm::Sha1).unwrap();
    assert_eq!(db.pack_count(), 0);

    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);
    let (_, oid) = builder.add_base(ObjectKind::Blob, b"appeared after open");
    builder.write_into(&objects_dir(&dir), false);

    assert!(!db.exists(&oid));
    db.reload().unwrap();
    assert!(db.exists(&oid));
    assert_eq!(db.read_raw(&oid).unwrap().1, b"appeared after open");
}

#[test]
fn index_invariants_hold() {
    let dir = TempDir::new().unwrap();
    let mut builder = PackBuilder::new(HashAlgorithm::Sha1);
    for i in 0..128 {
        builder.add_base(ObjectKind::Blob, format!("fanout filler {}", i).as_bytes());
    }
    let (pack_path, offsets) = builder.write_into(&objects_dir(&dir), false);

    let index =
        PackIndex::open(&pack_path.with_extension("idx"), HashAlgorithm::Sha1).unwrap();
    assert_eq!(index.count(), 128);
    index.verify().unwrap();

    // Every ofs-delta-free entry is found at its recorded offset.
    for (oid, offset) in &offsets {
        assert_eq!(index.lookup(oid), Some(*offset));
    }
}
