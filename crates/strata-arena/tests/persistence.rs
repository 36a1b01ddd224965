//! Integration tests: saving and loading arena images.

use std::fs;

use strata_arena::{Arena, ArenaConfig, ArenaError};
use strata_core::{Args, TypeCatalog, Value};
use strata_test_utils::{
    assert_fixups_in_bounds, make_mesh, make_point, mesh_schema, relative_fixup_targets,
    relative_payload, tiny_arena, MESH,
};
use tempfile::TempDir;

#[test]
fn save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.arena");

    let mut arena = tiny_arena();
    make_point(&mut arena, 3.0, 4.0);
    let mesh = make_mesh(&mut arena, 3, 2.0);
    let mesh_offset = mesh.offset();
    arena.save(&path).unwrap();
    assert!(!dir.path().join("store.arena.tmp").exists());

    let loaded = Arena::load(&path).unwrap();
    assert_eq!(loaded.size(), arena.size());
    assert_eq!(loaded.base(), loaded.as_bytes().as_ptr() as usize as u64);
    assert_eq!(relative_payload(&loaded), relative_payload(&arena));
    assert_eq!(relative_fixup_targets(&loaded), relative_fixup_targets(&arena));
    assert_fixups_in_bounds(&loaded);

    let entries: Vec<_> = loaded.objects().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].type_id, MESH);
    assert_eq!(entries[1].address, loaded.base() + mesh_offset);
}

#[test]
fn loaded_objects_are_readable_after_reattaching() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mesh.arena");
    let mut arena = tiny_arena();
    let mesh = make_mesh(&mut arena, 4, 7.0);
    arena.save(&path).unwrap();

    let mut loaded = Arena::load(&path).unwrap();
    assert!(loaded.registry().is_empty());
    loaded.register(MESH, &mesh_schema()).unwrap();
    let address = loaded.base() + mesh.offset();
    let args = Args::new().with("n", 4u32);
    let mesh = loaded.attach_registered(address, &args).unwrap();

    let view = loaded.view(&mesh);
    assert_eq!(view.array("samples").unwrap().get(3).unwrap(), Value::Float(10.0));
    assert_eq!(
        view.array("weights").unwrap().to_vec().unwrap(),
        vec![Value::Float(0.25), Value::Float(0.5), Value::Float(0.25)]
    );
    let label = view.record("label").unwrap();
    assert_eq!(label.array("text").unwrap().get(1).unwrap(), Value::UInt(u64::from(b'b')));
}

#[test]
fn loaded_arena_keeps_growing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("grow.arena");
    let mut arena = tiny_arena();
    let p = make_point(&mut arena, 1.0, 1.0);
    arena.save(&path).unwrap();

    let config = ArenaConfig::new().with_growth_factor(3);
    let mut loaded = Arena::load_with(&path, config, TypeCatalog::standard()).unwrap();
    assert_eq!(loaded.config().growth_factor, 3);
    assert_eq!(loaded.relocations(), 0);
    let mesh = make_mesh(&mut loaded, 8, 0.0);
    assert!(loaded.relocations() > 0);
    assert_fixups_in_bounds(&loaded);

    let p = loaded.attach(loaded.base() + p.offset(), p.type_id(), p.layout().clone()).unwrap();
    loaded.view_mut(&p).set("y", 9.5).unwrap();
    assert_eq!(loaded.view(&p).get("y").unwrap(), Value::Float(9.5));
    assert_eq!(loaded.view(&mesh).array("samples").unwrap().len(), 8);
}

#[test]
fn save_replaces_existing_image() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("replace.arena");
    let mut arena = tiny_arena();
    arena.save(&path).unwrap();
    make_point(&mut arena, 5.0, 6.0);
    arena.save(&path).unwrap();
    let loaded = Arena::load(&path).unwrap();
    assert_eq!(loaded.objects().count(), 1);
}

#[test]
fn released_extents_survive_a_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.arena");
    let mut arena = tiny_arena();
    let a = make_point(&mut arena, 0.0, 0.0);
    make_point(&mut arena, 1.0, 1.0);
    arena.release(a.address(&arena)).unwrap();
    arena.save(&path).unwrap();

    let loaded = Arena::load(&path).unwrap();
    let garbage: Vec<_> = loaded.garbage().collect();
    assert_eq!(garbage.len(), 1);
    assert_eq!(garbage[0].address, loaded.base() + a.offset());
    assert_eq!(garbage[0].size, 16);
    assert_eq!(loaded.objects().count(), 1);
}

#[test]
fn tampered_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.arena");
    let mut arena = tiny_arena();
    make_point(&mut arena, 1.0, 2.0);
    arena.save(&path).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x80;
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(
        Arena::load(&path),
        Err(ArenaError::ChecksumMismatch { .. })
    ));

    fs::write(&path, b"not an arena").unwrap();
    assert!(matches!(Arena::load(&path), Err(ArenaError::CorruptImage { .. })));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Arena::load(dir.path().join("absent.arena")),
        Err(ArenaError::Io(_))
    ));
}

#[test]
fn in_memory_image_round_trip() {
    let mut arena = tiny_arena();
    make_mesh(&mut arena, 2, 0.0);
    let mut image = Vec::new();
    arena.write_image(&mut image).unwrap();
    assert_eq!(image.len() as u64, arena.size());

    let loaded =
        Arena::read_image(image.as_slice(), ArenaConfig::default(), TypeCatalog::standard())
            .unwrap();
    assert_eq!(relative_payload(&loaded), relative_payload(&arena));
}
