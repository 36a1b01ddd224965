//! Integration tests: growth by relocation.
//!
//! Every test builds objects in a tiny arena so that relocation happens
//! repeatedly, then checks the store against its base-relative content.

use proptest::prelude::*;
use strata_arena::{Arena, ArenaConfig, RegionKind};
use strata_core::{TypeId, Value};
use strata_test_utils::{
    assert_fixups_in_bounds, make_mesh, make_particle, make_point, relative_fixup_targets,
    relative_payload, tiny_arena,
};

#[test]
fn relocation_preserves_relative_content() {
    let mut arena = tiny_arena();
    let mesh = make_mesh(&mut arena, 4, 10.0);
    let before = relative_payload(&arena);
    let targets = relative_fixup_targets(&arena);
    let relocations = arena.relocations();

    arena.reserve(1 << 12, 32, 32).unwrap();

    assert_eq!(arena.relocations(), relocations + 1);
    assert_eq!(relative_payload(&arena), before);
    assert_eq!(relative_fixup_targets(&arena), targets);
    let view = arena.view(&mesh);
    assert_eq!(
        view.array("samples").unwrap().to_vec().unwrap(),
        vec![
            Value::Float(10.0),
            Value::Float(11.0),
            Value::Float(12.0),
            Value::Float(13.0)
        ]
    );
}

#[test]
fn every_fixup_moves_by_the_base_delta() {
    let mut arena = tiny_arena();
    make_mesh(&mut arena, 2, 0.0);
    let old_base = arena.base();
    let old: Vec<u64> = arena
        .fixups()
        .map(|cell| arena.read_word(cell).unwrap())
        .collect();

    arena.reserve(1 << 10, 0, 0).unwrap();
    let delta = arena.base().wrapping_sub(old_base);

    let new: Vec<u64> = arena
        .fixups()
        .map(|cell| arena.read_word(cell).unwrap())
        .collect();
    assert_eq!(old.len(), 2);
    for (o, n) in old.iter().zip(&new) {
        assert_eq!(*n, o.wrapping_add(delta));
    }
}

#[test]
fn raw_cells_are_patched_whatever_they_hold() {
    let mut arena = tiny_arena();
    let a = arena.allocate(16, TypeId(9), &[0, 8]).unwrap();
    let offset = arena.translate(a).unwrap();
    arena.reserve(256, 0, 0).unwrap();
    let delta = arena.base().wrapping_sub(a.wrapping_sub(offset));
    let a = arena.base() + offset;
    // Zero cells are patched like any other.
    assert_eq!(arena.read_word(a).unwrap(), delta);
    assert_eq!(arena.read_word(a + 8).unwrap(), delta);
}

#[test]
fn nested_indirect_cell_is_registered_and_valid() {
    let mut arena = tiny_arena();
    let mesh = make_mesh(&mut arena, 5, 1.0);
    let layout = mesh.layout();
    let label = layout.field("label").unwrap();
    let child = label.record().unwrap();
    let text = child.field("text").unwrap();
    let address = mesh.address(&arena);

    let cells: Vec<u64> = arena.fixups().collect();
    assert!(cells.contains(&(address + label.offset + text.offset)));

    let view = arena.view(&mesh).record("label").unwrap();
    assert_eq!(view.get("len").unwrap(), Value::UInt(5));
    let chars = view.array("text").unwrap().to_vec().unwrap();
    assert_eq!(chars.len(), 6);
    assert_eq!(chars[0], Value::UInt(u64::from(b'a')));
    assert_eq!(chars[5], Value::UInt(0));
    assert_fixups_in_bounds(&arena);
}

#[test]
fn pointer_cells_follow_direct_fields() {
    let mut arena = tiny_arena();
    let mesh = make_mesh(&mut arena, 1, 0.0);
    let layout = mesh.layout();
    let direct_end = layout.direct_end();
    let samples = layout.field("samples").unwrap();
    assert!(samples.offset >= direct_end);
    for fixup in &layout.fixups {
        assert!(fixup.target >= fixup.cell + 8);
        assert!(fixup.cell + 8 <= layout.size);
    }
}

#[test]
fn many_objects_survive_many_relocations() {
    let mut arena = tiny_arena();
    let points: Vec<_> = (0..50)
        .map(|i| make_point(&mut arena, f64::from(i), -f64::from(i)))
        .collect();
    let particles: Vec<_> = (0..10).map(|i| make_particle(&mut arena, i, i)).collect();
    assert!(arena.relocations() >= 3);

    for (i, p) in points.iter().enumerate() {
        let view = arena.view(p);
        assert_eq!(view.get("x").unwrap(), Value::Float(i as f64));
        assert_eq!(view.get("y").unwrap(), Value::Float(-(i as f64)));
    }
    for (i, p) in particles.iter().enumerate() {
        let view = arena.view(p);
        assert_eq!(view.get("id").unwrap(), Value::UInt(i as u64));
        assert_eq!(view.array("history").unwrap().len(), i as u64);
    }
    assert_eq!(arena.objects().count(), 60);
    assert_eq!(arena.size(), arena.as_bytes().len() as u64);
}

#[test]
fn slots_offset_is_stable_across_growth() {
    let mut arena = tiny_arena();
    let p = make_point(&mut arena, 1.0, 2.0);
    let before = arena.translate(p.address(&arena)).unwrap();
    arena.reserve(0, 100, 100).unwrap();
    assert_eq!(arena.translate(p.address(&arena)).unwrap(), before);
    assert_eq!(p.offset(), before);
}

#[cfg(not(miri))]
mod proptests {
    use super::*;

    #[derive(Clone, Debug)]
    enum Op {
        Point(i32),
        Mesh(u8),
        Raw(u8, u8),
        Reserve(u16, u8, u8),
        Release(u8),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            any::<i32>().prop_map(Op::Point),
            (0u8..6).prop_map(Op::Mesh),
            (0u8..8, 0u8..3).prop_map(|(s, c)| Op::Raw(s, c)),
            (any::<u16>(), any::<u8>(), any::<u8>()).prop_map(|(s, o, p)| Op::Reserve(s % 512, o, p)),
            any::<u8>().prop_map(Op::Release),
        ]
    }

    proptest! {
        #[test]
        fn capacities_never_shrink_and_fixups_stay_valid(
            ops in prop::collection::vec(op(), 1..40),
            growth in 2u64..4,
        ) {
            let config = ArenaConfig::new()
                .with_capacities(2, 1, 1, 1)
                .with_growth_factor(growth);
            let mut arena = Arena::new(config).unwrap();
            let mut caps = arena.capacities();
            let mut points = Vec::new();

            for op in ops {
                match op {
                    Op::Point(v) => points.push((make_point(&mut arena, f64::from(v), 0.0), v)),
                    Op::Mesh(n) => { make_mesh(&mut arena, u32::from(n), 0.5); }
                    Op::Raw(slots, cells) => {
                        let size = u64::from(slots.max(cells)) * 8;
                        let list: Vec<u64> = (0..u64::from(cells)).map(|c| c * 8).collect();
                        arena.allocate(size, TypeId(99), &list).unwrap();
                    }
                    Op::Reserve(s, o, p) => arena.reserve(u64::from(s), u64::from(o), u64::from(p)).unwrap(),
                    Op::Release(i) => {
                        let entries: Vec<_> = arena.objects().filter(|e| e.type_id == TypeId(99)).collect();
                        if !entries.is_empty() {
                            let e = entries[usize::from(i) % entries.len()];
                            arena.release(e.address).unwrap();
                        }
                    }
                }
                let now = arena.capacities();
                for kind in RegionKind::ALL {
                    prop_assert!(now.get(kind) >= caps.get(kind));
                }
                caps = now;
                prop_assert_eq!(arena.base(), arena.as_bytes().as_ptr() as usize as u64);
                prop_assert_eq!(arena.size(), arena.as_bytes().len() as u64);
                for cell in arena.fixups() {
                    prop_assert!(arena.translate(cell).is_ok());
                }
            }
            for (p, v) in &points {
                prop_assert_eq!(arena.view(p).get("x").unwrap(), Value::Float(f64::from(*v)));
            }
        }
    }
}
