//! Standard record schemas.
//!
//! - [`point_schema`]: two reals, fixed size.
//! - [`particle_schema`]: constant id, nested point, argument-sized inline array.
//! - [`mesh_schema`]: fixed array, nested record, two indirect arrays (one
//!   inside a nested record, so its pointer cell is lifted into the mesh).

use std::sync::Arc;

use strata_arena::{Arena, ObjectRef};
use strata_core::{Args, TypeId, Value};
use strata_layout::{Length, Schema};

pub const POINT: TypeId = TypeId(1);
pub const PARTICLE: TypeId = TypeId(2);
pub const MESH: TypeId = TypeId(3);

pub fn point_schema() -> Arc<Schema> {
    Schema::builder("point")
        .scalar("x", "real")
        .scalar("y", "real")
        .build()
        .unwrap()
}

/// Sized by argument `n`.
pub fn particle_schema() -> Arc<Schema> {
    Schema::builder("particle")
        .scalar("id", "index")
        .constant()
        .scalar("mass", "real")
        .record("pos", point_schema())
        .array("history", "real", Length::arg("n"))
        .build()
        .unwrap()
}

fn label_schema() -> Arc<Schema> {
    Schema::builder("label")
        .scalar("len", "uint32")
        .array("text", "byte", Length::arg("n") + Length::fixed(1))
        .indirect()
        .build()
        .unwrap()
}

/// Sized by argument `n`.
pub fn mesh_schema() -> Arc<Schema> {
    Schema::builder("mesh")
        .scalar("n", "uint32")
        .array("weights", "float", 3)
        .record("origin", point_schema())
        .array("samples", "real", Length::arg("n"))
        .indirect()
        .record("label", label_schema())
        .build()
        .unwrap()
}

pub fn make_point(arena: &mut Arena, x: f64, y: f64) -> ObjectRef {
    arena
        .create_object(POINT, &point_schema(), &Args::new().with("x", x).with("y", y))
        .unwrap()
}

/// A particle whose history holds `0.0, 1.0, .., n - 1`.
pub fn make_particle(arena: &mut Arena, id: u64, n: u64) -> ObjectRef {
    let history: Vec<f64> = (0..n).map(|i| i as f64).collect();
    arena
        .create_object(
            PARTICLE,
            &particle_schema(),
            &Args::new()
                .with("n", n)
                .with("id", id)
                .with("mass", 1.0)
                .with("history", history),
        )
        .unwrap()
}

/// A mesh whose samples hold `seed, seed + 1, ..` and whose label text
/// holds `b'a', b'b', ..`.
pub fn make_mesh(arena: &mut Arena, n: u32, seed: f64) -> ObjectRef {
    let samples: Vec<f64> = (0..n).map(|i| seed + f64::from(i)).collect();
    let mesh = arena
        .create_object(
            MESH,
            &mesh_schema(),
            &Args::new()
                .with("n", n)
                .with("weights", vec![0.25f32, 0.5, 0.25])
                .with("samples", samples),
        )
        .unwrap();
    {
        let mut view = arena.view_mut(&mesh);
        let mut label = view.record_mut("label").unwrap();
        label.set("len", n).unwrap();
        for i in 0..u64::from(n) {
            label.set_index("text", i, Value::from(b'a' + (i % 26) as u8)).unwrap();
        }
    }
    mesh
}
