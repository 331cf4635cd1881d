use std::sync::Arc;
use std::time::Duration;

use cgmath::Point3;
use web_time::Instant;

use voxel_forge::core::config::EngineConfig;
use voxel_forge::core::diagnostics::NullDiagnostics;
use voxel_forge::engine_state::voxels::block::block_side::BlockSide;
use voxel_forge::engine_state::voxels::block::BlockRegistry;
use voxel_forge::engine_state::voxels::chunk::generation::MeshState;
use voxel_forge::engine_state::voxels::chunk::CHUNK_DIMENSION;
use voxel_forge::engine_state::voxels::terrain::PerlinTerrain;
use voxel_forge::engine_state::voxels::world::{ChunkEvent, WorldError};
use voxel_forge::engine_state::EngineState;

const SEED: u32 = 7;

fn engine(config: EngineConfig) -> EngineState {
    EngineState::new(
        config,
        Arc::new(BlockRegistry::with_defaults()),
        Arc::new(PerlinTerrain::new(SEED)),
        Arc::new(NullDiagnostics),
    )
}

fn config(greedy: bool) -> EngineConfig {
    let json = format!(
        r#"{{
            "threading": {{ "cpu_fraction": 1.0, "dequeue_wait_ms": 2 }},
            "generation": {{ "seed": {SEED}, "load_radius": 2 }},
            "meshing": {{ "greedy": {greedy} }}
        }}"#
    );
    EngineConfig::from_json(&json).unwrap()
}

fn tick_until(engine: &mut EngineState, mut done: impl FnMut(&EngineState) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(60);
    while !done(engine) {
        assert!(Instant::now() < deadline, "pipeline stalled: {:?}", engine.stats());
        engine.tick(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn settled(engine: &EngineState, position: Point3<i32>) -> bool {
    engine.chunk(position).is_some_and(|chunk| {
        chunk.meshing().state() == MeshState::Meshed && !chunk.meshing().is_dirty()
    })
}

/// The chunk holding the surface of column (0, 0), and that surface's height.
fn surface_chunk() -> (Point3<i32>, i32) {
    let height = PerlinTerrain::new(SEED).surface_height(0, 0);
    (Point3::new(0, height.div_euclid(CHUNK_DIMENSION), 0), height)
}

#[test]
fn perlin_world_meshes_and_accepts_edits() {
    let (center, height) = surface_chunk();
    let mut engine = engine(config(true));
    assert_eq!(engine.load_area(center, 2), 125);
    tick_until(&mut engine, |engine| settled(engine, center));

    let surface = Point3::new(0, height, 0);
    assert!(!engine.get_voxel(surface).unwrap().is_empty());
    assert_eq!(
        engine.get_voxel(Point3::new(10_000, 0, 0)),
        Err(WorldError::OutOfBounds(Point3::new(10_000, 0, 0)))
    );
    engine.drain_events();

    assert!(engine.try_remove(surface));
    tick_until(&mut engine, |engine| {
        engine.get_voxel(surface) == Ok(Default::default()) && settled(engine, center)
    });

    let events = engine.drain_events();
    let bounds = engine.chunk(center).unwrap().bounds();
    assert!(events.iter().any(|event| matches!(
        event,
        ChunkEvent::TerrainChanged { bounds: changed, sides }
            if *changed == bounds && sides.contains(BlockSide::LEFT) && sides.contains(BlockSide::BACK)
    )));
    assert!(events
        .iter()
        .any(|event| matches!(event, ChunkEvent::MeshChanged { bounds: changed, .. } if *changed == bounds)));

    engine.shutdown();
}

#[test]
fn greedy_meshing_never_emits_more_geometry() {
    let (center, _) = surface_chunk();
    let mut meshes = Vec::new();
    for greedy in [true, false] {
        let mut engine = engine(config(greedy));
        engine.load_area(center, 2);
        tick_until(&mut engine, |engine| settled(engine, center));
        let mesh = engine.chunk(center).and_then(|chunk| chunk.mesh().cloned()).unwrap();
        meshes.push(mesh);
    }

    let (greedy, culled) = (&meshes[0], &meshes[1]);
    assert!(!greedy.is_empty());
    assert!(greedy.indices.len() <= culled.indices.len());
    assert!(greedy.vertices.len() <= culled.vertices.len());
}
