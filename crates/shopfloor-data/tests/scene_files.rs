//! The scene files shipped with the crate.

use std::fs;
use std::path::{Path, PathBuf};

use shopfloor_core::engine::Engine;
use shopfloor_core::node::NodeKind;
use shopfloor_core::params::SimParams;
use shopfloor_data::{DataLoadError, SceneError, load_scene, load_scene_dir};

fn scenes_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("scenes")
}

fn temp_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "shopfloor_scene_test_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn default_line_scene_matches_seeded_layout() {
    let mut scene = load_scene_dir(&scenes_dir().join("default_line")).unwrap();
    let (mut seeded, _) = Engine::with_default_layout(SimParams::default()).unwrap();

    assert_eq!(scene.engine.graph().node_count(), 6);
    assert_eq!(scene.engine.graph().edge_count(), 5);

    scene.engine.run_ticks(1_000);
    seeded.run_ticks(1_000);
    assert_eq!(scene.engine.state_hash(), seeded.state_hash());
    assert_eq!(
        scene.engine.metrics().bottleneck.map(|b| b.node),
        scene.node("press")
    );
}

#[test]
fn rework_cell_uses_params_file() {
    let mut scene = load_scene_dir(&scenes_dir().join("rework_cell")).unwrap();
    let params = scene.engine.params();
    assert_eq!(params.simulated_hours, 2.0);
    assert_eq!(params.buffer_capacity, Some(5));

    let feed = scene.node("feed").unwrap();
    assert_eq!(
        scene.engine.graph().node(feed).map(|n| (n.kind, n.params.capacity)),
        Some((NodeKind::Buffer, Some(5)))
    );

    scene.engine.run_ticks(7_200);
    let summary = scene.engine.run_summary();
    assert!(summary.complete);
    assert!(summary.produced > 0);
    let ledger = scene.engine.ledger();
    assert_eq!(
        ledger.spawned,
        ledger.produced + ledger.dropped + scene.engine.part_count() as u64
    );
}

#[test]
fn same_scene_same_run() {
    let dir = scenes_dir().join("rework_cell");
    let mut a = load_scene_dir(&dir).unwrap();
    let mut b = load_scene_dir(&dir).unwrap();
    a.engine.run_ticks(2_000);
    b.engine.run_ticks(2_000);
    assert_eq!(a.engine.state_hash(), b.engine.state_hash());
}

#[test]
fn missing_scene_file_is_reported() {
    let dir = temp_dir("missing");
    let err = load_scene_dir(&dir).unwrap_err();
    assert!(matches!(
        err,
        SceneError::Load(DataLoadError::MissingRequired { .. })
    ));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn scene_params_skip_the_params_file() {
    let dir = temp_dir("own_params");
    fs::write(
        dir.join("scene.json"),
        r#"{
            "params": { "defect_rate": 0.4 },
            "nodes": [
                { "id": "a", "kind": "source", "x": 0.0, "y": 0.0 },
                { "id": "b", "kind": "sink", "x": 100.0, "y": 0.0 }
            ],
            "edges": [{ "from": "a", "to": "b" }]
        }"#,
    )
    .unwrap();
    fs::write(dir.join("params.json"), "{ not json").unwrap();

    let scene = load_scene_dir(&dir).unwrap();
    assert_eq!(scene.engine.params().defect_rate, 0.4);
    assert_eq!(scene.engine.graph().edge_count(), 1);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bad_params_file_fails_a_scene_without_params() {
    let dir = temp_dir("bad_params");
    fs::write(
        dir.join("scene.json"),
        r#"{ "nodes": [{ "id": "a", "kind": "sink", "x": 0.0, "y": 0.0 }], "edges": [] }"#,
    )
    .unwrap();
    fs::write(dir.join("params.json"), "{ not json").unwrap();

    assert!(load_scene_dir(&dir).is_err());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn json_scene_with_bad_reference() {
    let dir = temp_dir("bad_ref");
    let path = dir.join("scene.json");
    fs::write(
        &path,
        r#"{
            "nodes": [{ "id": "a", "kind": "source", "x": 0.0, "y": 0.0 }],
            "edges": [{ "from": "a", "to": "b" }]
        }"#,
    )
    .unwrap();
    let err = load_scene(&path).unwrap_err();
    assert_eq!(err.to_string(), "edge 0 refers to unknown node 'b'");
    let _ = fs::remove_dir_all(&dir);
}
