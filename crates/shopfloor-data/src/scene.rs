//! Scene files: a layout of labelled nodes and edges, plus optional params.
//!
//! ```ron
//! (
//!     nodes: [
//!         (id: "src", kind: source, x: 120.0, y: 320.0, spawn_interval: Some(60)),
//!         (id: "out", kind: sink, x: 320.0, y: 320.0),
//!     ],
//!     edges: [(from: "src", to: "out")],
//! )
//! ```
//!
//! Unlike interactive edits, a scene is validated as a whole before anything
//! is built: duplicate labels, unknown labels and self-loops are errors.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use shopfloor_core::engine::{DEFAULT_SEED, Engine};
use shopfloor_core::fixed::Ticks;
use shopfloor_core::graph::GraphError;
use shopfloor_core::id::NodeId;
use shopfloor_core::node::{NodeKind, NodeParams, Position};
use shopfloor_core::params::SimParams;

use crate::loader::{DataLoadError, deserialize_file, find_params, require_data_file};

// ===========================================================================
// Schema
// ===========================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneData {
    #[serde(default)]
    pub params: Option<SimParams>,
    /// Random seed for defect, rework and downtime draws.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
    #[serde(default)]
    pub edges: Vec<SceneEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    /// Label unique within the scene.
    pub id: String,
    pub kind: NodeKind,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub spawn_interval: Option<Ticks>,
    #[serde(default)]
    pub processing_ticks: Option<Ticks>,
    /// Buffers only. Falls back to the params' buffer capacity.
    #[serde(default)]
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEdge {
    pub from: String,
    pub to: String,
}

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Load(#[from] DataLoadError),

    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("edge {index} refers to unknown node '{name}'")]
    UnknownNode { index: usize, name: String },

    #[error("edge {index} connects '{name}' to itself")]
    SelfLoop { index: usize, name: String },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

// ===========================================================================
// Building
// ===========================================================================

/// An engine built from a scene, with the scene's labels resolved.
#[derive(Debug)]
pub struct Scene {
    pub engine: Engine,
    pub nodes: HashMap<String, NodeId>,
}

impl Scene {
    pub fn node(&self, label: &str) -> Option<NodeId> {
        self.nodes.get(label).copied()
    }
}

fn validate(data: &SceneData) -> Result<(), SceneError> {
    let mut labels: HashSet<&str> = HashSet::new();
    for node in &data.nodes {
        if !labels.insert(node.id.as_str()) {
            return Err(SceneError::DuplicateNode(node.id.clone()));
        }
    }
    for (index, edge) in data.edges.iter().enumerate() {
        for name in [&edge.from, &edge.to] {
            if !labels.contains(name.as_str()) {
                return Err(SceneError::UnknownNode {
                    index,
                    name: name.clone(),
                });
            }
        }
        if edge.from == edge.to {
            return Err(SceneError::SelfLoop {
                index,
                name: edge.from.clone(),
            });
        }
    }
    Ok(())
}

/// Build an engine from scene data. `params` fills in when the scene has
/// none of its own.
pub fn build_scene(data: &SceneData, params: Option<SimParams>) -> Result<Scene, SceneError> {
    validate(data)?;

    let params = data.params.clone().or(params).unwrap_or_default();
    let mut engine = Engine::with_seed(params, data.seed.unwrap_or(DEFAULT_SEED));
    let defaults = NodeParams {
        capacity: engine.params().buffer_capacity,
        ..NodeParams::default()
    };

    let mut nodes = HashMap::with_capacity(data.nodes.len());
    for node in &data.nodes {
        let params = NodeParams {
            spawn_interval: node.spawn_interval.unwrap_or(defaults.spawn_interval),
            processing_ticks: node.processing_ticks.unwrap_or(defaults.processing_ticks),
            capacity: node.capacity.or(defaults.capacity),
        };
        let id = engine.place_node(node.kind, Position::new(node.x, node.y), params);
        nodes.insert(node.id.clone(), id);
    }

    for edge in &data.edges {
        // Labels were checked by `validate`.
        let (Some(&from), Some(&to)) = (nodes.get(&edge.from), nodes.get(&edge.to)) else {
            continue;
        };
        engine.connect(from, to)?;
    }

    // Construction events are not part of the run.
    engine.event_bus.clear_all();

    tracing::info!(
        nodes = data.nodes.len(),
        edges = data.edges.len(),
        "built scene"
    );
    Ok(Scene { engine, nodes })
}

/// Load and build a single scene file.
pub fn load_scene(path: &Path) -> Result<Scene, SceneError> {
    let data: SceneData = deserialize_file(path)?;
    tracing::info!(file = %path.display(), "loaded scene");
    build_scene(&data, None)
}

/// Load `scene.*` from a directory, with `params.*` from the same directory
/// as the fallback for a scene without params.
pub fn load_scene_dir(dir: &Path) -> Result<Scene, SceneError> {
    let path = require_data_file(dir, "scene")?;
    let data: SceneData = deserialize_file(&path)?;
    tracing::info!(file = %path.display(), "loaded scene");
    let params = match data.params {
        Some(_) => None,
        None => find_params(dir)?,
    };
    build_scene(&data, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{Format, deserialize_str};
    use std::path::PathBuf;

    fn node(id: &str, kind: NodeKind, x: f64) -> SceneNode {
        SceneNode {
            id: id.to_string(),
            kind,
            x,
            y: 0.0,
            spawn_interval: None,
            processing_ticks: None,
            capacity: None,
        }
    }

    fn edge(from: &str, to: &str) -> SceneEdge {
        SceneEdge {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn line() -> SceneData {
        SceneData {
            nodes: vec![
                node("src", NodeKind::Source, 0.0),
                node("m", NodeKind::Machine, 200.0),
                node("out", NodeKind::Sink, 400.0),
            ],
            edges: vec![edge("src", "m"), edge("m", "out")],
            ..SceneData::default()
        }
    }

    #[test]
    fn builds_nodes_and_edges_in_order() {
        let scene = build_scene(&line(), None).unwrap();
        let graph = scene.engine.graph();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        let (src, m, out) = (
            scene.node("src").unwrap(),
            scene.node("m").unwrap(),
            scene.node("out").unwrap(),
        );
        assert_eq!(graph.order(), &[src, m, out]);
        assert_eq!(graph.successors(src).collect::<Vec<_>>(), vec![m]);
        assert_eq!(graph.successors(m).collect::<Vec<_>>(), vec![out]);
        assert_eq!(scene.engine.event_bus.buffered_count(shopfloor_core::event::EventKind::NodeAdded), 0);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let mut data = line();
        data.nodes.push(node("m", NodeKind::Buffer, 600.0));
        assert!(matches!(
            build_scene(&data, None),
            Err(SceneError::DuplicateNode(ref name)) if name == "m"
        ));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let mut data = line();
        data.edges.push(edge("m", "nowhere"));
        assert!(matches!(
            build_scene(&data, None),
            Err(SceneError::UnknownNode { index: 2, ref name }) if name == "nowhere"
        ));
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut data = line();
        data.edges.push(edge("m", "m"));
        assert!(matches!(
            build_scene(&data, None),
            Err(SceneError::SelfLoop { index: 2, .. })
        ));
    }

    #[test]
    fn scene_params_win_over_fallback() {
        let mut data = line();
        data.params = Some(SimParams {
            defect_rate: 0.25,
            ..SimParams::default()
        });
        let fallback = SimParams {
            defect_rate: 0.75,
            ..SimParams::default()
        };
        let scene = build_scene(&data, Some(fallback.clone())).unwrap();
        assert_eq!(scene.engine.params().defect_rate, 0.25);

        data.params = None;
        let scene = build_scene(&data, Some(fallback)).unwrap();
        assert_eq!(scene.engine.params().defect_rate, 0.75);
    }

    #[test]
    fn buffer_capacity_falls_back_to_params() {
        let mut data = line();
        data.params = Some(SimParams {
            buffer_capacity: Some(3),
            ..SimParams::default()
        });
        data.nodes.push(node("b1", NodeKind::Buffer, 600.0));
        data.nodes.push(SceneNode {
            capacity: Some(8),
            ..node("b2", NodeKind::Buffer, 800.0)
        });
        let scene = build_scene(&data, None).unwrap();
        let capacity = |label: &str| {
            scene
                .engine
                .graph()
                .node(scene.node(label).unwrap())
                .unwrap()
                .params
                .capacity
        };
        assert_eq!(capacity("b1"), Some(3));
        assert_eq!(capacity("b2"), Some(8));
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let mut data = line();
        data.nodes[0].spawn_interval = Some(0);
        data.nodes[1].processing_ticks = Some(0);
        let scene = build_scene(&data, None).unwrap();
        let graph = scene.engine.graph();
        assert_eq!(graph.node(scene.node("src").unwrap()).unwrap().params.spawn_interval, 1);
        assert_eq!(graph.node(scene.node("m").unwrap()).unwrap().params.processing_ticks, 1);
    }

    #[test]
    fn toml_scene_parses() {
        let content = r#"
seed = 7

[params]
transport_speed = 0.05

[[nodes]]
id = "src"
kind = "source"
x = 0.0
y = 0.0
spawn_interval = 10

[[nodes]]
id = "out"
kind = "sink"
x = 200.0
y = 0.0

[[edges]]
from = "src"
to = "out"
"#;
        let data: SceneData = deserialize_str(content, Format::Toml, &PathBuf::from("scene.toml")).unwrap();
        assert_eq!(data.seed, Some(7));
        assert_eq!(data.nodes[0].spawn_interval, Some(10));
        assert_eq!(data.params.as_ref().map(|p| p.transport_speed), Some(0.05));
        assert_eq!(data.edges, vec![edge("src", "out")]);
    }

    #[test]
    fn json_scene_parses() {
        let content = r#"{
            "nodes": [
                { "id": "a", "kind": "buffer", "x": 1.0, "y": 2.0, "capacity": 2 }
            ]
        }"#;
        let data: SceneData = deserialize_str(content, Format::Json, &PathBuf::from("scene.json")).unwrap();
        assert_eq!(data.nodes[0].kind, NodeKind::Buffer);
        assert_eq!(data.nodes[0].capacity, Some(2));
        assert!(data.edges.is_empty());
        assert_eq!(data.params, None);
    }
}
