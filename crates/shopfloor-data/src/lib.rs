//! File formats for the shop floor simulation: parameter files and scene
//! (layout) files in RON, TOML or JSON.

pub mod loader;
pub mod scene;

pub use loader::{DataLoadError, Format, load_params};
pub use scene::{Scene, SceneData, SceneEdge, SceneError, SceneNode, build_scene, load_scene, load_scene_dir};
