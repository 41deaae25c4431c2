//! Scan data prepared for the GPU.
//!
//! - `point_cloud`: PLY buffer → interleaved point vertices with colours and normals.
//! - `icosphere`: the shared marker mesh.
//! - `types`: buffer and uniform layouts.

pub mod icosphere;
pub mod point_cloud;
pub mod types;

pub use self::point_cloud::{build_point_cloud, PointCloud};
pub use self::types::{GlowInstance, MarkerInstance, MeshVertex, PointVertex, SceneUniformStd140};
