//! Ray queries against triangle meshes.
//!
//! Meshes are added to a [`Scene`], which is then committed into an immutable
//! [`CommittedScene`] backed by an 8-wide bounding volume hierarchy. The same functionality
//! is exported to C through the [`ffi`] module.

pub mod batch;
pub mod error;
pub mod ffi;
pub mod geometry;
pub mod marshal;
pub mod parallel;
pub mod scene;
mod util;

pub use batch::{trace_batch, trace_batch_distances};
pub use error::{Error, Result};
pub use marshal::{Hit, INVALID_ID, Ray, Vector3};
pub use scene::{
    CommittedScene, GeometryId, MeshError, QueryContext, Scene,
    device::{Device, DeviceConfig, WorkerCount},
    mesh::TriangleMesh,
};
