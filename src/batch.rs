//! One-shot ray tracing over a mesh given as flat arrays.

use std::time::Instant;

use crate::{
    error::Result,
    marshal::{Hit, Ray},
    scene::{
        Scene,
        device::{Device, DeviceConfig},
    },
};

/// Builds a temporary scene from the mesh and returns the primitive id of the nearest hit
/// for every ray, `INVALID_ID` for misses.
///
/// `vertices` holds x, y, z triples, `indices` holds vertex index triples.
pub fn trace_batch(
    config: DeviceConfig,
    vertices: &[f32],
    indices: &[u32],
    rays: &[Ray],
) -> Result<Vec<u32>> {
    Ok(trace(config, vertices, indices, rays)?
        .into_iter()
        .map(|hit| hit.primitive_id)
        .collect())
}

/// Like [`trace_batch`], but returns the hit distances, infinity for misses.
pub fn trace_batch_distances(
    config: DeviceConfig,
    vertices: &[f32],
    indices: &[u32],
    rays: &[Ray],
) -> Result<Vec<f64>> {
    Ok(trace(config, vertices, indices, rays)?
        .into_iter()
        .map(|hit| f64::from(hit.distance))
        .collect())
}

fn trace(
    config: DeviceConfig,
    vertices: &[f32],
    indices: &[u32],
    rays: &[Ray],
) -> Result<Vec<Hit>> {
    let start = Instant::now();

    let mut scene = Scene::new(Device::new(config)?);
    scene.add_mesh_flat(vertices, indices)?;
    let scene = scene.commit();

    let hits = scene.intersect_batch(rays)?;

    log::debug!(
        "Traced {} rays against {} triangles in {:?}",
        rays.len(),
        scene.triangle_count(),
        start.elapsed()
    );

    Ok(hits)
}
