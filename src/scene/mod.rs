pub mod device;
pub mod mesh;
pub mod triangle_bvh;

use std::time::Instant;

use index_vec::IndexVec;
use thiserror::Error;

use crate::{
    geometry::{TraceRay, Triangle, WorldBox, WorldPoint},
    marshal::{Hit, INVALID_ID, Ray},
    parallel::{BatchError, parallel_for_each_chunk},
};

use device::Device;
use mesh::TriangleMesh;
use triangle_bvh::{BuildTriangle, BvhStatistics, StackCache, TriangleBvh, TriangleRef};

index_vec::define_index_type! {
    /// Identifies a mesh within its scene. Assigned in insertion order, starting at 0.
    pub struct GeometryId = u32;
    MAX_INDEX = (INVALID_ID - 1) as usize;
    IMPL_RAW_CONVERSIONS = true;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("Length of the {buffer} buffer ({len}) is not a multiple of 3")]
    BufferLength { buffer: &'static str, len: usize },

    #[error(
        "Triangle {triangle} references vertex {index}, but the mesh has only {vertex_count} vertices"
    )]
    IndexOutOfRange {
        triangle: usize,
        index: u32,
        vertex_count: usize,
    },

    #[error("Mesh has too many triangles ({0})")]
    TooManyTriangles(usize),

    #[error("Scene has too many geometries")]
    TooManyGeometries,
}

#[derive(Clone, Debug)]
struct Geometry {
    vertices: Vec<WorldPoint>,
    triangles: Vec<[u32; 3]>,
}

/// Scene that is still accepting meshes.
/// Call [`Scene::commit`] to build the acceleration structure and start querying.
#[derive(Clone, Debug)]
pub struct Scene {
    device: Device,
    geometries: IndexVec<GeometryId, Geometry>,
}

impl Scene {
    pub fn new(device: Device) -> Scene {
        Scene {
            device,
            geometries: IndexVec::new(),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Copies a triangle mesh into the scene and returns its id.
    /// Triangles index into `vertices`; every index is checked.
    pub fn add_mesh(
        &mut self,
        vertices: &[[f32; 3]],
        triangles: &[[u32; 3]],
    ) -> Result<GeometryId, MeshError> {
        if self.geometries.len() > GeometryId::MAX_INDEX {
            return Err(MeshError::TooManyGeometries);
        }
        if triangles.len() >= INVALID_ID as usize {
            return Err(MeshError::TooManyTriangles(triangles.len()));
        }

        for (triangle, indices) in triangles.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    index,
                    vertex_count: vertices.len(),
                });
            }
        }

        Ok(self.geometries.push(Geometry {
            vertices: vertices.iter().map(|&v| WorldPoint::from(v)).collect(),
            triangles: triangles.to_vec(),
        }))
    }

    /// Same as [`Scene::add_mesh`], with vertex coordinates and triangle indices
    /// given as flat arrays of triples.
    pub fn add_mesh_flat(
        &mut self,
        vertices: &[f32],
        indices: &[u32],
    ) -> Result<GeometryId, MeshError> {
        let vertices = bytemuck::try_cast_slice(vertices).map_err(|_| MeshError::BufferLength {
            buffer: "vertex",
            len: vertices.len(),
        })?;
        let triangles = bytemuck::try_cast_slice(indices).map_err(|_| MeshError::BufferLength {
            buffer: "index",
            len: indices.len(),
        })?;
        self.add_mesh(vertices, triangles)
    }

    pub fn add_triangle_mesh(&mut self, mesh: &TriangleMesh) -> Result<GeometryId, MeshError> {
        self.add_mesh(&mesh.vertices, &mesh.triangles)
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    /// Builds the acceleration structure over all meshes added so far.
    pub fn commit(self) -> CommittedScene {
        let start = Instant::now();

        let triangles: Vec<BuildTriangle> = self
            .geometries
            .iter_enumerated()
            .flat_map(|(id, geometry)| {
                geometry
                    .triangles
                    .iter()
                    .enumerate()
                    .map(move |(primitive, indices)| BuildTriangle {
                        vertices: Triangle::from(indices.map(|i| geometry.vertices[i as usize])),
                        reference: TriangleRef {
                            geometry: id.raw(),
                            primitive: primitive as u32,
                        },
                    })
            })
            .collect();
        let triangle_count = triangles.len();

        let bvh = TriangleBvh::build(triangles, self.device.config().max_leaf_triangles);

        log::debug!(
            "Built hierarchy over {} triangles in {} geometries in {:?}",
            triangle_count,
            self.geometries.len(),
            start.elapsed()
        );

        CommittedScene {
            device: self.device,
            geometry_count: self.geometries.len(),
            bvh,
        }
    }
}

/// Per-thread scratch space for queries.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    stack: StackCache,
}

/// Scene with a built acceleration structure. Immutable, queries may run concurrently.
#[derive(Clone, Debug)]
pub struct CommittedScene {
    device: Device,
    geometry_count: usize,
    bvh: TriangleBvh,
}

impl CommittedScene {
    /// Nearest hit at distance at least `ray.min_distance`, or [`Hit::MISS`].
    pub fn intersect(&self, ray: &Ray) -> Hit {
        self.intersect_with(ray, &mut QueryContext::default())
    }

    pub fn intersect_with(&self, ray: &Ray, context: &mut QueryContext) -> Hit {
        match self
            .bvh
            .intersect(&TraceRay::from(ray), ray.min_distance, &mut context.stack)
        {
            Some(hit) => Hit {
                geometry_id: hit.triangle.geometry,
                primitive_id: hit.triangle.primitive,
                u: hit.uv.u,
                v: hit.uv.v,
                distance: hit.t,
            },
            None => Hit::MISS,
        }
    }

    /// True if anything is hit at a distance in `[ray.min_distance, max_distance)`.
    pub fn is_occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        self.is_occluded_with(ray, max_distance, &mut QueryContext::default())
    }

    pub fn is_occluded_with(
        &self,
        ray: &Ray,
        max_distance: f32,
        context: &mut QueryContext,
    ) -> bool {
        self.bvh.occluded(
            &TraceRay::from(ray),
            ray.min_distance,
            max_distance,
            &mut context.stack,
        )
    }

    /// Nearest hits for many rays, computed on the device's worker threads.
    pub fn intersect_batch(&self, rays: &[Ray]) -> Result<Vec<Hit>, BatchError> {
        let mut hits = vec![Hit::MISS; rays.len()];
        parallel_for_each_chunk(
            &self.device,
            rays,
            &mut hits,
            |_worker_id| QueryContext::default(),
            |context, ray| self.intersect_with(ray, context),
        )?;
        Ok(hits)
    }

    /// Occlusion for many rays, computed on the device's worker threads.
    pub fn occluded_batch(&self, rays: &[Ray], max_distance: f32) -> Result<Vec<bool>, BatchError> {
        let mut occluded = vec![false; rays.len()];
        parallel_for_each_chunk(
            &self.device,
            rays,
            &mut occluded,
            |_worker_id| QueryContext::default(),
            |context, ray| self.is_occluded_with(ray, max_distance, context),
        )?;
        Ok(occluded)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Box around all triangles, None if the scene is empty.
    pub fn bounding_box(&self) -> Option<WorldBox> {
        self.bvh.bounding_box()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometry_count
    }

    pub fn triangle_count(&self) -> usize {
        self.bvh.triangle_count()
    }

    pub fn statistics(&self) -> BvhStatistics {
        self.bvh.statistics()
    }

    pub fn log_statistics(&self) {
        let stats = self.statistics();
        log::info!("Depth: {}", stats.depth);
        log::info!("Inner node child count: {}", stats.inner_node_fill);
        log::info!("Leaf nodes fill: {}", stats.leaf_fill);
    }
}
