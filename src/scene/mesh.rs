use std::{fs, path::Path};

use indexmap::IndexMap;
use thiserror::Error;

/// Indexed triangle mesh, ready to be added to a scene.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

#[derive(Debug, Error)]
pub enum ObjOpenError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),
}

impl TriangleMesh {
    /// Loads all objects of a Wavefront OBJ file into a single mesh.
    pub fn from_obj(p: impl AsRef<Path>) -> Result<TriangleMesh, ObjOpenError> {
        let content = fs::read_to_string(p)?;
        Self::parse_obj(content)
    }

    pub fn parse_obj(content: String) -> Result<TriangleMesh, ObjOpenError> {
        let parsed = wavefront_obj::obj::parse(content)?;
        Ok(Self::load_obj(parsed))
    }

    fn load_obj(obj: wavefront_obj::obj::ObjSet) -> TriangleMesh {
        let mut triangles = Vec::new();
        // Keyed by (object index, vertex index), texture and normal indices don't matter here
        let mut vertices = IndexMap::new();

        for (object_index, o) in obj.objects.iter().enumerate() {
            for geometry in &o.geometry {
                for shape in &geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        log::warn!("Skipping non-triangle primitive in object {:?}", o.name);
                        continue;
                    };

                    let mut handle_vertex = |vtindex: (usize, Option<usize>, Option<usize>)| {
                        let entry = vertices.entry((object_index, vtindex.0));
                        let index = entry.index();
                        entry.or_insert_with(|| {
                            let vertex = &o.vertices[vtindex.0];
                            [vertex.x as f32, vertex.y as f32, vertex.z as f32]
                        });
                        index as u32
                    };

                    // The parser fans faces out from their last vertex, so triangle `1 2 3` comes
                    // back as `3 1 2`. Rotate back to file order, winding is unaffected.
                    triangles.push([handle_vertex(b), handle_vertex(c), handle_vertex(a)]);
                }
            }
        }

        TriangleMesh {
            vertices: vertices.into_values().collect(),
            triangles,
        }
    }

    /// Vertex coordinates as a flat array.
    pub fn flat_vertices(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Triangle vertex indices as a flat array.
    pub fn flat_indices(&self) -> &[u32] {
        bytemuck::cast_slice(&self.triangles)
    }
}
