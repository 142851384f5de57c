//! Mesh representation for 3D models
//!
//! `Vertex` and `Mesh` are pure data. The vertex type describes its own memory
//! layout through [`VertexInput`] using backend-neutral [`AttributeKind`] tags;
//! the Vulkan backend turns those into pipeline vertex input state.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::mem::{offset_of, size_of};
use crate::assets::{AssetError, RawModel};

/// Host value kinds a vertex attribute may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// Two `f32` components
    Float2,
    /// Three `f32` components
    Float3,
    /// Four `f32` components
    Float4,
}

impl AttributeKind {
    /// Size of one value in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::Float2 => 2 * size_of::<f32>(),
            Self::Float3 => 3 * size_of::<f32>(),
            Self::Float4 => 4 * size_of::<f32>(),
        }
    }
}

/// One shader input location inside a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Value kind
    pub kind: AttributeKind,
    /// Byte offset from the start of the vertex
    pub offset: usize,
}

/// Types that can be streamed as interleaved vertex data
///
/// Attribute `i` in [`VertexInput::ATTRIBUTES`] binds to shader location `i`.
pub trait VertexInput: bytemuck::Pod {
    /// Attributes in shader location order
    const ATTRIBUTES: &'static [VertexAttribute];

    /// Distance in bytes between consecutive vertices
    fn stride() -> usize {
        size_of::<Self>()
    }
}

/// Interleaved vertex: position, color, texture coordinate
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
    /// Texture coordinate with a top-left origin
    pub tex_coord: [f32; 2],
}

unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl VertexInput for Vertex {
    const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute { kind: AttributeKind::Float3, offset: offset_of!(Vertex, position) },
        VertexAttribute { kind: AttributeKind::Float3, offset: offset_of!(Vertex, color) },
        VertexAttribute { kind: AttributeKind::Float2, offset: offset_of!(Vertex, tex_coord) },
    ];
}

impl Vertex {
    /// Color given to vertices loaded from files without vertex colors
    pub const DEFAULT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

    /// Create a new vertex
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, color, tex_coord }
    }

    fn bits(&self) -> [u32; 8] {
        [
            self.position[0].to_bits(),
            self.position[1].to_bits(),
            self.position[2].to_bits(),
            self.color[0].to_bits(),
            self.color[1].to_bits(),
            self.color[2].to_bits(),
            self.tex_coord[0].to_bits(),
            self.tex_coord[1].to_bits(),
        ]
    }
}

// Bit-level equality keeps Eq and Hash consistent for use as a dedup key
impl PartialEq for Vertex {
    fn eq(&self, other: &Self) -> bool {
        self.bits() == other.bits()
    }
}

impl Eq for Vertex {}

impl Hash for Vertex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

/// Indexed triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Unique vertices
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a mesh from vertices and indices
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Build a mesh from decoded file data, merging identical corners
    ///
    /// The texture V axis is flipped from the file's bottom-left origin to the
    /// top-left origin Vulkan samples with.
    pub fn from_raw_model(raw: &RawModel) -> Result<Self, AssetError> {
        let mut unique: HashMap<Vertex, u32> = HashMap::new();
        let mut mesh = Self::default();

        for corner in &raw.face_vertices {
            let position = triple(&raw.positions, corner.position)?;
            let tex_coord = match corner.tex_coord {
                Some(index) => {
                    let [u, v] = pair(&raw.tex_coords, index)?;
                    [u, 1.0 - v]
                }
                None => [0.0, 0.0],
            };
            let vertex = Vertex::new(position, Vertex::DEFAULT_COLOR, tex_coord);

            let index = match unique.get(&vertex) {
                Some(&index) => index,
                None => {
                    let index = u32::try_from(mesh.vertices.len()).map_err(|_| {
                        AssetError::InvalidData("Mesh exceeds the 32-bit index range".to_string())
                    })?;
                    mesh.vertices.push(vertex);
                    unique.insert(vertex, index);
                    index
                }
            };
            mesh.indices.push(index);
        }

        log::debug!(
            "Deduplicated {} corners into {} vertices",
            raw.face_vertices.len(),
            mesh.vertices.len()
        );

        Ok(mesh)
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check that the mesh can be drawn as an indexed triangle list
    pub fn validate(&self) -> Result<(), String> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err("Mesh has no geometry".to_string());
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!("Index count {} is not a multiple of 3", self.indices.len()));
        }
        let vertex_count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&index| index as usize >= vertex_count) {
            return Err(format!("Index {bad} out of range for {vertex_count} vertices"));
        }
        Ok(())
    }
}

fn triple(values: &[f32], index: u32) -> Result<[f32; 3], AssetError> {
    let start = index as usize * 3;
    values
        .get(start..start + 3)
        .map(|v| [v[0], v[1], v[2]])
        .ok_or_else(|| AssetError::InvalidData(format!("Position index {index} out of range")))
}

fn pair(values: &[f32], index: u32) -> Result<[f32; 2], AssetError> {
    let start = index as usize * 2;
    values
        .get(start..start + 2)
        .map(|v| [v[0], v[1]])
        .ok_or_else(|| AssetError::InvalidData(format!("Texture coordinate index {index} out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FaceVertex;

    fn corner(position: u32, tex_coord: u32) -> FaceVertex {
        FaceVertex { position, tex_coord: Some(tex_coord) }
    }

    fn quad() -> RawModel {
        RawModel {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            tex_coords: vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0],
            face_vertices: vec![
                corner(0, 0), corner(1, 1), corner(2, 2),
                corner(2, 2), corner(3, 3), corner(0, 0),
            ],
        }
    }

    #[test]
    fn test_shared_corners_are_merged() {
        let mesh = Mesh::from_raw_model(&quad()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_same_position_different_uv_stays_distinct() {
        let mut raw = quad();
        raw.tex_coords.extend_from_slice(&[0.5, 0.5]);
        raw.face_vertices[5] = corner(0, 4);

        let mesh = Mesh::from_raw_model(&raw).unwrap();
        assert_eq!(mesh.vertices.len(), 5);
        assert_eq!(mesh.indices[5], 4);
    }

    #[test]
    fn test_v_coordinate_is_flipped() {
        let mesh = Mesh::from_raw_model(&quad()).unwrap();
        assert_eq!(mesh.vertices[0].tex_coord, [0.0, 1.0]);
        assert_eq!(mesh.vertices[2].tex_coord, [1.0, 0.0]);
        assert_eq!(mesh.vertices[0].color, Vertex::DEFAULT_COLOR);
    }

    #[test]
    fn test_out_of_range_source_index_is_rejected() {
        let mut raw = quad();
        raw.face_vertices[1] = corner(9, 1);
        assert!(matches!(Mesh::from_raw_model(&raw), Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_validate_catches_bad_indices() {
        let vertices = vec![Vertex::new([0.0; 3], [1.0; 3], [0.0; 2]); 3];
        assert!(Mesh::new(vertices.clone(), vec![0, 1, 2]).validate().is_ok());
        assert!(Mesh::new(vertices.clone(), vec![0, 1, 3]).validate().is_err());
        assert!(Mesh::new(vertices, vec![0, 1]).validate().is_err());
        assert!(Mesh::default().validate().is_err());
    }

    #[test]
    fn test_negative_zero_is_a_distinct_vertex() {
        let a = Vertex::new([0.0, 0.0, 0.0], [1.0; 3], [0.0; 2]);
        let b = Vertex::new([-0.0, 0.0, 0.0], [1.0; 3], [0.0; 2]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(Vertex::stride(), 32);
        let offsets: Vec<usize> = Vertex::ATTRIBUTES.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24]);
        let end = Vertex::ATTRIBUTES
            .iter()
            .map(|a| a.offset + a.kind.size())
            .max()
            .unwrap();
        assert_eq!(end, Vertex::stride());
    }
}
