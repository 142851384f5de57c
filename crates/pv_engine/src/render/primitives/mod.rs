//! Backend-agnostic geometry types

pub mod mesh;

pub use mesh::{AttributeKind, Mesh, Vertex, VertexAttribute, VertexInput};
