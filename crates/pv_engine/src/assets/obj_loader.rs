//! OBJ file loader for 3D models
//!
//! Decoding is delegated to `tobj`. The loader flattens every object in the file
//! into one [`RawModel`]: a flat position array, a flat texture coordinate array and
//! a list of triangle corners that index into both. Vertex deduplication happens
//! later in [`crate::render::Mesh::from_raw_model`].

use std::path::Path;
use crate::assets::AssetError;
use crate::render::Mesh;

/// One triangle corner as it appears in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    /// Index into [`RawModel::positions`], counted in whole `[x, y, z]` triples
    pub position: u32,
    /// Index into [`RawModel::tex_coords`], counted in whole `[u, v]` pairs
    pub tex_coord: Option<u32>,
}

/// Undeduplicated geometry straight from the decoder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawModel {
    /// `x, y, z` triples
    pub positions: Vec<f32>,
    /// `u, v` pairs with the file's bottom-left origin
    pub tex_coords: Vec<f32>,
    /// Triangle corners, three per face
    pub face_vertices: Vec<FaceVertex>,
}

impl RawModel {
    /// Number of `[x, y, z]` positions
    pub fn position_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of `[u, v]` texture coordinates
    pub fn tex_coord_count(&self) -> usize {
        self.tex_coords.len() / 2
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.face_vertices.len() / 3
    }
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    fn load_options() -> tobj::LoadOptions {
        tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        }
    }

    /// Load an OBJ file into flat, undeduplicated arrays
    pub fn load_raw<P: AsRef<Path>>(path: P) -> Result<RawModel, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        log::debug!("Loading OBJ model from: {:?}", path);

        // Materials are not used; a missing .mtl is not an error here
        let (models, _materials) = tobj::load_obj(path, &Self::load_options())
            .map_err(|e| AssetError::LoadFailed(format!("Failed to parse {}: {e}", path.display())))?;

        let mut raw = RawModel::default();
        for model in &models {
            Self::append_mesh(&mut raw, &model.mesh)?;
        }

        log::info!(
            "Loaded OBJ {:?}: {} objects, {} positions, {} triangles",
            path,
            models.len(),
            raw.position_count(),
            raw.triangle_count()
        );

        Ok(raw)
    }

    /// Load an OBJ file and return a deduplicated mesh
    pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh, AssetError> {
        let raw = Self::load_raw(path)?;
        Mesh::from_raw_model(&raw)
    }

    fn append_mesh(raw: &mut RawModel, mesh: &tobj::Mesh) -> Result<(), AssetError> {
        let position_base = to_index(raw.position_count())?;
        let tex_coord_base = to_index(raw.tex_coord_count())?;
        let has_tex_coords = !mesh.texcoord_indices.is_empty();

        if has_tex_coords && mesh.texcoord_indices.len() != mesh.indices.len() {
            return Err(AssetError::InvalidData(format!(
                "Texture coordinate indices ({}) do not match position indices ({})",
                mesh.texcoord_indices.len(),
                mesh.indices.len()
            )));
        }
        if mesh.indices.len() % 3 != 0 {
            return Err(AssetError::InvalidData(format!(
                "Face list of {} corners is not a triangle list",
                mesh.indices.len()
            )));
        }

        raw.positions.extend_from_slice(&mesh.positions);
        raw.tex_coords.extend_from_slice(&mesh.texcoords);
        raw.face_vertices.extend(mesh.indices.iter().enumerate().map(|(corner, &position)| {
            FaceVertex {
                position: position_base + position,
                tex_coord: has_tex_coords.then(|| tex_coord_base + mesh.texcoord_indices[corner]),
            }
        }));

        Ok(())
    }
}

fn to_index(count: usize) -> Result<u32, AssetError> {
    u32::try_from(count)
        .map_err(|_| AssetError::InvalidData(format!("{count} elements exceed the 32-bit index range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_obj(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_quad_loads_as_two_triangles() {
        let file = write_obj(
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             f 1/1 2/2 3/3 4/4\n",
        );
        let raw = ObjLoader::load_raw(file.path()).unwrap();

        assert_eq!(raw.position_count(), 4);
        assert_eq!(raw.tex_coord_count(), 4);
        assert_eq!(raw.triangle_count(), 2);
        assert!(raw.face_vertices.iter().all(|corner| corner.tex_coord.is_some()));
    }

    #[test]
    fn test_missing_tex_coords_are_none() {
        let file = write_obj("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
        let raw = ObjLoader::load_raw(file.path()).unwrap();

        assert_eq!(raw.face_vertices.len(), 3);
        assert!(raw.face_vertices.iter().all(|corner| corner.tex_coord.is_none()));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        assert!(matches!(
            ObjLoader::load_raw("no/such/model.obj"),
            Err(AssetError::NotFound(_))
        ));
    }
}
