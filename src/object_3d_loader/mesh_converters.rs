use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::error::MeshLoadError;
use crate::scene_pkg::mesh::{Mesh, Normal, Uv, Vertex};

/// Parses an OBJ-style text mesh into a `Mesh`. Faces are expanded into
/// a flat triangle list with sequential 16-bit indices; `vt` records are
/// optional and their absence clears the mesh's `has_uvs` flag.
pub struct ObjFileToMeshConverter {
    path: PathBuf,
}

impl ObjFileToMeshConverter {
    pub fn new(path: &Path) -> ObjFileToMeshConverter {
        ObjFileToMeshConverter {
            path: path.to_path_buf(),
        }
    }

    pub fn create_mesh(&self) -> Result<Mesh, MeshLoadError> {
        let mut vertex_indices: Vec<usize> = vec![];
        let mut uv_indices: Vec<Option<usize>> = vec![];
        let mut normal_indices: Vec<usize> = vec![];

        let mut tmp_vertices: Vec<Vertex> = vec![];
        let mut tmp_normals: Vec<Normal> = vec![];
        let mut tmp_uvs: Vec<Uv> = vec![];

        let lines = read_lines(&self.path).map_err(|source| MeshLoadError::Io {
            path: self.path.clone(),
            source,
        })?;

        for (line_number, line_result) in lines.enumerate() {
            let line = line_result.map_err(|source| MeshLoadError::Io {
                path: self.path.clone(),
                source,
            })?;
            let mut line_parts = line.split_whitespace();
            let line_id = match line_parts.next() {
                Some(id) => id,
                None => continue,
            };
            match line_id {
                "v" => {
                    let [x, y, z] = self.parse_floats(line_number, &mut line_parts)?;
                    tmp_vertices.push(Vertex {
                        position: [x, y, z],
                    });
                }
                "vt" => {
                    let u = self.parse_float(line_number, line_parts.next())?;
                    let v = self.parse_float(line_number, line_parts.next())?;
                    tmp_uvs.push(Uv { uv: [u, -v] });
                }
                "vn" => {
                    let [x, y, z] = self.parse_floats(line_number, &mut line_parts)?;
                    tmp_normals.push(Normal { normal: [x, y, z] });
                }
                "f" => {
                    for _ in 0..3 {
                        let corner = line_parts.next().ok_or_else(|| {
                            self.parse_error(line_number, "face with fewer than three corners")
                        })?;
                        let mut refs = corner.split('/');
                        let vertex = self.parse_index(line_number, refs.next())?;
                        let uv = match refs.next() {
                            Some("") | None => None,
                            Some(text) => Some(self.parse_index(line_number, Some(text))?),
                        };
                        let normal = self.parse_index(line_number, refs.next())?;
                        vertex_indices.push(vertex);
                        uv_indices.push(uv);
                        normal_indices.push(normal);
                    }
                }
                _ => {}
            }
        }

        // Draws index with u16, so a corner past that range would wrap
        // onto an unrelated vertex.
        if vertex_indices.len() > usize::from(u16::MAX) + 1 {
            return Err(self.parse_error(0, "face corner count exceeds 16-bit index range"));
        }

        let mut mesh = Mesh::default();
        mesh.has_uvs = !tmp_uvs.is_empty() && uv_indices.iter().all(|uv| uv.is_some());
        for i in 0..vertex_indices.len() {
            let vertex = tmp_vertices
                .get(vertex_indices[i] - 1)
                .ok_or_else(|| self.parse_error(0, "face references a vertex out of range"))?;
            mesh.vertices.push(*vertex);

            let normal = tmp_normals
                .get(normal_indices[i] - 1)
                .ok_or_else(|| self.parse_error(0, "face references a normal out of range"))?;
            mesh.normals.push(*normal);

            match uv_indices[i] {
                Some(uv_index) => {
                    let uv = tmp_uvs
                        .get(uv_index - 1)
                        .ok_or_else(|| self.parse_error(0, "face references a uv out of range"))?;
                    mesh.uvs.push(*uv);
                }
                None => mesh.uvs.push(Uv::default()),
            }

            mesh.indices.push(i as u16);
        }

        Ok(mesh)
    }

    // private methods

    fn parse_floats<'a>(
        &self,
        line: usize,
        parts: &mut impl Iterator<Item = &'a str>,
    ) -> Result<[f32; 3], MeshLoadError> {
        Ok([
            self.parse_float(line, parts.next())?,
            self.parse_float(line, parts.next())?,
            self.parse_float(line, parts.next())?,
        ])
    }

    fn parse_float(&self, line: usize, text: Option<&str>) -> Result<f32, MeshLoadError> {
        text.ok_or_else(|| self.parse_error(line, "missing component"))?
            .parse::<f32>()
            .map_err(|_| self.parse_error(line, "component is not a number"))
    }

    fn parse_index(&self, line: usize, text: Option<&str>) -> Result<usize, MeshLoadError> {
        let index = text
            .ok_or_else(|| self.parse_error(line, "missing face index"))?
            .parse::<usize>()
            .map_err(|_| self.parse_error(line, "face index is not a positive integer"))?;
        if index == 0 {
            return Err(self.parse_error(line, "face indices are one-based"));
        }
        Ok(index)
    }

    fn parse_error(&self, line: usize, detail: &str) -> MeshLoadError {
        MeshLoadError::Parse {
            path: self.path.clone(),
            line: line + 1,
            detail: detail.to_string(),
        }
    }
}

fn read_lines<P>(filename: P) -> io::Result<io::Lines<io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(filename)?;
    Ok(io::BufReader::new(file).lines())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use super::*;

    fn write_obj(name: &str, contents: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("ember3d_obj_{}_{}.obj", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_a_textured_triangle() {
        let path = write_obj(
            "textured",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvn 0 0 1\nf 1/1/1 2/2/1 3/3/1\n",
        );
        let mesh = ObjFileToMeshConverter::new(&path).create_mesh().unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.normals.len(), 3);
        assert_eq!(mesh.uvs.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert!(mesh.has_uvs);
        // The V coordinate is flipped on load.
        assert_eq!(mesh.uvs[2].uv, [0.0, -1.0]);
    }

    #[test]
    fn triangle_without_uvs_clears_the_flag() {
        let path = write_obj(
            "untextured",
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n",
        );
        let mesh = ObjFileToMeshConverter::new(&path).create_mesh().unwrap();
        std::fs::remove_file(path).ok();

        assert!(!mesh.has_uvs);
        assert_eq!(mesh.uvs.len(), mesh.vertices.len());
    }

    #[test]
    fn malformed_vertex_is_a_parse_error() {
        let path = write_obj("malformed", "v 0 zero 0\n");
        let result = ObjFileToMeshConverter::new(&path).create_mesh();
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(MeshLoadError::Parse { line: 1, .. })));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = PathBuf::from("/nonexistent/ember3d/missing.obj");
        let result = ObjFileToMeshConverter::new(&path).create_mesh();
        assert!(matches!(result, Err(MeshLoadError::Io { .. })));
    }

    #[test]
    fn mesh_exceeding_u16_index_range_is_rejected() {
        // 21846 triangles expand to 65538 corners, one past what a u16
        // index buffer can address without wrapping.
        let mut contents = String::from("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\n");
        for _ in 0..21846 {
            contents.push_str("f 1//1 2//1 3//1\n");
        }
        let path = write_obj("oversized", &contents);
        let result = ObjFileToMeshConverter::new(&path).create_mesh();
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(MeshLoadError::Parse { .. })));
    }

    #[test]
    fn mesh_at_the_u16_index_limit_is_accepted() {
        // 65535 corners still fit a u16 index buffer.
        let mut contents = String::from("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\n");
        for _ in 0..21845 {
            contents.push_str("f 1//1 2//1 3//1\n");
        }
        let path = write_obj("at_limit", &contents);
        let mesh = ObjFileToMeshConverter::new(&path).create_mesh().unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(mesh.vertices.len(), 65535);
        assert_eq!(*mesh.indices.last().unwrap(), 65534);
    }

    #[test]
    fn out_of_range_face_index_is_rejected() {
        let path = write_obj("out_of_range", "v 0 0 0\nvn 0 0 1\nf 1//1 2//1 3//1\n");
        let result = ObjFileToMeshConverter::new(&path).create_mesh();
        std::fs::remove_file(path).ok();

        assert!(matches!(result, Err(MeshLoadError::Parse { .. })));
    }
}
