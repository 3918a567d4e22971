/// Triangulated positions and indices extracted from an imported scene.
///
/// Lives only between import and GPU upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            indices.len() % 3 == 0,
            "index count {} is not a multiple of 3",
            indices.len()
        );
        let vertex_count = positions.len() as u32;
        if let Some(bad) = indices.iter().find(|&&i| i >= vertex_count) {
            anyhow::bail!("index {bad} is out of range for {vertex_count} vertices");
        }
        Ok(Self { positions, indices })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub const VERTEX_STRIDE: u64 = std::mem::size_of::<[f32; 3]>() as u64;

    pub fn vertex_attributes() -> Vec<wgpu::VertexAttribute> {
        vec![wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_partial_triangles_and_dangling_indices() {
        assert!(MeshData::new(vec![[0.0; 3]; 3], vec![0, 1]).is_err());
        assert!(MeshData::new(vec![[0.0; 3]; 3], vec![0, 1, 3]).is_err());
        let mesh = MeshData::new(vec![[0.0; 3]; 3], vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.vertex_bytes().len(), 36);
        assert_eq!(mesh.index_bytes().len(), 12);
    }
}
