//! Mesh import. Only positions and indices of the first sub-mesh are kept.

use std::{
    future::Future,
    io::{BufReader, Cursor},
};

use anyhow::{Context, Result, bail};
use gltf::mesh::Mode;

use crate::data_structures::mesh::MeshData;

/// Parses Wavefront OBJ text. Polygons are triangulated by tobj; material
/// libraries are not loaded.
pub async fn parse_obj(bytes: &[u8]) -> Result<MeshData> {
    let mut reader = BufReader::new(Cursor::new(bytes));
    let (models, _materials) = tobj::load_obj_buf_async(
        &mut reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |_: String| async { Err(tobj::LoadError::OpenFileFailed) },
    )
    .await?;

    if models.len() > 1 {
        log::debug!("scene has {} meshes, using the first", models.len());
    }
    let model = models.into_iter().next().context("scene contains no meshes")?;
    let positions = model
        .mesh
        .positions
        .chunks_exact(3)
        .map(|p| [p[0], p[1], p[2]])
        .collect();
    MeshData::new(positions, model.mesh.indices)
}

/// Parses a glTF document (`.gltf` JSON or `.glb`) and reads the first
/// primitive of the first mesh. External buffers are fetched through
/// `load_uri`, relative to the document.
pub async fn parse_gltf<F, Fut>(bytes: &[u8], load_uri: F) -> Result<MeshData>
where
    F: Fn(&str) -> Fut,
    Fut: Future<Output = Result<Vec<u8>>>,
{
    let gltf = gltf::Gltf::from_slice(bytes)?;

    let mut buffer_data = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .context("buffer refers to a missing binary chunk")?,
            gltf::buffer::Source::Uri(uri) if uri.starts_with("data:") => {
                bail!("embedded data URIs are not supported")
            }
            gltf::buffer::Source::Uri(uri) => load_uri(uri).await?,
        };
        anyhow::ensure!(
            data.len() >= buffer.length(),
            "buffer {} holds {} bytes, {} declared",
            buffer.index(),
            data.len(),
            buffer.length()
        );
        buffer_data.push(data);
    }

    let mesh = gltf.meshes().next().context("scene contains no meshes")?;
    let primitive = mesh
        .primitives()
        .next()
        .context("mesh has no primitives")?;
    let reader = primitive.reader(|buffer| buffer_data.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .context("primitive has no positions")?
        .collect();
    let raw_indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    let indices = triangulate(primitive.mode(), &raw_indices)?;
    MeshData::new(positions, indices)
}

/// Turns strip and fan index lists into plain triangle lists.
pub fn triangulate(mode: Mode, indices: &[u32]) -> Result<Vec<u32>> {
    match mode {
        Mode::Triangles => Ok(indices.to_vec()),
        Mode::TriangleStrip => Ok(triangulate_strip(indices)),
        Mode::TriangleFan => Ok(triangulate_fan(indices)),
        other => bail!("{other:?} primitives cannot be drawn as triangles"),
    }
}

/// Every other triangle of a strip has its winding flipped back.
pub fn triangulate_strip(indices: &[u32]) -> Vec<u32> {
    indices
        .windows(3)
        .enumerate()
        .flat_map(|(i, w)| {
            if i % 2 == 0 {
                [w[0], w[1], w[2]]
            } else {
                [w[1], w[0], w[2]]
            }
        })
        .collect()
}

pub fn triangulate_fan(indices: &[u32]) -> Vec<u32> {
    if indices.len() < 3 {
        return Vec::new();
    }
    (1..indices.len() - 1)
        .flat_map(|i| [indices[0], indices[i], indices[i + 1]])
        .collect()
}
