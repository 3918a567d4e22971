use std::{fs, path::Path};

use hello_ngin::resources::AssetLoader;

use crate::common::test_utils::{init_test_logging, loader};
mod common;

const TWO_QUADS_OBJ: &str = "\
o strip
v 0 0 0
v 1 0 0
v 2 0 0
v 0 1 0
v 1 1 0
v 2 1 0
f 1 2 5 4
f 2 3 6 5
o ignored
v 9 9 9
v 9 8 9
v 8 9 9
f 7 8 9
";

fn write_strip_gltf(dir: &Path) {
    let positions: [[f32; 3]; 4] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
    ];
    let bin: Vec<u8> = positions
        .iter()
        .flatten()
        .flat_map(|f| f.to_le_bytes())
        .collect();
    fs::write(dir.join("strip.bin"), &bin).unwrap();

    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "buffers": [{{ "uri": "strip.bin", "byteLength": {len} }}],
  "bufferViews": [{{ "buffer": 0, "byteOffset": 0, "byteLength": {len} }}],
  "accessors": [{{
    "bufferView": 0,
    "componentType": 5126,
    "count": 4,
    "type": "VEC3",
    "min": [0.0, 0.0, 0.0],
    "max": [1.0, 1.0, 0.0]
  }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "mode": 5 }}] }}]
}}"#,
        len = bin.len()
    );
    fs::write(dir.join("strip.gltf"), json).unwrap();
}

#[tokio::test]
async fn obj_quads_are_triangulated_from_the_first_object() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("quads.obj"), TWO_QUADS_OBJ).unwrap();

    let mesh = AssetLoader::new(dir.path())
        .load_mesh("quads.obj")
        .await
        .unwrap();
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.triangle_count(), 4);
    assert_eq!(mesh.indices.len() % 3, 0);
    assert!(mesh.positions.iter().all(|p| p[0] <= 2.0));
}

#[tokio::test]
async fn gltf_strip_without_indices_is_triangulated() {
    let dir = tempfile::tempdir().unwrap();
    write_strip_gltf(dir.path());

    let mesh = AssetLoader::new(dir.path())
        .load_mesh("strip.gltf")
        .await
        .unwrap();
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.indices, vec![0, 1, 2, 2, 1, 3]);
}

#[tokio::test]
async fn gltf_with_missing_buffer_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    write_strip_gltf(dir.path());
    fs::remove_file(dir.path().join("strip.bin")).unwrap();

    let err = AssetLoader::new(dir.path())
        .load_mesh("strip.gltf")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("strip.bin"), "{err:#}");
}

#[tokio::test]
async fn missing_files_name_the_path() {
    let err = loader().load_mesh("models/nope.obj").await.unwrap_err();
    assert!(format!("{err:#}").contains("nope.obj"), "{err:#}");

    let err = loader().load_shader("shaders/nope.wgsl").await.unwrap_err();
    assert!(format!("{err:#}").contains("nope.wgsl"), "{err:#}");
}

#[tokio::test]
async fn corrupt_and_unsupported_files_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
    fs::write(dir.path().join("mesh.stl"), b"solid").unwrap();
    fs::write(dir.path().join("empty.wgsl"), b"  \n").unwrap();
    let loader = AssetLoader::new(dir.path());

    let err = loader.load_image("broken.png").await.unwrap_err();
    assert!(format!("{err:#}").contains("broken.png"), "{err:#}");
    assert!(loader.load_mesh("mesh.stl").await.is_err());
    assert!(loader.load_shader("empty.wgsl").await.is_err());
}

#[tokio::test]
async fn images_decode_to_rgba8() {
    let dir = tempfile::tempdir().unwrap();
    image::RgbImage::from_pixel(4, 2, image::Rgb([1, 2, 3]))
        .save(dir.path().join("small.png"))
        .unwrap();

    let pixels = AssetLoader::new(dir.path())
        .load_image("small.png")
        .await
        .unwrap();
    assert_eq!((pixels.width, pixels.height), (4, 2));
    assert_eq!(pixels.pixels.len(), 4 * 2 * 4);
    assert_eq!(&pixels.pixels[4..8], &[1, 2, 3, 255]);
}

#[tokio::test]
async fn bundled_assets_load() {
    let loader = loader();
    let (mesh, image) = futures::try_join!(
        loader.load_mesh("models/cube.obj"),
        loader.load_image("images/checker.png")
    )
    .unwrap();
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.triangle_count(), 12);
    assert_eq!((image.width, image.height), (256, 256));
}
