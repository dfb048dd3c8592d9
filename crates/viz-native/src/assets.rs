//! Filesystem asset loader: glTF models and image textures resolved
//! relative to an asset root directory.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use viz_core::assets::{AssetLoader, ModelData, TextureData};

pub struct FsAssetLoader {
    root: PathBuf,
}

impl FsAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn decode_image(&self, path: &str) -> Result<TextureData> {
        let full = self.root.join(path);
        let image = image::open(&full)
            .with_context(|| format!("decoding {}", full.display()))?
            .to_rgba8();
        Ok(TextureData {
            width: image.width(),
            height: image.height(),
            pixels: image.into_raw(),
        })
    }
}

impl AssetLoader for FsAssetLoader {
    /// Flatten the first primitive of the first mesh into attribute
    /// arrays. The generated geometry pipeline only needs positions,
    /// normals, uvs and indices.
    fn load_model(&self, path: &str) -> Result<ModelData> {
        let full = self.root.join(path);
        let (document, buffers, _images) =
            gltf::import(&full).with_context(|| format!("importing {}", full.display()))?;

        let mesh = document
            .meshes()
            .next()
            .ok_or_else(|| anyhow!("{path}: no meshes"))?;
        let primitive = mesh
            .primitives()
            .next()
            .ok_or_else(|| anyhow!("{path}: mesh has no primitives"))?;
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions = reader
            .read_positions()
            .ok_or_else(|| anyhow!("{path}: primitive has no positions"))?
            .flatten()
            .collect();
        let normals = reader
            .read_normals()
            .map(|iter| iter.flatten().collect())
            .unwrap_or_default();
        let uvs = reader
            .read_tex_coords(0)
            .map(|coords| coords.into_f32().flatten().collect())
            .unwrap_or_default();
        let indices = reader
            .read_indices()
            .map(|iter| iter.into_u32().collect())
            .unwrap_or_default();

        Ok(ModelData {
            positions,
            normals,
            uvs,
            indices,
        })
    }

    fn load_texture(&self, path: &str) -> Result<TextureData> {
        self.decode_image(path)
    }

    fn load_environment(&self, path: &str) -> Result<TextureData> {
        // HDR probes are tonemapped to RGBA8 on load; the background
        // pass does not need the radiance range.
        self.decode_image(path)
    }
}
