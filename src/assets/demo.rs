//! Loads and uploads everything the demo draws with.

use crate::assets::lut::load_color_maps;
use crate::assets::source::{cube_texture, numbered_images, texture_2d, volume_texture, AssetError, AssetSource};
use crate::render::mesh::MeshHandle;
use crate::render::texture::{TextureData, TextureHandle};
use crate::render::{GpuBackend, PostResources, SceneResources};

pub const BUST_MESH: &str = "bust.json";
pub const CHROME_MESH: &str = "chrome.json";
pub const TUNNEL_MESH: &str = "tunnel.json";
pub const ENVIRONMENT_DIR: &str = "environment";
pub const VOLUME_NOISE: &str = "volume_noise.png";
pub const CLOUD_SPRITE: &str = "particle.png";
pub const LIGHT_SPRITE: &str = "light.png";
pub const NOISE: &str = "noise.png";
pub const SPECTRUM: &str = "spectrum.png";
pub const OVERLAY_DIR: &str = "overlays";

/// Uploaded demo resources
#[derive(Debug, Clone)]
pub struct DemoAssets {
    pub scene: SceneResources,
    pub post: PostResources,
}

impl DemoAssets {
    /// Load every asset from `source` and upload it to `backend`. Any
    /// missing or malformed asset is an error.
    pub fn load<S, B>(source: &S, backend: &mut B, color_maps: Option<&[String]>) -> Result<Self, AssetError>
    where
        S: AssetSource + ?Sized,
        B: GpuBackend + ?Sized,
    {
        let mut mesh = |name: &str| -> Result<MeshHandle, AssetError> {
            let data = source.load_mesh(name)?;
            tracing::debug!(name, vertices = data.vertices.len(), "mesh loaded");
            Ok(backend.upload_mesh(&data)?)
        };
        let bust = mesh(BUST_MESH)?;
        let chrome = mesh(CHROME_MESH)?;
        let tunnel = mesh(TUNNEL_MESH)?;

        let mut upload = |data: TextureData| -> Result<TextureHandle, AssetError> { Ok(backend.upload_texture(&data)?) };
        let scene = SceneResources {
            bust,
            chrome,
            tunnel,
            environment: upload(cube_texture(source, ENVIRONMENT_DIR)?)?,
            volume_noise: upload(volume_texture(source, VOLUME_NOISE)?)?,
            cloud_sprite: upload(texture_2d(source, CLOUD_SPRITE)?)?,
            light_sprite: upload(texture_2d(source, LIGHT_SPRITE)?)?,
        };

        let noise = upload(texture_2d(source, NOISE)?)?;
        let spectrum = upload(texture_2d(source, SPECTRUM)?)?;

        let overlay_images = numbered_images(source, OVERLAY_DIR)?;
        if overlay_images.is_empty() {
            return Err(AssetError::NoOverlays(OVERLAY_DIR.to_string()));
        }
        let overlays = overlay_images
            .into_iter()
            .map(|(_, img)| {
                let (w, h) = img.dimensions();
                upload(TextureData::new_2d(w, h, img.into_raw()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let color_maps = load_color_maps(source, color_maps)?
            .into_iter()
            .map(&mut upload)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(overlays = overlays.len(), color_maps = color_maps.len(), "assets uploaded");
        Ok(Self {
            scene,
            post: PostResources {
                noise,
                spectrum,
                overlays,
                color_maps,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::lut::identity_strip;
    use crate::assets::source::tests::{solid, MemoryAssets};
    use crate::assets::source::CUBE_FACES;
    use crate::render::mesh::{MeshData, MeshVertex};
    use crate::render::testing::RecordingBackend;

    fn complete() -> MemoryAssets {
        let v = MeshVertex { position: [0.0; 3], normal: [0.0, 1.0, 0.0] };
        let mesh = MeshData { vertices: vec![v; 3], indices: vec![0, 1, 2] };
        let mut assets = MemoryAssets::default();
        for name in [BUST_MESH, CHROME_MESH, TUNNEL_MESH] {
            assets.meshes.insert(name.to_string(), mesh.clone());
        }
        for face in CUBE_FACES {
            assets = assets.with_image(&format!("{}/{}", ENVIRONMENT_DIR, face), solid(4, 4, [9; 4]));
        }
        assets
            .with_image(VOLUME_NOISE, solid(16, 4, [1; 4]))
            .with_image(CLOUD_SPRITE, solid(8, 8, [255; 4]))
            .with_image(LIGHT_SPRITE, solid(8, 8, [255; 4]))
            .with_image(NOISE, solid(16, 16, [128; 4]))
            .with_image(SPECTRUM, solid(64, 1, [10; 4]))
            .with_image("overlays/0000.png", solid(4, 2, [0; 4]))
            .with_image("overlays/0001.png", solid(4, 2, [0; 4]))
            .with_image("color_maps/0000.png", identity_strip())
    }

    #[test]
    fn test_loads_everything() {
        let mut backend = RecordingBackend::new(16);
        let demo = DemoAssets::load(&complete(), &mut backend, None).unwrap();
        assert_eq!(demo.post.overlays.len(), 2);
        assert_eq!(demo.post.color_maps.len(), 1);
        assert_ne!(demo.scene.bust, demo.scene.tunnel);
    }

    #[test]
    fn test_no_overlays_is_fatal() {
        let mut assets = complete();
        assets.images.retain(|name, _| !name.starts_with(OVERLAY_DIR));
        let result = DemoAssets::load(&assets, &mut RecordingBackend::new(16), None);
        assert!(matches!(result, Err(AssetError::NoOverlays(_))));
    }

    #[test]
    fn test_no_color_maps_is_fatal() {
        let mut assets = complete();
        assets.images.remove("color_maps/0000.png");
        let result = DemoAssets::load(&assets, &mut RecordingBackend::new(16), None);
        assert!(matches!(result, Err(AssetError::NoColorMaps)));
    }

    #[test]
    fn test_missing_mesh_is_fatal() {
        let mut assets = complete();
        assets.meshes.remove(TUNNEL_MESH);
        let result = DemoAssets::load(&assets, &mut RecordingBackend::new(16), None);
        assert!(matches!(result, Err(AssetError::Missing(name)) if name == TUNNEL_MESH));
    }
}
