//! Colour-map look-up tables.
//!
//! A colour map is authored as a 1024x32 strip and uploaded as a 32³
//! volume: volume texel (u, v, w) is strip pixel (w + 32·u, v).

use image::RgbaImage;

use crate::assets::source::{require_image, AssetError, AssetSource};
use crate::render::effect::TextureKind;
use crate::render::texture::TextureData;

/// Edge length of the LUT cube
pub const LUT_SIZE: u32 = 32;

/// Directory searched when no manifest is configured
pub const COLOR_MAP_DIR: &str = "color_maps";

/// Convert a strip image into a volume LUT
pub fn strip_to_volume(name: &str, strip: &RgbaImage) -> Result<TextureData, AssetError> {
    let (width, height) = strip.dimensions();
    if width != LUT_SIZE * LUT_SIZE || height != LUT_SIZE {
        return Err(AssetError::ColorMapSize {
            name: name.to_string(),
            width,
            height,
            expected_width: LUT_SIZE * LUT_SIZE,
            expected_height: LUT_SIZE,
        });
    }

    let mut rgba = Vec::with_capacity((LUT_SIZE * LUT_SIZE * LUT_SIZE * 4) as usize);
    for w in 0..LUT_SIZE {
        for v in 0..LUT_SIZE {
            for u in 0..LUT_SIZE {
                rgba.extend_from_slice(&strip.get_pixel(w + LUT_SIZE * u, v).0);
            }
        }
    }
    Ok(TextureData {
        kind: TextureKind::D3,
        width: LUT_SIZE,
        height: LUT_SIZE,
        layers: LUT_SIZE,
        rgba,
    })
}

/// Load every colour map.
///
/// With a manifest each listed file must exist. Without one,
/// `color_maps/0000.png`, `0001.png`, ... are read until the first missing
/// index. Finding none at all is an error.
pub fn load_color_maps<S: AssetSource + ?Sized>(
    source: &S,
    manifest: Option<&[String]>,
) -> Result<Vec<TextureData>, AssetError> {
    let mut maps = Vec::new();
    match manifest {
        Some(names) => {
            for name in names {
                let strip = require_image(source, name)?;
                maps.push(strip_to_volume(name, &strip)?);
            }
        }
        None => loop {
            let name = format!("{}/{:04}.png", COLOR_MAP_DIR, maps.len());
            let Some(strip) = source.load_image(&name)? else {
                break;
            };
            maps.push(strip_to_volume(&name, &strip)?);
        },
    }

    if maps.is_empty() {
        return Err(AssetError::NoColorMaps);
    }
    tracing::info!(count = maps.len(), manifest = manifest.is_some(), "colour maps loaded");
    Ok(maps)
}

/// Strip that maps every colour to itself
pub fn identity_strip() -> RgbaImage {
    let scale = |c: u32| (c * 255 / (LUT_SIZE - 1)) as u8;
    RgbaImage::from_fn(LUT_SIZE * LUT_SIZE, LUT_SIZE, |x, y| {
        image::Rgba([scale(x / LUT_SIZE), scale(y), scale(x % LUT_SIZE), 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::source::tests::{solid, MemoryAssets};
    use test_case::test_case;

    fn texel(volume: &TextureData, u: u32, v: u32, w: u32) -> [u8; 4] {
        let i = (((w * LUT_SIZE + v) * LUT_SIZE + u) * 4) as usize;
        [volume.rgba[i], volume.rgba[i + 1], volume.rgba[i + 2], volume.rgba[i + 3]]
    }

    #[test]
    fn test_identity_strip_maps_to_itself() {
        let volume = strip_to_volume("identity", &identity_strip()).unwrap();
        assert!(volume.is_valid());
        assert_eq!(texel(&volume, 0, 0, 0), [0, 0, 0, 255]);
        assert_eq!(texel(&volume, 31, 0, 0), [255, 0, 0, 255]);
        assert_eq!(texel(&volume, 0, 31, 0), [0, 255, 0, 255]);
        assert_eq!(texel(&volume, 0, 0, 31), [0, 0, 255, 255]);
    }

    #[test]
    fn test_volume_addressing() {
        let mut strip = solid(1024, 32, [0; 4]);
        // (u, v, w) = (2, 5, 7) lives at strip (7 + 64, 5)
        strip.put_pixel(71, 5, image::Rgba([1, 2, 3, 4]));
        let volume = strip_to_volume("map", &strip).unwrap();
        assert_eq!(texel(&volume, 2, 5, 7), [1, 2, 3, 4]);
    }

    #[test_case(1023, 32 ; "too narrow")]
    #[test_case(1024, 31 ; "too short")]
    #[test_case(32, 1024 ; "transposed")]
    fn test_wrong_size_is_fatal(w: u32, h: u32) {
        let result = strip_to_volume("bad", &solid(w, h, [0; 4]));
        assert!(matches!(result, Err(AssetError::ColorMapSize { .. })));
    }

    #[test]
    fn test_enumeration_stops_at_first_gap() {
        let assets = MemoryAssets::default()
            .with_image("color_maps/0000.png", identity_strip())
            .with_image("color_maps/0001.png", identity_strip())
            .with_image("color_maps/0003.png", identity_strip());
        assert_eq!(load_color_maps(&assets, None).unwrap().len(), 2);
    }

    #[test]
    fn test_manifest_takes_precedence() {
        let assets = MemoryAssets::default()
            .with_image("color_maps/0000.png", identity_strip())
            .with_image("grades/warm.png", identity_strip());
        let manifest = vec!["grades/warm.png".to_string()];
        assert_eq!(load_color_maps(&assets, Some(&manifest)).unwrap().len(), 1);

        let missing = vec!["grades/cold.png".to_string()];
        assert!(matches!(load_color_maps(&assets, Some(&missing)), Err(AssetError::Missing(_))));
    }

    #[test]
    fn test_no_color_maps_is_fatal() {
        let assets = MemoryAssets::default();
        assert!(matches!(load_color_maps(&assets, None), Err(AssetError::NoColorMaps)));
        assert!(matches!(load_color_maps(&assets, Some(&[])), Err(AssetError::NoColorMaps)));
    }
}
