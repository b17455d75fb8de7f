//! Image import and export for height fields and derived maps.
//!
//! Single-channel maps (height, slope, aspect, curvature, flow, sediment)
//! share one convention: the channel is replicated into R, G and B with
//! A = 1. Files ending in `.exr` are written as 32-bit float, anything else
//! as 16-bit integer. Normal maps get their own encoding.

use std::path::Path;

use image::{ImageBuffer, Luma, Rgba};

use crate::derived::normal::NormalMap;
use crate::error::{Result, TerrainError};
use crate::heightfield::HeightField;
use crate::tilemap::Tilemap;

fn is_exr(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("exr"))
        .unwrap_or(false)
}

#[inline]
fn to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}

/// Decode any image the `image` crate understands into a height field.
/// Colour images are reduced to luminance; integer formats map to [0,1].
pub fn import_heightfield(path: &Path) -> Result<HeightField> {
    let img = image::open(path)?;
    let luma = img.to_luma32f();
    let (width, depth) = (luma.width() as usize, luma.height() as usize);
    if width == 0 || depth == 0 {
        return Err(TerrainError::InvalidInput(format!(
            "{} has no pixels",
            path.display()
        )));
    }
    tracing::debug!("decoded {} ({}x{})", path.display(), width, depth);
    HeightField::from_vec(width, depth, luma.into_raw())
}

/// Write one channel replicated into RGBA.
pub fn export_channel(map: &Tilemap<f32>, path: &Path) -> Result<()> {
    let (w, h) = (map.width as u32, map.height as u32);

    if is_exr(path) {
        let img: ImageBuffer<Rgba<f32>, Vec<f32>> = ImageBuffer::from_fn(w, h, |x, y| {
            let v = *map.get(x as usize, y as usize);
            Rgba([v, v, v, 1.0])
        });
        img.save(path)?;
    } else {
        let img: ImageBuffer<Rgba<u16>, Vec<u16>> = ImageBuffer::from_fn(w, h, |x, y| {
            let v = to_u16(*map.get(x as usize, y as usize));
            Rgba([v, v, v, u16::MAX])
        });
        img.save(path)?;
    }

    tracing::info!("exported {}x{} map to {}", w, h, path.display());
    Ok(())
}

/// Write a height field with the RGBA replicate convention.
pub fn export_heightfield(field: &HeightField, path: &Path) -> Result<()> {
    export_channel(field.tilemap(), path)
}

/// Write a packed normal map: RGB = packed normal, A = 1.
pub fn export_normal_map(map: &NormalMap, path: &Path) -> Result<()> {
    let packed = map.packed();
    let (w, h) = (packed.width as u32, packed.height as u32);

    if is_exr(path) {
        let img: ImageBuffer<Rgba<f32>, Vec<f32>> = ImageBuffer::from_fn(w, h, |x, y| {
            let [r, g, b] = *packed.get(x as usize, y as usize);
            Rgba([r, g, b, 1.0])
        });
        img.save(path)?;
    } else {
        let img: ImageBuffer<Rgba<u16>, Vec<u16>> = ImageBuffer::from_fn(w, h, |x, y| {
            let [r, g, b] = *packed.get(x as usize, y as usize);
            Rgba([to_u16(r), to_u16(g), to_u16(b), u16::MAX])
        });
        img.save(path)?;
    }

    tracing::info!("exported {}x{} normal map to {}", w, h, path.display());
    Ok(())
}

/// Write a 16-bit grayscale image. This is the on-disk tile format used by
/// image-backed terrain and the lossless way to hand a field to other tools.
pub fn export_grayscale16(field: &HeightField, path: &Path) -> Result<()> {
    let (w, h) = (field.width() as u32, field.depth() as u32);
    let img: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(w, h, |x, y| Luma([to_u16(field.get(x as usize, y as usize))]));
    img.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derived::{normal_map, NormalParams};

    #[test]
    fn test_grayscale16_round_trip_is_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.png");
        let field = HeightField::from_fn(16, 8, |x, z| (x + z) as f32 / 22.0);

        export_grayscale16(&field, &path).unwrap();
        let back = import_heightfield(&path).unwrap();

        assert_eq!(back.dimensions(), (16, 8));
        for (a, b) in field.as_slice().iter().zip(back.as_slice()) {
            assert!((a - b).abs() < 1.0 / 65535.0 + 1e-6);
        }
    }

    #[test]
    fn test_export_channel_replicates_into_rgba() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slope.png");
        let field = HeightField::from_fn(4, 4, |x, _| x as f32 / 3.0);

        export_heightfield(&field, &path).unwrap();
        let img = image::open(&path).unwrap().to_rgba16();
        let px = img.get_pixel(3, 0);
        assert_eq!(px.0, [u16::MAX, u16::MAX, u16::MAX, u16::MAX]);
        let px = img.get_pixel(0, 2);
        assert_eq!(px.0[0], 0);
        assert_eq!(px.0[3], u16::MAX);
    }

    #[test]
    fn test_import_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(import_heightfield(&dir.path().join("nope.png")).is_err());
    }

    #[test]
    fn test_png_channel_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.png");
        let field = HeightField::from_fn(9, 5, |x, z| (x * 5 + z) as f32 / 44.0);

        export_heightfield(&field, &path).unwrap();
        assert_eq!(image::open(&path).unwrap().color(), image::ColorType::Rgba16);
        let back = import_heightfield(&path).unwrap();

        assert_eq!(back.dimensions(), (9, 5));
        for (a, b) in field.as_slice().iter().zip(back.as_slice()) {
            assert!((a - b).abs() < 2.0 / 65535.0);
        }
    }

    #[test]
    fn test_exr_channel_keeps_float_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("height.exr");
        let field = HeightField::from_fn(6, 4, |x, z| 0.1 + 0.123_456 * x as f32 / 5.0 + 0.01 * z as f32);

        export_heightfield(&field, &path).unwrap();
        let img = image::open(&path).unwrap();
        assert!(matches!(
            img.color(),
            image::ColorType::Rgba32F | image::ColorType::Rgb32F
        ));

        let rgba = img.to_rgba32f();
        for z in 0..4 {
            for x in 0..6 {
                let px = rgba.get_pixel(x, z).0;
                let v = field.get(x as usize, z as usize);
                assert!((px[0] - v).abs() < 1e-6);
                assert_eq!(px[0], px[1]);
                assert_eq!(px[1], px[2]);
            }
        }
    }

    #[test]
    fn test_flat_normal_map_encodes_straight_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.png");
        let flat = HeightField::new_with(8, 8, 0.4);
        let normals = normal_map(&flat, &NormalParams::default());

        export_normal_map(&normals, &path).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (8, 8));
        for px in img.pixels() {
            let [r, g, b, a] = px.0;
            assert!((r as i32 - 128).abs() <= 1, "r = {}", r);
            assert!((g as i32 - 128).abs() <= 1, "g = {}", g);
            assert!(b >= 254, "b = {}", b);
            assert_eq!(a, 255);
        }
    }

    #[test]
    fn test_normal_map_exr_is_float() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.exr");
        let ramp = HeightField::from_fn(8, 8, |x, _| x as f32 / 7.0);
        let normals = normal_map(&ramp, &NormalParams::default());

        export_normal_map(&normals, &path).unwrap();
        let img = image::open(&path).unwrap().to_rgba32f();
        let packed = normals.packed();
        let px = img.get_pixel(3, 3).0;
        let expected = *packed.get(3, 3);
        for c in 0..3 {
            assert!((px[c] - expected[c]).abs() < 1e-6);
        }
        // Heights rise to the east, so the normal leans west.
        assert!(px[0] < 0.5);
    }
}
