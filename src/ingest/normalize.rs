use anyhow::{anyhow, Result};

/// Pixel layouts a V4L2 device may hand back after format negotiation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PixelFormat {
    Rgb24,
    Nv12,
    Yuyv,
}

impl PixelFormat {
    pub(crate) fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"RGB3" => Some(PixelFormat::Rgb24),
            b"NV12" => Some(PixelFormat::Nv12),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

pub(crate) fn normalize_to_rgb(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: PixelFormat,
) -> Result<Vec<u8>> {
    match format {
        PixelFormat::Rgb24 => {
            let expected = plane_len(width, height)?
                .checked_mul(3)
                .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
            // Some drivers pad the final buffer; trailing bytes are ignored.
            if pixels.len() < expected {
                return Err(anyhow!(
                    "RGB frame too short: expected {}, got {}",
                    expected,
                    pixels.len()
                ));
            }
            Ok(pixels[..expected].to_vec())
        }
        PixelFormat::Nv12 => nv12_to_rgb(pixels, width, height),
        PixelFormat::Yuyv => yuyv_to_rgb(pixels, width, height),
    }
}

fn plane_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

/// NV12: full-resolution Y plane, then interleaved UV at half resolution.
fn nv12_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 || height % 2 != 0 {
        return Err(anyhow!(
            "NV12 frame dimensions must be even, got {}x{}",
            width,
            height
        ));
    }
    let w = width as usize;
    let h = height as usize;
    let y_plane = plane_len(width, height)?;
    let expected = y_plane
        .checked_add(y_plane / 2)
        .ok_or_else(|| anyhow!("NV12 frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "NV12 frame too short: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; y_plane * 3];
    for j in 0..h {
        for i in 0..w {
            let uv_index = y_plane + (j / 2) * w + (i / 2) * 2;
            let offset = (j * w + i) * 3;
            write_rgb(
                &mut rgb[offset..offset + 3],
                pixels[j * w + i],
                pixels[uv_index],
                pixels[uv_index + 1],
            );
        }
    }

    Ok(rgb)
}

/// YUYV (YUY2): each 4-byte macropixel `Y0 U Y1 V` covers two pixels.
fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    if width % 2 != 0 {
        return Err(anyhow!("YUYV frame width must be even, got {}", width));
    }
    let pixel_count = plane_len(width, height)?;
    let expected = pixel_count
        .checked_mul(2)
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame too short: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; pixel_count * 3];
    for (pair, macro_px) in pixels[..expected].chunks_exact(4).enumerate() {
        let (y0, u, y1, v) = (macro_px[0], macro_px[1], macro_px[2], macro_px[3]);
        let offset = pair * 6;
        write_rgb(&mut rgb[offset..offset + 3], y0, u, v);
        write_rgb(&mut rgb[offset + 3..offset + 6], y1, u, v);
    }

    Ok(rgb)
}

fn write_rgb(out: &mut [u8], y: u8, u: u8, v: u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = y + 1.402_f32 * v;
    let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
    let b = y + 1.772_f32 * u;

    out[0] = clamp_to_u8(r);
    out[1] = clamp_to_u8(g);
    out[2] = clamp_to_u8(b);
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_conversion_produces_gray() -> Result<()> {
        let y_plane = vec![128u8; 4];
        let uv_plane = vec![128u8; 2];
        let nv12 = [y_plane, uv_plane].concat();

        let rgb = normalize_to_rgb(&nv12, 2, 2, PixelFormat::Nv12)?;
        assert_eq!(rgb, vec![128u8; 12]);

        Ok(())
    }

    #[test]
    fn yuyv_conversion_expands_macropixels() -> Result<()> {
        // Two macropixels: black pair, white pair, neutral chroma.
        let yuyv = [16u8, 128, 16, 128, 235, 128, 235, 128];
        let rgb = normalize_to_rgb(&yuyv, 4, 1, PixelFormat::Yuyv)?;

        assert_eq!(rgb.len(), 12);
        assert_eq!(rgb[..6], [16, 16, 16, 16, 16, 16]);
        assert_eq!(rgb[6..], [235, 235, 235, 235, 235, 235]);
        Ok(())
    }

    #[test]
    fn rgb_pass_through_trims_padding() -> Result<()> {
        let mut pixels = vec![1u8; 9];
        pixels.extend_from_slice(&[0, 0]);
        let rgb = normalize_to_rgb(&pixels, 1, 3, PixelFormat::Rgb24)?;
        assert_eq!(rgb, vec![1u8; 9]);
        Ok(())
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(normalize_to_rgb(&[0u8; 8], 2, 2, PixelFormat::Rgb24).is_err());
        assert!(normalize_to_rgb(&[0u8; 5], 2, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_rgb(&[0u8; 4], 3, 1, PixelFormat::Yuyv).is_err());
    }

    #[test]
    fn output_is_rgb_ordered() -> Result<()> {
        // Pure red in BT.601: Y=76, U=85, V=255.
        let yuyv = [76u8, 85, 76, 255];
        let rgb = normalize_to_rgb(&yuyv, 2, 1, PixelFormat::Yuyv)?;
        assert!(rgb[0] > 250, "red channel {}", rgb[0]);
        assert!(rgb[2] < 5, "blue channel {}", rgb[2]);
        Ok(())
    }

    #[test]
    fn odd_nv12_dimensions_are_rejected() {
        // Each buffer meets the Y plus half-Y length check.
        assert!(normalize_to_rgb(&[128u8; 9], 3, 2, PixelFormat::Nv12).is_err());
        assert!(normalize_to_rgb(&[128u8; 9], 2, 3, PixelFormat::Nv12).is_err());
        assert!(normalize_to_rgb(&[128u8; 4], 1, 1, PixelFormat::Nv12).is_err());
    }

    #[test]
    fn fourcc_mapping() {
        assert_eq!(PixelFormat::from_fourcc(b"YUYV"), Some(PixelFormat::Yuyv));
        assert_eq!(PixelFormat::from_fourcc(b"MJPG"), None);
    }
}
