use image::RgbaImage;
use serde::Serialize;

/// Straight-alpha colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub fn from_rgba8(px: &image::Rgba<u8>) -> Self {
        Self {
            r: f32::from(px[0]) / 255.0,
            g: f32::from(px[1]) / 255.0,
            b: f32::from(px[2]) / 255.0,
            a: f32::from(px[3]) / 255.0,
        }
    }
}

/// Unweighted average of every pixel in `[x0, x1) × [y0, y1)`.
///
/// Empty regions are transparent black. Callers clamp the bounds.
pub fn average_region(img: &RgbaImage, x0: u32, y0: u32, x1: u32, y1: u32) -> Color {
    let mut accum = [0f64; 4];
    let mut count = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let px = img.get_pixel(x, y);
            for c in 0..4 {
                accum[c] += f64::from(px[c]);
            }
            count += 1;
        }
    }
    if count == 0 {
        return Color::TRANSPARENT;
    }
    let scale = 255.0 * count as f64;
    Color {
        r: (accum[0] / scale) as f32,
        g: (accum[1] / scale) as f32,
        b: (accum[2] / scale) as f32,
        a: (accum[3] / scale) as f32,
    }
}
