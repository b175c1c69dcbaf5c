use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use fast_image_resize as fir;
use image::RgbaImage;
use tracing::debug;

use crate::error::Error;

/// Decodes an image to RGBA8 and applies EXIF orientation if available.
///
/// Missing metadata keeps the stored orientation.
pub fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage, Error> {
    let reader = image::ImageReader::open(path).map_err(|err| open_error(path, err))?;
    let img = reader
        .with_guessed_format()
        .map_err(|err| open_error(path, err))?
        .decode()
        .map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    let img = img.to_rgba8();

    let orientation = read_orientation(path).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn open_error(path: &Path, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::AssetNotFound(path.to_path_buf())
    } else {
        Error::Io(err)
    }
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        // transpose
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        // transverse
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!(orientation = o, path = %path.display(), "exif orientation");
    Some(o)
}

/// Stretch-resamples `src` to a `size × size` square.
///
/// Aspect ratio is not preserved; photos fill their square tile.
pub fn resample_square(path: &Path, src: &RgbaImage, size: u32) -> Result<RgbaImage, Error> {
    let resample_err = |reason: String| Error::Resample {
        path: path.to_path_buf(),
        reason,
    };
    let (w, h) = src.dimensions();
    if (w, h) == (size, size) {
        return Ok(src.clone());
    }
    let src_view = fir::images::ImageRef::new(w, h, src.as_raw(), fir::PixelType::U8x4)
        .map_err(|err| resample_err(err.to_string()))?;
    let mut dst = fir::images::Image::new(size, size, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src_view, &mut dst, Some(&options))
        .map_err(|err| resample_err(err.to_string()))?;
    RgbaImage::from_raw(size, size, dst.into_vec())
        .ok_or_else(|| resample_err("resized buffer has the wrong length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use image::Rgba;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let img = decode_rgba8_apply_exif(&path).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn missing_file_is_asset_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_rgba8_apply_exif(&dir.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, Error::AssetNotFound(_)));
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = decode_rgba8_apply_exif(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn stretches_to_square() {
        let src = RgbaImage::from_pixel(40, 10, Rgba([10, 20, 30, 255]));
        let out = resample_square(Path::new("wide.png"), &src, 16).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
        let px = out.get_pixel(8, 8);
        for (got, want) in px.0.iter().zip([10u8, 20, 30, 255]) {
            assert!(got.abs_diff(want) <= 1, "{px:?}");
        }
    }
}
