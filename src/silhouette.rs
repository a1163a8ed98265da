//! Silhouette derivation for animated monster sprites.
//!
//! [`transform`] is pure: every visible pixel becomes black with its original alpha,
//! fully transparent pixels are left exactly as they were, and frame timing is kept.
//! [`encode_gif`] re-indexes each frame to an adaptive palette and writes a looping GIF
//! whose frames restore to background between draws.

use crate::artifact_cache::write_atomically;
use crate::error::{ScrapeError, ScrapeResult};
use color_quant::NeuQuant;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ImageDecoder, ImageFormat, RgbaImage};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// Used for frames that do not declare a delay
pub const DEFAULT_FRAME_DURATION_MS: u32 = 100;

/// One palette slot is kept back for transparency
const MAX_PALETTE_COLORS: usize = 255;
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub pixels: RgbaImage,
    /// Offset of `pixels` on the animation canvas
    pub left: u32,
    pub top: u32,
    pub duration_ms: Option<u32>,
}

impl Frame {
    pub fn new(pixels: RgbaImage, duration_ms: Option<u32>) -> Self {
        Self { pixels, left: 0, top: 0, duration_ms }
    }
}

/// Ordered frames sharing one canvas size
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame>,
}

/// A frame reduced to palette indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    /// RGB triples, at most 256 entries including the reserved slot
    pub palette: Vec<u8>,
    pub indices: Vec<u8>,
    pub transparent: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SilhouetteOutcome {
    Created,
    AlreadyPresent,
    Skipped(String),
}

/// Build the silhouette of `animation`. Output frames cover the full canvas at the
/// origin and always carry a duration.
pub fn transform(animation: &Animation) -> Animation {
    let frames = animation
        .frames
        .iter()
        .map(|frame| {
            let mut canvas = RgbaImage::new(animation.width, animation.height);
            image::imageops::replace(&mut canvas, &frame.pixels, frame.left as i64, frame.top as i64);
            for px in canvas.pixels_mut() {
                if px[3] > 0 {
                    px[0] = 0;
                    px[1] = 0;
                    px[2] = 0;
                }
            }
            Frame::new(canvas, Some(frame.duration_ms.unwrap_or(DEFAULT_FRAME_DURATION_MS)))
        })
        .collect();

    Animation {
        width: animation.width,
        height: animation.height,
        frames,
    }
}

/// Decode a GIF into its frames, or any other supported format into a single frame.
pub fn decode(bytes: &[u8]) -> ScrapeResult<Animation> {
    match image::guess_format(bytes)? {
        ImageFormat::Gif => decode_gif(bytes),
        _ => {
            let pixels = image::load_from_memory(bytes)?.to_rgba8();
            Ok(Animation {
                width: pixels.width(),
                height: pixels.height(),
                frames: vec![Frame::new(pixels, None)],
            })
        }
    }
}

fn decode_gif(bytes: &[u8]) -> ScrapeResult<Animation> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(ScrapeError::decode(format!("empty {}x{} canvas", width, height)));
    }
    let frames = decoder
        .into_frames()
        .collect_frames()?
        .into_iter()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            let delay_ms = if denom == 0 { 0 } else { numer / denom };
            let (left, top) = (frame.left(), frame.top());
            Frame {
                pixels: frame.into_buffer(),
                left,
                top,
                // The decoder reports a missing delay as zero
                duration_ms: (delay_ms > 0).then_some(delay_ms),
            }
        })
        .collect();

    Ok(Animation { width, height, frames })
}

/// Reduce a frame to at most 255 colors plus a reserved transparent slot.
///
/// Every pixel with alpha 0 maps to the reserved slot, which is also the frame's
/// transparency index. Visible pixels never share it, so an opaque corner or a palette
/// color equal to the background cannot be knocked out.
pub fn quantize(image: &RgbaImage) -> IndexedFrame {
    let mut exact: HashMap<[u8; 3], u8> = HashMap::new();
    let mut palette: Vec<u8> = Vec::new();
    let mut overflow = false;

    for px in image.pixels().filter(|px| px[3] > 0) {
        let rgb = [px[0], px[1], px[2]];
        if exact.contains_key(&rgb) {
            continue;
        }
        if exact.len() == MAX_PALETTE_COLORS {
            overflow = true;
            break;
        }
        exact.insert(rgb, exact.len() as u8);
        palette.extend_from_slice(&rgb);
    }

    let learned = overflow.then(|| {
        let samples: Vec<u8> = image
            .pixels()
            .filter(|px| px[3] > 0)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect();
        NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, MAX_PALETTE_COLORS, &samples)
    });
    if let Some(nq) = &learned {
        palette = nq.color_map_rgb();
    }

    let reserved = (palette.len() / 3) as u8;
    palette.extend_from_slice(&[0, 0, 0]);

    let indices: Vec<u8> = image
        .pixels()
        .map(|px| {
            if px[3] == 0 {
                return reserved;
            }
            match &learned {
                Some(nq) => nq.index_of(&[px[0], px[1], px[2], 255]) as u8,
                None => exact[&[px[0], px[1], px[2]]],
            }
        })
        .collect();

    IndexedFrame { palette, indices, transparent: reserved }
}

fn to_u16(value: u32, what: &str) -> ScrapeResult<u16> {
    u16::try_from(value).map_err(|_| ScrapeError::encode(format!("{} {} exceeds GIF limits", what, value)))
}

/// Encode frames as an infinitely looping GIF with background disposal.
pub fn encode_gif(animation: &Animation) -> ScrapeResult<Vec<u8>> {
    if animation.frames.is_empty() {
        return Err(ScrapeError::encode("animation has no frames"));
    }

    let mut encoder = gif::Encoder::new(
        Vec::new(),
        to_u16(animation.width, "width")?,
        to_u16(animation.height, "height")?,
        &[],
    )?;
    encoder.set_repeat(gif::Repeat::Infinite)?;

    for frame in &animation.frames {
        let indexed = quantize(&frame.pixels);
        let duration = frame.duration_ms.unwrap_or(DEFAULT_FRAME_DURATION_MS);

        let out = gif::Frame {
            left: to_u16(frame.left, "frame offset")?,
            top: to_u16(frame.top, "frame offset")?,
            width: to_u16(frame.pixels.width(), "frame width")?,
            height: to_u16(frame.pixels.height(), "frame height")?,
            buffer: Cow::Owned(indexed.indices),
            palette: Some(indexed.palette),
            transparent: Some(indexed.transparent),
            // GIF delays are in hundredths of a second
            delay: (duration.saturating_add(5) / 10).min(u16::MAX as u32) as u16,
            dispose: gif::DisposalMethod::Background,
            ..gif::Frame::default()
        };
        encoder.write_frame(&out)?;
    }

    Ok(encoder.into_inner()?)
}

/// Read `input`, derive its silhouette and write it to `output`.
///
/// Returns `Ok(false)` without touching `output` when the image has no frames.
pub fn make_silhouette_gif(input: &Path, output: &Path) -> ScrapeResult<bool> {
    let bytes = std::fs::read(input)?;
    let silhouette = transform(&decode(&bytes)?);
    if silhouette.frames.is_empty() {
        return Ok(false);
    }
    let encoded = encode_gif(&silhouette)?;

    write_atomically(output, &encoded)?;
    Ok(true)
}

/// Derive the silhouette unless it already exists. Failures are logged, never raised.
pub fn ensure_silhouette(input: &Path, output: &Path) -> SilhouetteOutcome {
    if output.exists() {
        log::info!("Skipping silhouette, already exists: {}", output.display());
        return SilhouetteOutcome::AlreadyPresent;
    }
    match make_silhouette_gif(input, output) {
        Ok(true) => SilhouetteOutcome::Created,
        Ok(false) => {
            log::warn!("No frames in {}, silhouette not written", input.display());
            SilhouetteOutcome::Skipped("no frames".to_string())
        }
        Err(e) => {
            log::warn!("Failed to create silhouette for {}: {}", input.display(), e);
            SilhouetteOutcome::Skipped(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn sprite(width: u32, height: u32, seed: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = (x as u8).wrapping_mul(31).wrapping_add((y as u8).wrapping_mul(17)).wrapping_add(seed);
            // every third pixel fully transparent with leftover color
            let alpha = if (x + y) % 3 == 0 { 0 } else { v | 1 };
            Rgba([v, v.wrapping_add(40), v.wrapping_add(90), alpha])
        })
    }

    fn animation(frames: Vec<Frame>) -> Animation {
        let (width, height) = frames
            .first()
            .map(|f| f.pixels.dimensions())
            .unwrap_or((0, 0));
        Animation { width, height, frames }
    }

    #[test]
    fn test_visible_pixels_become_black_and_keep_alpha() {
        let input = animation(vec![Frame::new(sprite(9, 7, 3), Some(80))]);
        let output = transform(&input);

        let (src, dst) = (&input.frames[0].pixels, &output.frames[0].pixels);
        for (s, d) in src.pixels().zip(dst.pixels()) {
            if s[3] == 0 {
                assert_eq!(s, d);
            } else {
                assert_eq!(*d, Rgba([0, 0, 0, s[3]]));
            }
        }
    }

    #[test]
    fn test_durations_carried_over_with_default() {
        let input = animation(vec![
            Frame::new(sprite(4, 4, 0), Some(80)),
            Frame::new(sprite(4, 4, 1), None),
            Frame::new(sprite(4, 4, 2), Some(120)),
        ]);
        let durations: Vec<_> = transform(&input).frames.iter().map(|f| f.duration_ms).collect();
        assert_eq!(durations, vec![Some(80), Some(100), Some(120)]);
    }

    #[test]
    fn test_small_frame_composited_at_offset() {
        let mut patch = Frame::new(RgbaImage::from_pixel(2, 2, Rgba([200, 10, 10, 255])), Some(50));
        patch.left = 3;
        patch.top = 1;
        let input = Animation { width: 6, height: 4, frames: vec![patch] };

        let output = transform(&input);
        let canvas = &output.frames[0].pixels;
        assert_eq!(canvas.dimensions(), (6, 4));
        assert_eq!(*canvas.get_pixel(3, 1), Rgba([0, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(4, 2), Rgba([0, 0, 0, 255]));
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
        assert_eq!(*canvas.get_pixel(2, 1), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_zero_frames_produce_empty_output() {
        let input = Animation { width: 10, height: 10, frames: Vec::new() };
        assert!(transform(&input).frames.is_empty());
        assert!(matches!(encode_gif(&input), Err(ScrapeError::ImageEncode(_))));
    }

    #[test]
    fn test_quantize_reserves_transparent_slot() {
        let mut img = RgbaImage::from_pixel(3, 1, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 128]));

        let indexed = quantize(&img);
        assert_eq!(indexed.palette, vec![0, 0, 0, 0, 0, 0]);
        assert_eq!(indexed.indices, vec![1, 0, 0]);
        assert_eq!(indexed.transparent, 1);
    }

    #[test]
    fn test_quantize_opaque_corner_keeps_reserved_slot() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let indexed = quantize(&img);
        assert_eq!(indexed.indices, vec![0; 4]);
        assert_eq!(indexed.transparent, 1);
    }

    #[test]
    fn test_transparent_index_marks_exactly_the_invisible_pixels() {
        let img = sprite(9, 7, 3);
        let indexed = quantize(&img);
        for (px, &index) in img.pixels().zip(&indexed.indices) {
            assert_eq!(px[3] == 0, index == indexed.transparent);
        }
    }

    #[test]
    fn test_quantize_many_colors_fits_palette() {
        let img = RgbaImage::from_fn(32, 32, |x, y| Rgba([(x * 8) as u8, (y * 8) as u8, 77, 255]));
        let indexed = quantize(&img);
        assert_eq!(indexed.palette.len(), 256 * 3);
        assert_eq!(indexed.transparent, 255);
        assert!(indexed.indices.iter().all(|&i| i < 255));
    }

    #[test]
    fn test_frame_count_and_durations_round_trip() {
        let input = animation(vec![
            Frame::new(sprite(12, 10, 0), Some(80)),
            Frame::new(sprite(12, 10, 5), Some(120)),
            Frame::new(sprite(12, 10, 9), Some(80)),
        ]);
        let encoded = encode_gif(&transform(&input)).unwrap();
        let decoded = decode(&encoded).unwrap();

        assert_eq!((decoded.width, decoded.height), (12, 10));
        let durations: Vec<_> = decoded.frames.iter().map(|f| f.duration_ms).collect();
        assert_eq!(durations, vec![Some(80), Some(120), Some(80)]);

        // (1, 0) is visible in every generated frame
        for frame in &decoded.frames {
            assert_eq!(*frame.pixels.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
            assert_eq!(frame.pixels.get_pixel(0, 0)[3], 0);
        }
    }

    #[test]
    fn test_corrupt_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("1002.gif");
        let output = dir.path().join("1002_silhouette.gif");
        std::fs::write(&input, b"GIF89a-not-really").unwrap();

        assert!(matches!(ensure_silhouette(&input, &output), SilhouetteOutcome::Skipped(_)));
        assert!(!output.exists());
    }

    #[test]
    fn test_existing_silhouette_is_not_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("1002.gif");
        let output = dir.path().join("1002_silhouette.gif");
        let source = animation(vec![Frame::new(sprite(5, 5, 1), Some(100))]);
        std::fs::write(&input, encode_gif(&source).unwrap()).unwrap();

        assert_eq!(ensure_silhouette(&input, &output), SilhouetteOutcome::Created);
        assert!(output.exists());
        assert_eq!(ensure_silhouette(&input, &output), SilhouetteOutcome::AlreadyPresent);
    }
}
