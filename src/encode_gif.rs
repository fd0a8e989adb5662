use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use image::codecs::gif::{GifEncoder, Repeat};

use crate::{
    error::{ChoromapError, ChoromapResult},
    render::FrameRgba,
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GifConfig {
    pub width: u32,
    pub height: u32,
    /// Delay between frames in milliseconds.
    pub frame_delay_ms: u32,
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl GifConfig {
    pub fn validate(&self) -> ChoromapResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ChoromapError::validation(
                "gif width/height must be non-zero",
            ));
        }
        if self.frame_delay_ms == 0 {
            return Err(ChoromapError::validation("gif frame delay must be non-zero"));
        }
        Ok(())
    }
}

/// The animation timing of the source visualization: 300 ms per frame,
/// looping forever.
pub fn default_gif_config(out_path: impl Into<PathBuf>, width: u32, height: u32) -> GifConfig {
    GifConfig {
        width,
        height,
        frame_delay_ms: 300,
        out_path: out_path.into(),
        overwrite: true,
    }
}

pub fn ensure_parent_dir(path: &Path) -> ChoromapResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Streams rendered frames into a looping animated GIF.
///
/// Frames are flattened from premultiplied RGBA over an opaque background
/// before encoding; the first encoded frame is the file's base image and
/// every later frame is appended with the same fixed delay.
pub struct GifAnimator {
    cfg: GifConfig,
    bg_rgba: [u8; 4],
    encoder: Option<GifEncoder<BufWriter<File>>>,
    frames_written: u64,
}

impl GifAnimator {
    pub fn new(cfg: GifConfig, bg_rgba: [u8; 4]) -> ChoromapResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(ChoromapError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        let file = File::create(&cfg.out_path).map_err(|e| {
            ChoromapError::render(format!(
                "failed to create gif output '{}': {e}",
                cfg.out_path.display()
            ))
        })?;

        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ChoromapError::render(format!("failed to set gif loop count: {e}")))?;

        Ok(Self {
            cfg,
            bg_rgba,
            encoder: Some(encoder),
            frames_written: 0,
        })
    }

    pub fn encode_frame(&mut self, frame: &FrameRgba) -> ChoromapResult<()> {
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(ChoromapError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        if frame.data.len() != (frame.width as usize) * (frame.height as usize) * 4 {
            return Err(ChoromapError::validation(
                "frame.data size mismatch with width*height*4",
            ));
        }

        let mut flat = frame.data.clone();
        flatten_premul_over_background(&mut flat, frame.premultiplied, self.bg_rgba)?;

        let buffer = image::RgbaImage::from_raw(frame.width, frame.height, flat)
            .ok_or_else(|| ChoromapError::render("frame buffer does not fit its dimensions"))?;
        let delay = image::Delay::from_numer_denom_ms(self.cfg.frame_delay_ms, 1);

        let Some(encoder) = self.encoder.as_mut() else {
            return Err(ChoromapError::render("gif encoder is already finalized"));
        };
        encoder
            .encode_frame(image::Frame::from_parts(buffer, 0, 0, delay))
            .map_err(|e| ChoromapError::render(format!("failed to encode gif frame: {e}")))?;

        self.frames_written += 1;
        Ok(())
    }

    /// Finish the file and return the number of frames written.
    pub fn finish(mut self) -> ChoromapResult<u64> {
        // Dropping the encoder flushes the trailer through the BufWriter.
        drop(self.encoder.take());
        if self.frames_written == 0 {
            return Err(ChoromapError::validation(
                "gif output needs at least one frame",
            ));
        }
        Ok(self.frames_written)
    }
}

/// Flatten RGBA8 over an opaque background, in place.
fn flatten_premul_over_background(
    data: &mut [u8],
    premultiplied: bool,
    bg_rgba: [u8; 4],
) -> ChoromapResult<()> {
    if !data.len().is_multiple_of(4) {
        return Err(ChoromapError::validation(
            "flatten expects an rgba8 buffer (len % 4 == 0)",
        ));
    }

    let bg_r = bg_rgba[0] as u16;
    let bg_g = bg_rgba[1] as u16;
    let bg_b = bg_rgba[2] as u16;

    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }

        let inv = 255u16 - a;
        let (r, g, b) = if premultiplied {
            (
                px[0] as u16 + mul_div255(bg_r, inv),
                px[1] as u16 + mul_div255(bg_g, inv),
                px[2] as u16 + mul_div255(bg_b, inv),
            )
        } else {
            (
                mul_div255(px[0] as u16, a) + mul_div255(bg_r, inv),
                mul_div255(px[1] as u16, a) + mul_div255(bg_g, inv),
                mul_div255(px[2] as u16, a) + mul_div255(bg_b, inv),
            )
        };

        px[0] = r.min(255) as u8;
        px[1] = g.min(255) as u8;
        px[2] = b.min(255) as u8;
        px[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
