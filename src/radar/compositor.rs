///! Compositor
///!
///! Assembles the 25 decoded frames into one looping animated image.

use crate::error::RadarError;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use std::io::Cursor;
use std::str::FromStr;

/// Animation container produced by the compositor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Webp,
    Gif,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::Webp),
            "gif" => Ok(OutputFormat::Gif),
            other => anyhow::bail!("unsupported image format: {}", other),
        }
    }
}

/// Encodes an ordered set of frames with per-frame display durations and
/// infinite looping. Borrows the bitmaps read-only for the duration of
/// one encode call and never retains them.
#[derive(Debug, Clone)]
pub struct Compositor {
    format: OutputFormat,
    previous_frame_ms: u32,
    final_frame_ms: u32,
}

impl Compositor {
    pub fn new(format: OutputFormat, previous_frame_ms: u32, final_frame_ms: u32) -> Self {
        Self {
            format,
            previous_frame_ms,
            final_frame_ms,
        }
    }

    /// Per-frame display durations in milliseconds, oldest to newest.
    fn durations(&self, frames: usize) -> Vec<u32> {
        (0..frames)
            .map(|index| {
                if index + 1 == frames {
                    self.final_frame_ms
                } else {
                    self.previous_frame_ms
                }
            })
            .collect()
    }

    pub fn compose(&self, frames: &[&RgbaImage]) -> Result<Vec<u8>, RadarError> {
        let first = frames
            .first()
            .ok_or_else(|| RadarError::Encode("no frames to compose".to_string()))?;
        let (width, height) = first.dimensions();
        if frames.iter().any(|frame| frame.dimensions() != (width, height)) {
            return Err(RadarError::Encode("frame dimensions differ".to_string()));
        }

        let durations = self.durations(frames.len());
        match self.format {
            OutputFormat::Webp => encode_webp(frames, &durations, width, height),
            OutputFormat::Gif => encode_gif(frames, &durations),
        }
    }
}

fn encode_webp(
    frames: &[&RgbaImage],
    durations: &[u32],
    width: u32,
    height: u32,
) -> Result<Vec<u8>, RadarError> {
    // Loop count defaults to 0 (infinite) in the encoder options.
    let mut encoder = webp_animation::Encoder::new((width, height))
        .map_err(|err| RadarError::Encode(format!("webp encoder init: {:?}", err)))?;

    let mut timestamp_ms = 0i32;
    for (frame, duration) in frames.iter().zip(durations) {
        encoder
            .add_frame(frame.as_raw(), timestamp_ms)
            .map_err(|err| RadarError::Encode(format!("webp frame: {:?}", err)))?;
        timestamp_ms += *duration as i32;
    }

    let data = encoder
        .finalize(timestamp_ms)
        .map_err(|err| RadarError::Encode(format!("webp finalize: {:?}", err)))?;
    Ok(data.to_vec())
}

fn encode_gif(frames: &[&RgbaImage], durations: &[u32]) -> Result<Vec<u8>, RadarError> {
    let mut out = Cursor::new(Vec::new());
    {
        let mut encoder = GifEncoder::new(&mut out);
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|err| RadarError::Encode(err.to_string()))?;
        for (frame, duration) in frames.iter().zip(durations) {
            let delay = Delay::from_numer_denom_ms(*duration, 1);
            let frame = Frame::from_parts((*frame).clone(), 0, 0, delay);
            encoder
                .encode_frame(frame)
                .map_err(|err| RadarError::Encode(err.to_string()))?;
        }
    }
    Ok(out.into_inner())
}
