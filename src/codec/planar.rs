//! Planar residual codec (`PLN1`)
//!
//! Unsigned 8-bit images with one or three components. Colour images are
//! split into planes before coding and re-interleaved after decode:
//!
//! - grayscale: a single Y plane
//! - lossless colour: reversible YCoCg-R planes at full resolution
//! - lossy colour: full-range BT.601 YCbCr with 2x2 subsampled chroma
//!
//! Samples are divided by a quantisation step derived from `bitRate`.
//! Key frames store the quantised samples; delta frames store the difference
//! against the previous frame's quantised samples. The zigzag-coded residuals
//! are then deflated.
//!
//! Payload layout:
//!
//! | Field    | Type   |
//! |----------|--------|
//! | LAYOUT   | uint8  |
//! | STEP     | uint8  |
//! | ENTROPY  | uint8  |
//! | RESERVED | uint8  |
//! | RAW_LEN  | uint32 |
//! | DATA     | bytes  |

use super::{CompressedFrame, VideoCodec};
use crate::compression::{compress, decompress, CompressionLevel, CompressionType};
use crate::error::{IgtlError, Result};
use crate::protocol::types::{FourCC, ImageMessage, ImageScalarType};
use bytes::{Buf, BufMut};
use std::sync::Arc;
use tracing::{debug, trace};

const PARAM_LOSSLESS: &str = "losslessEncoding";
const PARAM_KEY_FRAME_DISTANCE: &str = "keyFrameDistance";
const PARAM_BIT_RATE: &str = "bitRate";
const PARAMETER_NAMES: &[&str] = &[PARAM_LOSSLESS, PARAM_KEY_FRAME_DISTANCE, PARAM_BIT_RATE];

const PAYLOAD_HEADER_SIZE: usize = 8;

/// Frame rate assumed when converting a bit rate into a per-frame budget
const NOMINAL_FRAME_RATE: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaneLayout {
    Gray = 0,
    YCoCgR = 1,
    YCbCr420 = 2,
}

impl PlaneLayout {
    fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Gray),
            1 => Ok(Self::YCoCgR),
            2 => Ok(Self::YCbCr420),
            other => Err(IgtlError::DecodeFailed(format!(
                "Unknown plane layout {}",
                other
            ))),
        }
    }

    fn components(self) -> u8 {
        match self {
            Self::Gray => 1,
            Self::YCoCgR | Self::YCbCr420 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PlaneFormat {
    layout: PlaneLayout,
    width: usize,
    height: usize,
    depth: usize,
    step: u8,
}

impl PlaneFormat {
    fn pixels(&self) -> usize {
        self.width * self.height * self.depth
    }

    fn chroma_width(&self) -> usize {
        (self.width + 1) / 2
    }

    fn chroma_height(&self) -> usize {
        (self.height + 1) / 2
    }

    fn sample_count(&self) -> usize {
        match self.layout {
            PlaneLayout::Gray => self.pixels(),
            PlaneLayout::YCoCgR => self.pixels() * 3,
            PlaneLayout::YCbCr420 => {
                self.pixels() + 2 * self.chroma_width() * self.chroma_height() * self.depth
            }
        }
    }

    fn dimensions(&self) -> [u32; 3] {
        [self.width as u32, self.height as u32, self.depth as u32]
    }
}

/// Quantised samples of the last coded frame, plane after plane
#[derive(Debug, Clone)]
struct Reference {
    format: PlaneFormat,
    samples: Vec<i16>,
}

/// Tunables of [`PlanarCodec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanarSettings {
    pub lossless: bool,
    /// Frames from one key frame to the next, counting the key frame
    pub key_frame_distance: u32,
    /// Target bits per second; 0 disables rate control
    pub bit_rate: u64,
}

impl Default for PlanarSettings {
    fn default() -> Self {
        PlanarSettings {
            lossless: true,
            key_frame_distance: 50,
            bit_rate: 0,
        }
    }
}

/// Built-in codec; see the module documentation for the bitstream
#[derive(Debug, Default)]
pub struct PlanarCodec {
    settings: PlanarSettings,
    frames_until_key: u32,
    last_encoded: Option<Arc<CompressedFrame>>,
    encode_ref: Option<Reference>,
    last_decoded: Option<Arc<CompressedFrame>>,
    decode_ref: Option<Reference>,
}

impl PlanarCodec {
    pub const FOURCC: FourCC = FourCC::new(b"PLN1");

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: PlanarSettings) -> Self {
        PlanarCodec {
            settings: PlanarSettings {
                key_frame_distance: settings.key_frame_distance.max(1),
                ..settings
            },
            ..Self::default()
        }
    }

    /// Boxed constructor for [`super::CodecFactory`]
    pub fn boxed() -> Box<dyn VideoCodec> {
        Box::new(Self::new())
    }

    pub fn settings(&self) -> PlanarSettings {
        self.settings
    }

    fn format_for(&self, image: &ImageMessage) -> Result<PlaneFormat> {
        if image.scalar_type != ImageScalarType::Uint8 {
            return Err(IgtlError::EncodeFailed(format!(
                "Unsupported scalar type {:?}",
                image.scalar_type
            )));
        }
        let layout = match image.num_components {
            1 => PlaneLayout::Gray,
            3 if self.settings.lossless => PlaneLayout::YCoCgR,
            3 => PlaneLayout::YCbCr420,
            n => {
                return Err(IgtlError::EncodeFailed(format!(
                    "Unsupported component count {}",
                    n
                )))
            }
        };
        let [width, height, depth] = image.size.map(|s| s as usize);
        if width == 0 || height == 0 || depth == 0 {
            return Err(IgtlError::EncodeFailed("Image has a zero dimension".into()));
        }
        let expected = width * height * depth * image.num_components as usize;
        if image.data.len() != expected {
            return Err(IgtlError::EncodeFailed(format!(
                "Pixel buffer holds {} bytes, dimensions need {}",
                image.data.len(),
                expected
            )));
        }
        let step = if self.settings.lossless {
            1
        } else {
            quantisation_step(self.settings.bit_rate, width * height * depth)
        };
        Ok(PlaneFormat {
            layout,
            width,
            height,
            depth,
            step,
        })
    }

    fn is_last_decoded(&self, frame: &Arc<CompressedFrame>) -> bool {
        self.decode_ref.is_some()
            && self
                .last_decoded
                .as_ref()
                .is_some_and(|last| Arc::ptr_eq(last, frame))
    }

    fn commit_decoded(&mut self, frame: &Arc<CompressedFrame>, reference: Reference) {
        self.decode_ref = Some(reference);
        self.last_decoded = Some(frame.clone());
    }

    fn reconstruct(
        &mut self,
        frame: &Arc<CompressedFrame>,
        fallback: Option<&ImageMessage>,
    ) -> Result<Reference> {
        let (format, residuals) = unpack_payload(frame)?;
        if frame.is_key_frame() {
            return Ok(Reference {
                format,
                samples: residuals,
            });
        }
        let base = self.reference_for(frame, &format, fallback)?;
        let samples = base
            .iter()
            .zip(&residuals)
            .map(|(&b, &r)| b.wrapping_add(r))
            .collect();
        Ok(Reference { format, samples })
    }

    fn reference_for(
        &mut self,
        frame: &Arc<CompressedFrame>,
        format: &PlaneFormat,
        fallback: Option<&ImageMessage>,
    ) -> Result<Vec<i16>> {
        if let Some(previous) = frame.previous() {
            match self.replay_chain(previous) {
                Ok(()) => {
                    if let Some(r) = self.decode_ref.as_ref().filter(|r| r.format == *format) {
                        return Ok(r.samples.clone());
                    }
                }
                Err(e) => debug!(error = %e, "Predecessor chain could not be decoded"),
            }
        }

        if let Some(image) = fallback.filter(|img| image_matches(img, format)) {
            trace!("Using supplied image as delta reference");
            return Ok(split_planes(&image.data, format));
        }

        if frame.previous().is_none() {
            if let Some(r) = self.decode_ref.as_ref().filter(|r| r.format == *format) {
                return Ok(r.samples.clone());
            }
        }

        Err(IgtlError::DecodeFailed(
            "Delta frame has no usable reference".into(),
        ))
    }

    /// Decode every predecessor not yet seen, oldest first
    fn replay_chain(&mut self, newest: &Arc<CompressedFrame>) -> Result<()> {
        let mut pending = Vec::new();
        let mut cursor = Some(newest.clone());
        while let Some(frame) = cursor {
            if self.is_last_decoded(&frame) {
                break;
            }
            cursor = if frame.is_key_frame() {
                None
            } else {
                frame.previous().cloned()
            };
            pending.push(frame);
        }

        if !pending.is_empty() {
            trace!(frames = pending.len(), "Replaying predecessor chain");
        }
        for frame in pending.into_iter().rev() {
            let reference = self.reconstruct(&frame, None)?;
            self.commit_decoded(&frame, reference);
        }
        Ok(())
    }
}

impl VideoCodec for PlanarCodec {
    fn fourcc(&self) -> FourCC {
        Self::FOURCC
    }

    fn encode(
        &mut self,
        image: &ImageMessage,
        force_key_frame: bool,
    ) -> Result<Arc<CompressedFrame>> {
        let format = self.format_for(image)?;
        let samples = split_planes(&image.data, &format);

        let reference = self
            .encode_ref
            .as_ref()
            .filter(|r| r.format == format && self.last_encoded.is_some());
        let residuals = match reference {
            Some(r) if !force_key_frame && self.frames_until_key > 0 => Some(
                samples
                    .iter()
                    .zip(&r.samples)
                    .map(|(&s, &p)| s.wrapping_sub(p))
                    .collect::<Vec<i16>>(),
            ),
            _ => None,
        };
        let is_key = residuals.is_none();
        let payload = pack_payload(&format, residuals.as_deref().unwrap_or(&samples[..]))?;

        let dimensions = format.dimensions();
        let components = format.layout.components();
        let frame = Arc::new(if is_key {
            CompressedFrame::key(Self::FOURCC, dimensions, components, payload)
        } else {
            CompressedFrame::delta(
                Self::FOURCC,
                dimensions,
                components,
                payload,
                self.last_encoded.clone(),
            )
        });

        self.frames_until_key = if is_key {
            self.settings.key_frame_distance - 1
        } else {
            self.frames_until_key.saturating_sub(1)
        };
        self.encode_ref = Some(Reference { format, samples });
        self.last_encoded = Some(frame.clone());

        debug!(
            key_frame = is_key,
            width = format.width,
            height = format.height,
            depth = format.depth,
            step = format.step,
            payload_size = frame.payload.len(),
            "Encoded frame"
        );
        Ok(frame)
    }

    fn decode(
        &mut self,
        frame: &Arc<CompressedFrame>,
        previous: Option<&ImageMessage>,
    ) -> Result<ImageMessage> {
        let reference = self.reconstruct(frame, previous)?;
        let format = reference.format;
        let data = merge_planes(&reference.samples, &format);
        let size = [format.width as u16, format.height as u16, format.depth as u16];
        let image = ImageMessage::new(
            ImageScalarType::Uint8,
            format.layout.components(),
            size,
            data,
        )
        .map_err(|e| IgtlError::DecodeFailed(e.to_string()))?;
        self.commit_decoded(frame, reference);

        trace!(
            key_frame = frame.is_key_frame(),
            width = format.width,
            height = format.height,
            "Decoded frame"
        );
        Ok(image)
    }

    fn parameter_names(&self) -> &'static [&'static str] {
        PARAMETER_NAMES
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> bool {
        match name {
            PARAM_LOSSLESS => match value.to_ascii_lowercase().as_str() {
                "true" => self.settings.lossless = true,
                "false" => self.settings.lossless = false,
                _ => return false,
            },
            PARAM_KEY_FRAME_DISTANCE => match value.parse::<u32>() {
                Ok(distance) if distance >= 1 => {
                    self.settings.key_frame_distance = distance;
                    self.frames_until_key = self.frames_until_key.min(distance - 1);
                }
                _ => return false,
            },
            PARAM_BIT_RATE => match value.parse::<u64>() {
                Ok(rate) => self.settings.bit_rate = rate,
                Err(_) => return false,
            },
            _ => return false,
        }
        true
    }

    fn parameter(&self, name: &str) -> Option<String> {
        match name {
            PARAM_LOSSLESS => Some(self.settings.lossless.to_string()),
            PARAM_KEY_FRAME_DISTANCE => Some(self.settings.key_frame_distance.to_string()),
            PARAM_BIT_RATE => Some(self.settings.bit_rate.to_string()),
            _ => None,
        }
    }

    fn parameter_description(&self, name: &str) -> &'static str {
        match name {
            PARAM_LOSSLESS => "Lossless encoding flag",
            PARAM_KEY_FRAME_DISTANCE => "Distance between key frames",
            PARAM_BIT_RATE => "Encoding bitrate",
            _ => "",
        }
    }

    fn reset(&mut self) {
        self.frames_until_key = 0;
        self.last_encoded = None;
        self.encode_ref = None;
        self.last_decoded = None;
        self.decode_ref = None;
    }
}

/// Step that brings a frame near the per-frame bit budget
fn quantisation_step(bit_rate: u64, pixels: usize) -> u8 {
    if bit_rate == 0 || pixels == 0 {
        return 1;
    }
    let bits_per_pixel = bit_rate as f64 / (NOMINAL_FRAME_RATE * pixels as f64);
    match bits_per_pixel {
        b if b >= 4.0 => 1,
        b if b >= 2.0 => 2,
        b if b >= 1.0 => 4,
        b if b >= 0.5 => 8,
        b if b >= 0.25 => 16,
        _ => 32,
    }
}

fn image_matches(image: &ImageMessage, format: &PlaneFormat) -> bool {
    image.scalar_type == ImageScalarType::Uint8
        && image.num_components == format.layout.components()
        && image.dimensions() == format.dimensions()
        && image.data.len() == format.pixels() * image.num_components as usize
}

fn zigzag(v: i16) -> u16 {
    ((v << 1) ^ (v >> 15)) as u16
}

fn unzigzag(v: u16) -> i16 {
    ((v >> 1) as i16) ^ -((v & 1) as i16)
}

fn quantise(v: i16, step: u8) -> i16 {
    let step = step as i16;
    (v + step / 2) / step
}

fn clamp_u8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// Interleaved pixels to quantised planes
fn split_planes(data: &[u8], format: &PlaneFormat) -> Vec<i16> {
    let mut samples: Vec<i16> = match format.layout {
        PlaneLayout::Gray => data.iter().map(|&v| v as i16).collect(),
        PlaneLayout::YCoCgR => {
            let n = format.pixels();
            let mut out = vec![0i16; n * 3];
            for (i, px) in data.chunks_exact(3).enumerate() {
                let (r, g, b) = (px[0] as i16, px[1] as i16, px[2] as i16);
                let co = r - b;
                let t = b + (co >> 1);
                let cg = g - t;
                out[i] = t + (cg >> 1);
                out[n + i] = co;
                out[2 * n + i] = cg;
            }
            out
        }
        PlaneLayout::YCbCr420 => split_ycbcr420(data, format),
    };
    if format.step > 1 {
        for s in &mut samples {
            *s = quantise(*s, format.step);
        }
    }
    samples
}

fn split_ycbcr420(data: &[u8], format: &PlaneFormat) -> Vec<i16> {
    let (w, h) = (format.width, format.height);
    let (cw, ch) = (format.chroma_width(), format.chroma_height());
    let n = format.pixels();
    let chroma_n = cw * ch * format.depth;

    let mut luma = Vec::with_capacity(n);
    let mut cb_sum = vec![0f32; chroma_n];
    let mut cr_sum = vec![0f32; chroma_n];
    let mut counts = vec![0u8; chroma_n];

    for (i, px) in data.chunks_exact(3).enumerate() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        luma.push((0.299 * r + 0.587 * g + 0.114 * b).round() as i16);

        let (x, y, z) = (i % w, (i / w) % h, i / (w * h));
        let c = z * cw * ch + (y / 2) * cw + x / 2;
        cb_sum[c] += 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        cr_sum[c] += 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
        counts[c] += 1;
    }

    let average = |sums: &[f32]| -> Vec<i16> {
        sums.iter()
            .zip(&counts)
            .map(|(&s, &n)| clamp_u8((s / n.max(1) as f32).round() as i32) as i16)
            .collect()
    };
    let mut samples = luma;
    samples.extend(average(&cb_sum));
    samples.extend(average(&cr_sum));
    samples
}

/// Quantised planes back to interleaved pixels
fn merge_planes(samples: &[i16], format: &PlaneFormat) -> Vec<u8> {
    let step = format.step as i32;
    let value = |i: usize| samples[i] as i32 * step;
    let n = format.pixels();

    match format.layout {
        PlaneLayout::Gray => (0..n).map(|i| clamp_u8(value(i))).collect(),
        PlaneLayout::YCoCgR => {
            let mut out = Vec::with_capacity(n * 3);
            for i in 0..n {
                let (y, co, cg) = (value(i), value(n + i), value(2 * n + i));
                let t = y - (cg >> 1);
                let g = cg + t;
                let b = t - (co >> 1);
                let r = b + co;
                out.extend_from_slice(&[clamp_u8(r), clamp_u8(g), clamp_u8(b)]);
            }
            out
        }
        PlaneLayout::YCbCr420 => {
            let (w, h) = (format.width, format.height);
            let (cw, ch) = (format.chroma_width(), format.chroma_height());
            let chroma_n = cw * ch * format.depth;
            let mut out = Vec::with_capacity(n * 3);
            for i in 0..n {
                let (x, y, z) = (i % w, (i / w) % h, i / (w * h));
                let c = z * cw * ch + (y / 2) * cw + x / 2;
                let luma = value(i) as f32;
                let cb = value(n + c) as f32 - 128.0;
                let cr = value(n + chroma_n + c) as f32 - 128.0;
                let r = luma + 1.402 * cr;
                let g = luma - 0.344_136 * cb - 0.714_136 * cr;
                let b = luma + 1.772 * cb;
                out.extend_from_slice(&[
                    clamp_u8(r.round() as i32),
                    clamp_u8(g.round() as i32),
                    clamp_u8(b.round() as i32),
                ]);
            }
            out
        }
    }
}

fn pack_payload(format: &PlaneFormat, residuals: &[i16]) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(residuals.len() * 2);
    for &r in residuals {
        raw.put_u16(zigzag(r));
    }
    let raw_len = u32::try_from(raw.len())
        .map_err(|_| IgtlError::EncodeFailed("Frame too large for payload header".into()))?;

    let deflated = compress(&raw, CompressionType::Deflate, CompressionLevel::Fast)?;
    let (entropy, data) = if deflated.len() < raw.len() {
        (CompressionType::Deflate, deflated)
    } else {
        (CompressionType::None, raw)
    };

    let mut payload = Vec::with_capacity(PAYLOAD_HEADER_SIZE + data.len());
    payload.put_u8(format.layout as u8);
    payload.put_u8(format.step);
    payload.put_u8(entropy as u8);
    payload.put_u8(0);
    payload.put_u32(raw_len);
    payload.extend_from_slice(&data);
    Ok(payload)
}

fn unpack_payload(frame: &CompressedFrame) -> Result<(PlaneFormat, Vec<i16>)> {
    if frame.codec != PlanarCodec::FOURCC {
        return Err(IgtlError::DecodeFailed(format!(
            "Frame was encoded with {}, not {}",
            frame.codec,
            PlanarCodec::FOURCC
        )));
    }
    if frame.payload.len() < PAYLOAD_HEADER_SIZE {
        return Err(IgtlError::DecodeFailed(format!(
            "Payload too short: {} bytes",
            frame.payload.len()
        )));
    }
    let [width, height, depth] = frame.dimensions;
    let max = u16::MAX as u32;
    if [width, height, depth].iter().any(|&d| d == 0 || d > max) {
        return Err(IgtlError::DecodeFailed(format!(
            "Invalid dimensions {:?}",
            frame.dimensions
        )));
    }

    let mut header = &frame.payload[..PAYLOAD_HEADER_SIZE];
    let layout = PlaneLayout::from_u8(header.get_u8())?;
    let step = header.get_u8();
    let entropy = CompressionType::from_u8(header.get_u8())
        .map_err(|e| IgtlError::DecodeFailed(e.to_string()))?;
    let _reserved = header.get_u8();
    let raw_len = header.get_u32() as usize;

    if layout.components() != frame.num_components {
        return Err(IgtlError::DecodeFailed(format!(
            "Layout {:?} does not carry {} components",
            layout, frame.num_components
        )));
    }
    if step == 0 {
        return Err(IgtlError::DecodeFailed("Quantisation step is zero".into()));
    }

    let format = PlaneFormat {
        layout,
        width: width as usize,
        height: height as usize,
        depth: depth as usize,
        step,
    };
    let expected = format.sample_count() * 2;
    if raw_len != expected {
        return Err(IgtlError::DecodeFailed(format!(
            "Residual length {} does not match dimensions ({})",
            raw_len, expected
        )));
    }

    let raw = decompress(&frame.payload[PAYLOAD_HEADER_SIZE..], entropy, expected)?;
    if raw.len() != expected {
        return Err(IgtlError::DecodeFailed(format!(
            "Residual stream holds {} bytes, expected {}",
            raw.len(),
            expected
        )));
    }
    let residuals = raw
        .chunks_exact(2)
        .map(|c| unzigzag(u16::from_be_bytes([c[0], c[1]])))
        .collect();
    Ok((format, residuals))
}
