// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Whole-file audio decoding for sample slots.
//!
//! Slots hold fully decoded audio, so this adapter reads an entire file into
//! a two-channel f32 buffer up front. Opening and decoding are separate steps
//! so callers can tell an unreadable file apart from a stream that fails to
//! decode.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::get_codecs;
use symphonia::default::get_probe;

use super::error::DecoderError;

/// A fully decoded audio file: two channels of f32 frames plus the stream's
/// native sample rate. Mono input is duplicated into both channels; channels
/// beyond the second are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSample {
    channels: [Vec<f32>; 2],
    sample_rate: u32,
}

impl DecodedSample {
    /// Creates a decoded sample from two equal-length channel buffers.
    /// Primarily useful for hosts that do their own decoding.
    pub fn new(left: Vec<f32>, right: Vec<f32>, sample_rate: u32) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        Self {
            channels: [left, right],
            sample_rate,
        }
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Returns the native sample rate of the decoded stream.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the sample at the given channel and frame.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        self.channels[channel][frame]
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        (self.channels[0].len() + self.channels[1].len()) * std::mem::size_of::<f32>()
    }
}

/// An opened audio file ready to be decoded.
/// Supports WAV, MP3, FLAC, and other formats supported by symphonia.
pub struct AudioFileReader {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    frames_hint: Option<u64>,
}

impl AudioFileReader {
    /// Opens an audio file and probes its format, leaving the stream
    /// positioned at the first packet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DecoderError> {
        // Open the file (include path in error so user sees which file failed)
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|e| {
            DecoderError::IoError(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path_ref.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create a hint to help the format registry guess the format
        let mut hint = Hint::new();
        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        // Probe the format
        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let format_reader = probed.format;

        // Find the first audio track
        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecoderError::UnsupportedStream("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params.sample_rate.ok_or_else(|| {
            DecoderError::UnsupportedStream("Sample rate not specified".to_string())
        })?;
        let frames_hint = params.n_frames;

        // Create the decoder
        let decoder_opts: DecoderOptions = Default::default();
        let decoder = get_codecs().make(params, &decoder_opts)?;

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            frames_hint,
        })
    }

    /// Returns the native sample rate of the audio track.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decodes the entire stream into a two-channel buffer.
    /// Fails with [`DecoderError::EmptyStream`] if no frames decode.
    pub fn decode(mut self) -> Result<DecodedSample, DecoderError> {
        let capacity = self.frames_hint.unwrap_or(0) as usize;
        let mut channels = [Vec::with_capacity(capacity), Vec::with_capacity(capacity)];

        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // End of file - we're done reading
                    break;
                }
                Err(SymphoniaError::DecodeError(_)) => {
                    // Some decoders return DecodeError at EOF instead of IoError
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(DecoderError::AudioError(e)),
            };
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    match self.decoder.decode(&packet) {
                        Ok(decoded) => decoded,
                        Err(e) => return Err(DecoderError::AudioError(e)),
                    }
                }
                Err(e) => return Err(DecoderError::AudioError(e)),
            };

            append_stereo(decoded, &mut channels);
        }

        if channels[0].is_empty() {
            return Err(DecoderError::EmptyStream);
        }

        let [left, right] = channels;
        Ok(DecodedSample::new(left, right, self.sample_rate))
    }
}

/// Converts a decoded AudioBufferRef to f32 and appends it to the stereo
/// output buffers.
fn append_stereo(decoded: AudioBufferRef, out: &mut [Vec<f32>; 2]) {
    match decoded {
        AudioBufferRef::F32(buf) => append_planar(&buf, |sample| sample, out),
        AudioBufferRef::F64(buf) => append_planar(&buf, |sample| sample as f32, out),
        AudioBufferRef::S8(buf) => append_planar(&buf, scale_s8, out),
        AudioBufferRef::S16(buf) => append_planar(&buf, scale_s16, out),
        AudioBufferRef::S24(buf) => append_planar(&buf, |sample| scale_s24(sample.inner()), out),
        AudioBufferRef::S32(buf) => append_planar(&buf, scale_s32, out),
        AudioBufferRef::U8(buf) => append_planar(&buf, scale_u8, out),
        AudioBufferRef::U16(buf) => append_planar(&buf, scale_u16, out),
        AudioBufferRef::U24(buf) => append_planar(&buf, |sample| scale_u24(sample.inner()), out),
        AudioBufferRef::U32(buf) => append_planar(&buf, scale_u32, out),
    }
}

/// Helper to append planar samples from a generic AudioBuffer into the
/// stereo output. The closure receives a single sample value and returns the
/// f32 sample value.
fn append_planar<T, F>(buf: &AudioBuffer<T>, convert: F, out: &mut [Vec<f32>; 2])
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    let source_channels = buf.spec().channels.count();
    if source_channels == 0 || frames == 0 {
        return;
    }
    let planes = buf.planes();
    let planes = planes.planes();
    for (ch, out_ch) in out.iter_mut().enumerate() {
        // Mono duplicates into both channels; channels past the second drop.
        let plane = planes[ch.min(source_channels - 1)];
        out_ch.reserve(frames);
        for frame in 0..frames {
            out_ch.push(convert(plane[frame]));
        }
    }
}

// Scaling helpers for all integer formats. These are `pub(crate)` so they can
// be validated directly in unit tests.

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
