//! In-memory audio fixtures
//!
//! WAV is uncompressed but goes through the same symphonia format detection
//! and decode path as compressed formats, which keeps decoder tests free of
//! binary fixtures. MP3 is built frame by frame: silent frames need no
//! encoder, only a valid header and zeroed side info.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// 16-bit PCM WAV bytes holding a sine tone on every channel
pub fn sine_wav_bytes(
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        let total_frames = (sample_rate as u64 * duration_ms) / 1000;
        for frame in 0..total_frames {
            let t = frame as f32 / sample_rate as f32;
            let value = (2.0 * PI * frequency_hz * t).sin() * amplitude;
            let sample = (value * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(sample)?;
            }
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// 16-bit PCM WAV bytes of silence
pub fn silent_wav_bytes(
    sample_rate: u32,
    channels: u16,
    duration_ms: u64,
) -> Result<Vec<u8>, hound::Error> {
    sine_wav_bytes(sample_rate, channels, duration_ms, 0.0, 0.0)
}

/// MPEG-1 Layer III, 64 kbps, 44.1 kHz, mono, no CRC, no padding
const MP3_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x50, 0xC0];

/// floor(144 * 64000 / 44100)
pub const MP3_FRAME_BYTES: usize = 208;

pub const MP3_FRAME_SAMPLES: usize = 1152;

pub const MP3_SAMPLE_RATE: u32 = 44_100;

/// A stream of `frames` silent MP3 frames.
///
/// Side info and main data are all zero: no reservoir, no Huffman bits, so
/// every frame decodes to 1152 zero samples on its own. The zero bodies never
/// contain a sync word, so a reader dropped mid-frame resyncs on the next
/// header.
pub fn silent_mp3_bytes(frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * MP3_FRAME_BYTES);
    for _ in 0..frames {
        bytes.extend_from_slice(&MP3_FRAME_HEADER);
        bytes.resize(bytes.len() + MP3_FRAME_BYTES - MP3_FRAME_HEADER.len(), 0);
    }
    bytes
}
