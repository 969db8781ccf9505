//! Core audio data types
//!
//! Defines the decoded signal handed back by a decoder and the fixed-duration
//! chunks that flow through the playback queue.
//!
//! **Format:**
//! - Samples are f32 (floating point -1.0 to 1.0)
//! - Interleaved: [L, R, L, R, ...] for stereo, plain sequence for mono
//! - Sample rate is the source's native rate (no resampling before playback)

use std::time::Duration;

/// Entire signal produced by one decode attempt
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved PCM samples
    pub samples: Vec<f32>,

    /// Native sample rate (Hz)
    pub sample_rate: u32,

    /// Channel count (1=mono, 2=stereo, ...)
    pub channels: u16,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0 || self.sample_rate == 0
    }

    pub fn duration(&self) -> Duration {
        frames_to_duration(self.frames(), self.sample_rate)
    }

    /// Split into consecutive chunks of `chunk` duration each.
    ///
    /// Every chunk except possibly the last holds exactly
    /// `sample_rate * chunk` frames; the last holds the remainder.
    /// Returns no chunks for an empty signal.
    pub fn into_chunks(self, chunk: Duration) -> Vec<DecodedChunk> {
        if self.is_empty() {
            return Vec::new();
        }

        let frames_per_chunk =
            ((self.sample_rate as u128 * chunk.as_micros()) / 1_000_000).max(1) as usize;
        let samples_per_chunk = frames_per_chunk * self.channels as usize;

        self.samples
            .chunks(samples_per_chunk)
            .map(|slice| DecodedChunk::new(slice.to_vec(), self.sample_rate, self.channels))
            .collect()
    }
}

/// Fixed-duration slice of decoded audio.
///
/// Immutable once built: produced by the decoder stage, owned by the playback
/// queue, consumed exactly once by the playback stage.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    duration: Duration,
}

impl DecodedChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let frames = if channels == 0 {
            0
        } else {
            samples.len() / channels as usize
        };
        Self {
            duration: frames_to_duration(frames, sample_rate),
            samples,
            sample_rate,
            channels,
        }
    }

    /// Interleaved PCM samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Real-time duration of this chunk
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Take ownership of the sample data
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((frames as u64 * 1_000_000_000) / sample_rate as u64)
}
