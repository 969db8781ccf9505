//! Streaming sample-rate conversion using rubato
//!
//! Chunks arrive at the source's native rate (often 16-24 kHz for voice-grade
//! MP3) while output devices usually only accept 44.1/48 kHz. One
//! `StreamResampler` lives for the whole output stream so consecutive chunks
//! are converted without a discontinuity at every chunk boundary.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Input frames handed to rubato per `process` call
const RESAMPLER_CHUNK_FRAMES: usize = 256;

/// Stateful resampler for one (input rate, output rate, channels) triple.
pub struct StreamResampler {
    resampler: FastFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Planar input not yet consumed (less than one resampler chunk)
    pending: Vec<Vec<f32>>,
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self> {
        if input_rate == 0 || output_rate == 0 || channels == 0 {
            return Err(Error::AudioOutput(format!(
                "Invalid resampler parameters: {}Hz -> {}Hz, {} channels",
                input_rate, output_rate, channels
            )));
        }

        debug!(
            "Creating resampler {}Hz -> {}Hz ({} channels)",
            input_rate, output_rate, channels
        );

        let resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0, // max_relative_ratio (no runtime changes)
            PolynomialDegree::Cubic,
            RESAMPLER_CHUNK_FRAMES,
            channels as usize,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {}", e)))?;

        Ok(Self {
            resampler,
            input_rate,
            output_rate,
            channels: channels as usize,
            pending: vec![Vec::new(); channels as usize],
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels as u16
    }

    /// True if this resampler converts exactly this stream layout
    pub fn matches(&self, input_rate: u32, output_rate: u32, channels: u16) -> bool {
        self.input_rate == input_rate
            && self.output_rate == output_rate
            && self.channels == channels as usize
    }

    /// Feed interleaved input, get back whatever interleaved output is ready.
    ///
    /// Input that does not fill a whole resampler chunk is held until the next call.
    pub fn process(&mut self, interleaved: &[f32]) -> Result<Vec<f32>> {
        for (ch, plane) in deinterleave(interleaved, self.channels).into_iter().enumerate() {
            self.pending[ch].extend(plane);
        }

        let mut output = Vec::new();
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending[0].len() < needed {
                break;
            }

            let block: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|plane| plane.drain(..needed).collect())
                .collect();

            let planar_out = self
                .resampler
                .process(&block, None)
                .map_err(|e| Error::AudioOutput(format!("Resampling failed: {}", e)))?;

            output.extend(interleave(&planar_out));
        }

        Ok(output)
    }

    /// Convert whatever input is still held back, plus the filter delay.
    ///
    /// Call once at end of stream; the resampler can keep being used after,
    /// but the next input starts from silence.
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let pending_frames = self.pending[0].len();
        if pending_frames == 0 {
            return Ok(Vec::new());
        }

        let ratio = self.output_rate as f64 / self.input_rate as f64;
        let expected_frames =
            (pending_frames as f64 * ratio).ceil() as usize + self.resampler.output_delay();

        let pending = std::mem::replace(&mut self.pending, vec![Vec::new(); self.channels]);
        let mut planar = self
            .resampler
            .process_partial(Some(pending.as_slice()), None)
            .map_err(|e| Error::AudioOutput(format!("Resampler flush failed: {}", e)))?;

        // Push the delayed tail of the real input out of the filter
        while planar[0].len() < expected_frames {
            let more = self
                .resampler
                .process_partial::<Vec<f32>>(None, None)
                .map_err(|e| Error::AudioOutput(format!("Resampler flush failed: {}", e)))?;
            if more[0].is_empty() {
                break;
            }
            for (plane, extra) in planar.iter_mut().zip(more) {
                plane.extend(extra);
            }
        }

        for plane in planar.iter_mut() {
            plane.truncate(expected_frames);
        }
        debug!(
            "Flushed resampler: {} held input frames -> {} output frames",
            pending_frames,
            planar[0].len()
        );
        Ok(interleave(&planar))
    }
}

/// Convert interleaved samples to planar format.
///
/// Input:  [L, R, L, R, L, R, ...]
/// Output: [[L, L, L, ...], [R, R, R, ...]]
pub(crate) fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let num_frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(num_frames); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }

    planar
}

/// Convert planar samples to interleaved format.
pub(crate) fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };

    let num_frames = first.len();
    let mut interleaved = Vec::with_capacity(num_frames * planar.len());
    for frame_idx in 0..num_frames {
        for plane in planar {
            interleaved.push(plane[frame_idx]);
        }
    }

    interleaved
}
