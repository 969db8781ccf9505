//! Audio output using cpal
//!
//! The playback stage sees the device as a blocking primitive: `play` returns
//! only once the chunk has been handed to the device and the device has
//! drained it down to a small low-water mark. That blocking is what paces the
//! whole pipeline at real time.
//!
//! Internally a cpal callback stream pulls from a lock-free sample ring; `play`
//! converts the chunk to the device layout (channel mapping + resampling) and
//! pushes it into the ring.

use crate::audio::resampler::StreamResampler;
use crate::audio::ring_buffer::{SampleProducer, SampleRing};
use crate::audio::types::DecodedChunk;
use crate::config::OutputSettings;
use crate::error::{Error, Result};
use crate::pipeline::shutdown::ShutdownToken;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long `play` lets the device run dry before returning (ms of audio)
const LOW_WATER_MS: u32 = 20;

/// Poll interval while waiting for ring space or drain
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Blocking "play these samples at this rate" primitive.
///
/// Implementations must return only after the chunk has been rendered (or
/// fully buffered by the driver), and should return early once `shutdown` is
/// raised. Any `Err` is treated as fatal by the playback stage.
pub trait OutputDevice {
    fn play(&mut self, chunk: DecodedChunk, shutdown: &ShutdownToken) -> Result<()>;

    /// Called once after the last chunk of a stream that ended normally.
    ///
    /// Should return only after everything handed to `play` is audible.
    fn finish(&mut self, _shutdown: &ShutdownToken) -> Result<()> {
        Ok(())
    }
}

/// List available audio output devices.
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();

    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// Audio output manager using cpal.
///
/// Not `Send` (cpal streams are pinned to their creating thread); the session
/// therefore opens it on the playback thread.
pub struct CpalOutput {
    device_name: String,
    config: StreamConfig,
    producer: SampleProducer,
    /// Keeps the callback alive; dropped with the output
    _stream: Stream,
    /// Set by the cpal error callback
    error_flag: Arc<AtomicBool>,
    resampler: Option<StreamResampler>,
    low_water_samples: usize,
}

impl CpalOutput {
    /// Open the requested device (falling back to the default) and start the stream.
    pub fn open(settings: &OutputSettings) -> Result<Self> {
        let device = select_device(settings.device.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        let channels = config.channels as usize;
        let rate = config.sample_rate.0 as usize;
        let ring_frames = settings.ring_buffer_frames.unwrap_or(rate);
        let (producer, consumer) = SampleRing::new(ring_frames * channels).split();

        let error_flag = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, &error_flag)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, &error_flag)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, &error_flag)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &config, consumer, &error_flag)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        info!(
            "Audio output started on '{}' ({} Hz, {} ch, {:?})",
            device_name, config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device_name,
            low_water_samples: (rate * LOW_WATER_MS as usize / 1000) * channels,
            config,
            producer,
            _stream: stream,
            error_flag,
            resampler: None,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    fn check_stream(&self) -> Result<()> {
        if self.error_flag.load(Ordering::Acquire) {
            return Err(Error::AudioOutput(format!(
                "Output stream on '{}' reported an error",
                self.device_name
            )));
        }
        Ok(())
    }

    /// Convert a chunk to device rate and channel layout
    fn prepare(&mut self, chunk: DecodedChunk) -> Result<Vec<f32>> {
        let device_rate = self.sample_rate();
        let source_channels = chunk.channels();

        let samples = if chunk.sample_rate() == device_rate {
            chunk.into_samples()
        } else {
            let needs_new = !self
                .resampler
                .as_ref()
                .is_some_and(|r| r.matches(chunk.sample_rate(), device_rate, source_channels));
            if needs_new {
                self.resampler = Some(StreamResampler::new(
                    chunk.sample_rate(),
                    device_rate,
                    source_channels,
                )?);
            }
            match self.resampler.as_mut() {
                Some(resampler) => resampler.process(chunk.samples())?,
                None => Vec::new(),
            }
        };

        Ok(map_channels(&samples, source_channels, self.channels()))
    }

    /// Push device-layout samples into the ring, then block until the ring
    /// holds no more than `low_water` samples.
    fn push_and_wait(
        &mut self,
        samples: &[f32],
        low_water: usize,
        shutdown: &ShutdownToken,
    ) -> Result<()> {
        let mut offset = 0;
        while offset < samples.len() {
            if shutdown.is_raised() {
                return Ok(());
            }
            let pushed = self.producer.push_slice(&samples[offset..]);
            offset += pushed;
            if pushed == 0 {
                std::thread::sleep(POLL_INTERVAL);
                self.check_stream()?;
            }
        }

        while self.producer.occupied_len() > low_water {
            if !shutdown.sleep(POLL_INTERVAL) {
                return Ok(());
            }
            self.check_stream()?;
        }

        Ok(())
    }
}

impl OutputDevice for CpalOutput {
    fn play(&mut self, chunk: DecodedChunk, shutdown: &ShutdownToken) -> Result<()> {
        self.check_stream()?;
        let samples = self.prepare(chunk)?;
        self.push_and_wait(&samples, self.low_water_samples, shutdown)
    }

    /// Release the resampler's held-back frames and play the ring dry.
    fn finish(&mut self, shutdown: &ShutdownToken) -> Result<()> {
        self.check_stream()?;

        let tail = match self.resampler.as_mut() {
            Some(resampler) => {
                let source_channels = resampler.channels();
                let flushed = resampler.flush()?;
                map_channels(&flushed, source_channels, self.channels())
            }
            None => Vec::new(),
        };

        debug!(
            "Draining output: {} flushed samples, {} still in ring",
            tail.len(),
            self.producer.occupied_len()
        );
        self.push_and_wait(&tail, 0, shutdown)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let stats = self.producer.stats();
        debug!(
            "Closing audio output '{}' (consumed={} samples, underruns={})",
            self.device_name, stats.consumed, stats.underruns
        );
    }
}

/// Find the named device, falling back to the host default
fn select_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(dev) = devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            info!("Found requested audio device: {}", name);
            return Ok(dev);
        }
        warn!(
            "Requested device '{}' not found, falling back to default device",
            name
        );
    }

    host.default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: crate::audio::ring_buffer::SampleConsumer,
    error_flag: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let error_flag = Arc::clone(error_flag);
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                consumer.fill(&mut scratch);
                for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(sample.clamp(-1.0, 1.0));
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::Release);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}

/// Map interleaved samples between channel counts.
///
/// Mono is copied to every output channel; otherwise channels map one to one,
/// extra source channels are dropped and extra output channels are silent.
pub(crate) fn map_channels(samples: &[f32], source: u16, target: u16) -> Vec<f32> {
    if source == target || source == 0 || target == 0 {
        return samples.to_vec();
    }

    let source = source as usize;
    let target = target as usize;
    let frames = samples.len() / source;
    let mut out = Vec::with_capacity(frames * target);

    for frame in samples.chunks_exact(source) {
        for ch in 0..target {
            let sample = if source == 1 {
                frame[0]
            } else {
                frame.get(ch).copied().unwrap_or(0.0)
            };
            out.push(sample);
        }
    }

    out
}
