//! Shared fixtures for speaker-rx integration tests
//!
//! - `ScriptedDecoder`: decodes once the input is long enough, emitting a
//!   counting ramp so order and loss can be checked sample by sample
//! - `EmptyDecoder`: always succeeds with no audio
//! - `PanickingDecoder`: a decoder bug that takes its thread down
//! - `RecordingOutput` / `FailingOutput`: stand-ins for the audio device
//! - `audio_generator`: in-memory WAV (hound) and silent MP3 streams

#![allow(dead_code)]

pub mod audio_generator;

use parking_lot::Mutex;
use speaker_rx::audio::{DecodedAudio, DecodedChunk, OutputDevice, StreamDecoder};
use speaker_rx::config::PipelineConfig;
use speaker_rx::{Error, Result, Session, ShutdownToken};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Decoder whose success depends only on the input length.
///
/// Inputs shorter than `min_len` fail like an incomplete frame. Longer inputs
/// yield `frames` mono frames whose values continue a ramp across calls
/// (0.0, 1.0, 2.0, ...), so the rendered stream must be that ramp exactly.
pub struct ScriptedDecoder {
    min_len: usize,
    sample_rate: u32,
    frames: usize,
    next_value: u32,
    log: DecoderLog,
}

/// Observes a decoder after it has moved onto the decoder thread
#[derive(Clone, Default)]
pub struct DecoderLog {
    calls: Arc<AtomicUsize>,
    input_lens: Arc<Mutex<Vec<usize>>>,
}

impl DecoderLog {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Length of every input handed to the decoder, in call order
    pub fn input_lens(&self) -> Vec<usize> {
        self.input_lens.lock().clone()
    }

    fn record(&self, len: usize) {
        self.input_lens.lock().push(len);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScriptedDecoder {
    pub fn new(min_len: usize, sample_rate: u32, frames: usize) -> Self {
        Self {
            min_len,
            sample_rate,
            frames,
            next_value: 0,
            log: DecoderLog::default(),
        }
    }

    pub fn log(&self) -> DecoderLog {
        self.log.clone()
    }
}

impl StreamDecoder for ScriptedDecoder {
    fn decode(&mut self, data: Vec<u8>) -> Result<DecodedAudio> {
        self.log.record(data.len());
        if data.len() < self.min_len {
            return Err(Error::Decode(format!(
                "incomplete frame ({} of {} bytes)",
                data.len(),
                self.min_len
            )));
        }

        let start = self.next_value;
        self.next_value += self.frames as u32;
        let samples = (start..self.next_value).map(|v| v as f32).collect();
        Ok(DecodedAudio::new(samples, self.sample_rate, 1))
    }
}

/// Always decodes successfully to nothing
#[derive(Default)]
pub struct EmptyDecoder {
    log: DecoderLog,
}

impl EmptyDecoder {
    pub fn log(&self) -> DecoderLog {
        self.log.clone()
    }
}

impl StreamDecoder for EmptyDecoder {
    fn decode(&mut self, data: Vec<u8>) -> Result<DecodedAudio> {
        self.log.record(data.len());
        Ok(DecodedAudio::default())
    }
}

/// Panics on the first input of at least `min_len` bytes
pub struct PanickingDecoder {
    min_len: usize,
}

impl PanickingDecoder {
    pub fn new(min_len: usize) -> Self {
        Self { min_len }
    }
}

impl StreamDecoder for PanickingDecoder {
    fn decode(&mut self, data: Vec<u8>) -> Result<DecodedAudio> {
        if data.len() >= self.min_len {
            panic!("decoder bug on {} bytes", data.len());
        }
        Err(Error::Decode("incomplete frame".to_string()))
    }
}

/// A chunk as the output device saw it
#[derive(Debug, Clone)]
pub struct RenderedChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
    pub rendered_at: Instant,
}

/// Shared log of rendered chunks
#[derive(Clone, Default)]
pub struct Recorder {
    chunks: Arc<Mutex<Vec<RenderedChunk>>>,
    finished: Arc<AtomicBool>,
}

impl Recorder {
    /// True once the output was asked to play out the end of the stream
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunks(&self) -> Vec<RenderedChunk> {
        self.chunks.lock().clone()
    }

    /// Every rendered sample, in render order
    pub fn samples(&self) -> Vec<f32> {
        self.chunks
            .lock()
            .iter()
            .flat_map(|c| c.samples.iter().copied())
            .collect()
    }

    fn push(&self, chunk: &DecodedChunk) {
        self.chunks.lock().push(RenderedChunk {
            samples: chunk.samples().to_vec(),
            sample_rate: chunk.sample_rate(),
            channels: chunk.channels(),
            duration: chunk.duration(),
            rendered_at: Instant::now(),
        });
    }
}

/// How long `RecordingOutput::play` blocks
#[derive(Debug, Clone, Copy)]
pub enum Pace {
    /// Return immediately
    Instant,
    /// Block for the chunk's duration, like a real device
    Realtime,
    /// Block until shutdown
    Stalled,
}

pub struct RecordingOutput {
    recorder: Recorder,
    pace: Pace,
}

impl RecordingOutput {
    pub fn new(recorder: Recorder, pace: Pace) -> Self {
        Self { recorder, pace }
    }
}

impl OutputDevice for RecordingOutput {
    fn play(&mut self, chunk: DecodedChunk, shutdown: &ShutdownToken) -> Result<()> {
        self.recorder.push(&chunk);
        match self.pace {
            Pace::Instant => {}
            Pace::Realtime => {
                shutdown.sleep(chunk.duration());
            }
            Pace::Stalled => {
                shutdown.sleep(Duration::from_secs(3600));
            }
        }
        Ok(())
    }

    fn finish(&mut self, _shutdown: &ShutdownToken) -> Result<()> {
        self.recorder.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Plays `healthy_chunks` chunks, then fails like an unplugged device
pub struct FailingOutput {
    healthy_chunks: usize,
    played: usize,
}

impl FailingOutput {
    pub fn new(healthy_chunks: usize) -> Self {
        Self {
            healthy_chunks,
            played: 0,
        }
    }
}

impl OutputDevice for FailingOutput {
    fn play(&mut self, _chunk: DecodedChunk, _shutdown: &ShutdownToken) -> Result<()> {
        if self.played >= self.healthy_chunks {
            return Err(Error::AudioOutput("device disconnected".to_string()));
        }
        self.played += 1;
        Ok(())
    }
}

/// Start a session whose output is built on the playback thread from `output`
pub fn start_session<D, O>(config: &PipelineConfig, decoder: D, output: O) -> Session
where
    D: StreamDecoder + 'static,
    O: OutputDevice + Send + 'static,
{
    Session::start(config, decoder, move || Ok::<_, Error>(output)).unwrap()
}

/// Poll `condition` every 5ms until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Deliver `data` as notification-sized fragments
pub fn send_fragments(session: &Session, data: &[u8], fragment_size: usize) {
    let ingest = session.ingest();
    for fragment in data.chunks(fragment_size) {
        ingest.on_fragment(fragment);
    }
}

/// Ramp check: rendered samples must be exactly 0.0, 1.0, 2.0, ...
pub fn assert_contiguous_ramp(samples: &[f32]) {
    for (i, sample) in samples.iter().enumerate() {
        assert_eq!(*sample, i as f32, "sample {} out of order or missing", i);
    }
}
