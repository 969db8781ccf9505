//! Stream decoding using symphonia
//!
//! The decoder stage treats decoding as an opaque capability: hand over the
//! accumulated compressed bytes, get back PCM or a (transient) error.
//! `SymphoniaDecoder` decodes the bytes as one complete container held in
//! memory, stopping cleanly where the data runs out.

use crate::audio::types::DecodedAudio;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Bytes in, PCM out.
///
/// An `Err` means "not decodable yet" and is never fatal: the caller waits for
/// more bytes and tries again. An `Ok` with no samples is a no-op.
pub trait StreamDecoder: Send {
    fn decode(&mut self, data: Vec<u8>) -> Result<DecodedAudio>;
}

/// In-memory container decoder backed by symphonia's default registries.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    /// Container/extension hint for format detection (e.g. "mp3")
    format_hint: Option<String>,
}

impl SymphoniaDecoder {
    pub fn new(format_hint: Option<String>) -> Self {
        Self { format_hint }
    }

    /// Decoder for MPEG audio streams, the format sent by the speaker firmware
    pub fn mp3() -> Self {
        Self::new(Some("mp3".to_string()))
    }

    fn decode_bytes(&self, data: Vec<u8>) -> Result<DecodedAudio> {
        let input_len = data.len();
        let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.format_hint.as_deref() {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buf: Option<(SampleBuffer<f32>, SignalSpec)> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // End of the accumulated bytes
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) if samples.is_empty() => {
                    return Err(Error::Decode(format!("Failed to read packet: {}", e)));
                }
                Err(e) => {
                    debug!("Stopping at unreadable packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    sample_rate = spec.rate;
                    channels = spec.channels.count() as u16;

                    // Reuse the conversion buffer unless the stream layout changed
                    let frames = decoded.capacity();
                    let reusable = matches!(
                        &sample_buf,
                        Some((buf, buf_spec)) if *buf_spec == spec
                            && buf.capacity() >= frames * spec.channels.count()
                    );
                    if !reusable {
                        sample_buf = Some((SampleBuffer::<f32>::new(frames as u64, spec), spec));
                    }

                    if let Some((buf, _)) = sample_buf.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt or truncated frame, keep going
                    trace!("Skipping undecodable packet: {}", e);
                }
                Err(SymphoniaError::IoError(e)) => {
                    trace!("Packet truncated at end of data: {}", e);
                    break;
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decoder failure: {}", e)));
                }
            }
        }

        debug!(
            "Decoded {} input bytes to {} samples ({} Hz, {} ch)",
            input_len,
            samples.len(),
            sample_rate,
            channels
        );

        Ok(DecodedAudio::new(samples, sample_rate, channels))
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::mp3()
    }
}

impl StreamDecoder for SymphoniaDecoder {
    fn decode(&mut self, data: Vec<u8>) -> Result<DecodedAudio> {
        self.decode_bytes(data)
    }
}
