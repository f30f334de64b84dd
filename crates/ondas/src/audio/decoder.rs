//! Audio decoder using Symphonia
//!
//! Provides `SymphoniaSource`, which decodes the stream into f32 samples
//! for the output sink. The format probe runs on its own thread so a
//! malformed or silent stream cannot hang the playback thread past the
//! probe timeout.

use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use rodio::Source;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::{Hint, ProbeResult};

use crate::config::timeouts::PROBE_TIMEOUT_SECS;
use crate::error::{PlayerError, Result};

use super::types::CodecInfo;

/// Convert a symphonia codec type to a human-readable name
pub fn codec_type_to_name(codec: symphonia::core::codecs::CodecType) -> String {
    use symphonia::core::codecs::*;
    match codec {
        CODEC_TYPE_AAC => "AAC".to_string(),
        CODEC_TYPE_MP3 => "MP3".to_string(),
        CODEC_TYPE_FLAC => "FLAC".to_string(),
        CODEC_TYPE_VORBIS => "Vorbis".to_string(),
        CODEC_TYPE_PCM_U8 => "PCM 8-bit".to_string(),
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM 16-bit".to_string(),
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM 24-bit".to_string(),
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM 32-bit".to_string(),
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM 32-bit Float".to_string(),
        _ => "Audio".to_string(),
    }
}

/// Spawn a probe thread and return the receiver immediately (non-blocking).
///
/// The probe runs on a background `"format-probe"` thread. The caller can
/// poll the returned `Receiver` with `try_recv()` or block with
/// `recv_timeout()`.
pub fn start_probe<R: Read + Send + Sync + 'static>(
    reader: R,
    format_hint: Option<String>,
) -> Result<Receiver<Result<ProbeResult>>> {
    let source = ReadOnlySource::new(reader);
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let mut hint = Hint::new();

    if let Some(ref ext) = format_hint {
        hint.with_extension(ext);
    }

    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("format-probe".to_string())
        .spawn(move || {
            let probe = symphonia::default::get_probe();
            let result = probe.format(&hint, mss, &format_opts, &metadata_opts);
            let _ = tx.send(result.map_err(|e| PlayerError::Decode(format!("Probe error: {}", e))));
        })
        .map_err(|e| PlayerError::Audio(format!("Failed to spawn probe thread: {}", e)))?;

    Ok(rx)
}

/// A symphonia-based audio source for the output sink
pub struct SymphoniaSource {
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    format: Box<dyn symphonia::core::formats::FormatReader>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_idx: usize,
    channels: u16,
    sample_rate: u32,
    codec_name: String,
    /// Stores the last non-EOF error for the playback thread to check
    /// after the sink drains
    last_error: Arc<Mutex<Option<String>>>,
}

impl SymphoniaSource {
    /// Create a new source with an optional format hint (e.g., "mp3", "aac").
    ///
    /// Blocks for up to the probe timeout while detecting the format.
    pub fn new_with_hint<R: Read + Send + Sync + 'static>(
        reader: R,
        format_hint: Option<String>,
    ) -> Result<Self> {
        let rx = start_probe(reader, format_hint)?;

        let probed = match rx.recv_timeout(Duration::from_secs(PROBE_TIMEOUT_SECS)) {
            Ok(Ok(probed)) => probed,
            Ok(Err(e)) => return Err(e),
            Err(RecvTimeoutError::Timeout) => {
                return Err(PlayerError::Timeout(format!(
                    "Format probe timed out after {}s",
                    PROBE_TIMEOUT_SECS
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(PlayerError::Decode("Probe thread panicked".to_string()))
            }
        };

        Self::from_probed(probed)
    }

    /// Create a `SymphoniaSource` from a completed `ProbeResult` (no I/O)
    pub fn from_probed(probed: ProbeResult) -> Result<Self> {
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlayerError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| PlayerError::Decode(format!("Decoder creation error: {}", e)))?;

        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let codec_name = codec_type_to_name(codec_params.codec);

        let mut source = Self {
            decoder,
            format,
            track_id,
            sample_buf: None,
            sample_idx: 0,
            channels,
            sample_rate,
            codec_name,
            last_error: Arc::new(Mutex::new(None)),
        };

        // Pre-decode the first frame to discover the actual output spec.
        // ADTS headers can carry a core rate that differs from what the
        // decoder actually produces.
        source.decode_next_packet();

        Ok(source)
    }

    /// Get the error slot for checking after the stream ends.
    ///
    /// If the stream ended due to an I/O or decode error (not clean EOF),
    /// the slot contains the error message.
    pub fn error_slot(&self) -> Arc<Mutex<Option<String>>> {
        self.last_error.clone()
    }

    /// Get full codec info as a `CodecInfo` struct
    pub fn codec_info(&self) -> CodecInfo {
        CodecInfo {
            codec_name: self.codec_name.clone(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    fn decode_next_packet(&mut self) -> bool {
        loop {
            match self.format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != self.track_id {
                        continue;
                    }

                    match self.decoder.decode(&packet) {
                        Ok(decoded) => {
                            let spec = *decoded.spec();
                            let duration = decoded.capacity() as u64;

                            // Track the decoder's real output spec
                            self.sample_rate = spec.rate;
                            self.channels = spec.channels.count() as u16;

                            if self.sample_buf.is_none()
                                || self.sample_buf.as_ref().unwrap().capacity() < duration as usize
                            {
                                self.sample_buf = Some(SampleBuffer::new(duration, spec));
                            }

                            if let Some(ref mut buf) = self.sample_buf {
                                buf.copy_interleaved_ref(decoded);
                                self.sample_idx = 0;
                                return true;
                            }
                        }
                        Err(symphonia::core::errors::Error::DecodeError(_)) => {
                            // Skip corrupt packets; radio streams produce
                            // these at connect time mid-frame
                            continue;
                        }
                        Err(e) => {
                            if let Ok(mut err) = self.last_error.lock() {
                                *err = Some(format!("{}", e));
                            }
                            return false;
                        }
                    }
                }
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // Clean EOF — stream ended naturally, no error stored
                    return false;
                }
                Err(e) => {
                    // I/O error or other — likely network failure
                    if let Ok(mut err) = self.last_error.lock() {
                        *err = Some(format!("{}", e));
                    }
                    return false;
                }
            }
        }
    }
}

impl Iterator for SymphoniaSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(ref buf) = self.sample_buf {
                if self.sample_idx < buf.samples().len() {
                    let sample = buf.samples()[self.sample_idx];
                    self.sample_idx += 1;
                    return Some(sample);
                }
            }

            if !self.decode_next_packet() {
                return None;
            }
        }
    }
}

impl Source for SymphoniaSource {
    fn current_span_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
