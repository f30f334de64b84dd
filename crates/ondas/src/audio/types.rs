//! Shared audio types
//!
//! Pure data types used across the audio subsystem.

use std::fmt;

/// Codec information for the current stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub codec_name: String,
    pub channels: u16,
    pub sample_rate: u32,
}

impl fmt::Display for CodecInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel_str = if self.channels == 1 { "Mono" } else { "Stereo" };
        write!(
            f,
            "{} · {} Hz · {}",
            self.codec_name, self.sample_rate, channel_str
        )
    }
}
