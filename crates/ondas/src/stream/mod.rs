//! Stream fetching
//!
//! Connects to the station's HTTP(S) endpoint and hands the response body
//! to the audio subsystem through a producer-consumer chunk buffer. The
//! response `Content-Type` is mapped to a format hint for the probe; the
//! station negotiates between MP3 and AAC.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;

use crate::config::network::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS, USER_AGENT};
use crate::error::{PlayerError, Result};

pub mod buffer;

pub use buffer::ChunkReader;

/// A connected stream ready for the format probe
pub struct StreamConnection {
    pub reader: ChunkReader,
    /// Format hint derived from the response `Content-Type`
    pub format_hint: Option<String>,
    pub content_type: Option<String>,
    /// Cancels the background producer thread
    pub stop_flag: Arc<AtomicBool>,
}

/// Connect to `url` and start reading the stream body in the background.
///
/// Blocks until the first chunk of audio data arrives, so dead endpoints
/// surface as an error here rather than hanging the probe.
pub fn connect(url: &str) -> Result<StreamConnection> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        // The body is an endless stream; the chunk consumer enforces its
        // own read timeout instead of a whole-request deadline.
        .timeout(None)
        .build()?;

    let response = client.get(url).send()?;

    if !response.status().is_success() {
        return Err(PlayerError::Stream(format!("HTTP {}", response.status())));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let format_hint = content_type
        .as_deref()
        .and_then(format_hint_for)
        .map(|s| s.to_string());

    let (mut reader, stop_flag) = buffer::spawn_producer(response)?;
    reader
        .wait_initial(Duration::from_secs(READ_TIMEOUT_SECS))
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::TimedOut => {
                PlayerError::Timeout("Timeout waiting for stream data".to_string())
            }
            _ => PlayerError::Io(e),
        })?;

    Ok(StreamConnection {
        reader,
        format_hint,
        content_type,
        stop_flag,
    })
}

/// Map a `Content-Type` header value to a probe format hint
pub fn format_hint_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/mpeg" | "audio/mp3" | "audio/x-mpeg" => Some("mp3"),
        "audio/aac" | "audio/aacp" | "audio/x-aac" => Some("aac"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Format hints ---

    #[test]
    fn mpeg_maps_to_mp3() {
        assert_eq!(format_hint_for("audio/mpeg"), Some("mp3"));
        assert_eq!(format_hint_for("audio/mp3"), Some("mp3"));
        assert_eq!(format_hint_for("audio/x-mpeg"), Some("mp3"));
    }

    #[test]
    fn aac_variants_map_to_aac() {
        assert_eq!(format_hint_for("audio/aac"), Some("aac"));
        assert_eq!(format_hint_for("audio/aacp"), Some("aac"));
        assert_eq!(format_hint_for("audio/x-aac"), Some("aac"));
    }

    #[test]
    fn hint_ignores_parameters_and_case() {
        assert_eq!(format_hint_for("Audio/MPEG; charset=utf-8"), Some("mp3"));
        assert_eq!(format_hint_for("audio/aacp;br=64"), Some("aac"));
    }

    #[test]
    fn unknown_content_types_have_no_hint() {
        assert_eq!(format_hint_for("text/html"), None);
        assert_eq!(format_hint_for("application/octet-stream"), None);
        assert_eq!(format_hint_for(""), None);
    }

    // --- connect ---

    #[test]
    fn connect_rejects_invalid_url() {
        let result = connect("not a url");
        assert!(result.is_err());
    }

    #[test]
    fn connect_fails_on_unresolvable_host() {
        let result = connect("http://invalid.invalid.invalid/stream");
        assert!(result.is_err());
    }
}
