//! Playback session
//!
//! One session wraps one playback handle bound to the fixed stream URL,
//! together with the desired volume. Sessions are created on component
//! initialization, destroyed and recreated on every retry, and owned
//! exclusively by the component.

use crossbeam_channel::Sender;

use crate::audio::{AudioBackend, PlaybackHandle};
use crate::config::volume::MAX_PERCENT;
use crate::error::Result;
use crate::state::PlayerEvent;

/// Convert a UI volume (0-100) to the normalized fraction the audio stack
/// expects. Out-of-range input is clamped.
pub fn normalize_volume(percent: u8) -> f32 {
    percent.min(MAX_PERCENT) as f32 / MAX_PERCENT as f32
}

/// A live playback session around one handle
pub struct PlaybackSession {
    handle: Box<dyn PlaybackHandle>,
    volume_percent: u8,
}

impl PlaybackSession {
    /// Open a new session. The handle reports its lifecycle as
    /// [`PlayerEvent`]s on `events`.
    pub fn open(
        backend: &dyn AudioBackend,
        url: &str,
        volume_percent: u8,
        events: Sender<PlayerEvent>,
    ) -> Result<Self> {
        let volume_percent = volume_percent.min(MAX_PERCENT);
        let handle = backend.open(url, normalize_volume(volume_percent), events)?;
        Ok(Self {
            handle,
            volume_percent,
        })
    }

    /// Desired volume (0-100)
    pub fn volume_percent(&self) -> u8 {
        self.volume_percent
    }

    /// Request playback start (or resume)
    pub fn play(&mut self) {
        self.handle.play();
    }

    /// Request pause
    pub fn pause(&mut self) {
        self.handle.pause();
    }

    /// Request stop
    pub fn stop(&mut self) {
        self.handle.stop();
    }

    /// Apply a new volume to the handle, normalized to 0.0..=1.0
    pub fn set_volume_percent(&mut self, percent: u8) {
        self.volume_percent = percent.min(MAX_PERCENT);
        self.handle.set_volume(normalize_volume(self.volume_percent));
    }
}
