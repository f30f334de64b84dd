//! Player state machine
//!
//! `PlayerEvent` is the explicit event type the backend reports over a
//! channel, decoupled from any callback shape of the underlying audio
//! stack. `transition` folds one event into the snapshot and returns the
//! side effects the component must carry out, which keeps the whole state
//! machine testable without a real stream.

use std::fmt;

use crate::audio::CodecInfo;
use crate::config::{metadata::IDLE_LABEL, volume::DEFAULT_PERCENT};

/// The single user-visible message both error kinds collapse to
pub const STREAM_ERROR_MESSAGE: &str = "Connection error with the stream";

/// Current playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    Stopped,
    Loading,
    Playing,
    Paused,
    Errored,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Stopped => write!(f, "Stopped"),
            PlaybackPhase::Loading => write!(f, "Loading"),
            PlaybackPhase::Playing => write!(f, "Playing"),
            PlaybackPhase::Paused => write!(f, "Paused"),
            PlaybackPhase::Errored => write!(f, "Error"),
        }
    }
}

/// Events reported asynchronously by a playback handle
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Playback started (or resumed) with codec info
    PlayStarted(CodecInfo),
    /// Playback paused
    Paused,
    /// Playback stopped
    Stopped,
    /// The stream ended on its own
    Ended,
    /// The stream could not be fetched or its format could not be decoded
    LoadError(String),
    /// Audio output failed, or playback died after it had started
    PlayError(String),
}

/// Side effects the component must carry out after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start the metadata poller
    StartPoller,
    /// Cancel the metadata poller
    StopPoller,
    /// Tear down the session and schedule a delayed reconnect
    ScheduleRetry,
}

/// Snapshot of the player state read by the presentation layer
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub phase: PlaybackPhase,
    pub is_playing: bool,
    pub is_loading: bool,
    /// "Now playing" display label
    pub current_song: String,
    /// User-visible error, if any
    pub error_message: Option<String>,
    /// Desired volume (0-100)
    pub volume: u8,
    /// Codec info from the last play-started event
    pub codec: Option<CodecInfo>,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            phase: PlaybackPhase::Stopped,
            is_playing: false,
            is_loading: false,
            current_song: IDLE_LABEL.to_string(),
            error_message: None,
            volume: DEFAULT_PERCENT,
            codec: None,
        }
    }
}

/// Fold one event into the snapshot, returning the effects to carry out.
///
/// The error detail carried by the event is not surfaced here — both error
/// kinds collapse to [`STREAM_ERROR_MESSAGE`], matching the UI contract.
pub fn transition(snapshot: &mut PlayerSnapshot, event: &PlayerEvent) -> Vec<Effect> {
    match event {
        PlayerEvent::PlayStarted(codec) => {
            snapshot.phase = PlaybackPhase::Playing;
            snapshot.is_playing = true;
            snapshot.is_loading = false;
            snapshot.error_message = None;
            snapshot.codec = Some(codec.clone());
            vec![Effect::StartPoller]
        }
        PlayerEvent::Paused => {
            snapshot.phase = PlaybackPhase::Paused;
            snapshot.is_playing = false;
            vec![Effect::StopPoller]
        }
        PlayerEvent::Stopped | PlayerEvent::Ended => {
            snapshot.phase = PlaybackPhase::Stopped;
            snapshot.is_playing = false;
            vec![Effect::StopPoller]
        }
        PlayerEvent::LoadError(_) | PlayerEvent::PlayError(_) => {
            snapshot.phase = PlaybackPhase::Errored;
            snapshot.is_playing = false;
            snapshot.is_loading = false;
            snapshot.error_message = Some(STREAM_ERROR_MESSAGE.to_string());
            vec![Effect::StopPoller, Effect::ScheduleRetry]
        }
    }
}
