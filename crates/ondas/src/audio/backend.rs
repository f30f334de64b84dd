//! Playback backend traits
//!
//! The seam between the player component and the audio stack. The component
//! only ever talks to these traits, so its lifecycle and state transitions
//! are testable without a sound card or a network connection.

use crossbeam_channel::Sender;

use crate::error::Result;
use crate::state::PlayerEvent;

/// A live playback handle bound to one stream URL.
///
/// All methods are requests: their outcome is reported asynchronously as
/// [`PlayerEvent`]s on the channel the handle was opened with. Dropping the
/// handle releases the underlying resources.
pub trait PlaybackHandle: Send {
    /// Request playback start (or resume, when paused)
    fn play(&mut self);

    /// Request pause
    fn pause(&mut self);

    /// Request stop
    fn stop(&mut self);

    /// Apply a normalized volume (0.0..=1.0)
    fn set_volume(&mut self, volume: f32);
}

/// Factory for playback handles
pub trait AudioBackend {
    /// Open a handle bound to `url`, reporting events on `events`.
    ///
    /// Opening never touches the audio device or the network; those are
    /// deferred to the first `play()` request.
    fn open(
        &self,
        url: &str,
        volume: f32,
        events: Sender<PlayerEvent>,
    ) -> Result<Box<dyn PlaybackHandle>>;
}
