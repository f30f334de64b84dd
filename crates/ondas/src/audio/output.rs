//! Rodio playback backend
//!
//! Runs playback on a dedicated thread, accepting commands via crossbeam
//! channels and reporting lifecycle events back over the player's event
//! channel. Opening a handle touches neither the audio device nor the
//! network; both are deferred to the first play request, so constructing
//! the component never fails on machines without a sound card.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use crate::audio::backend::{AudioBackend, PlaybackHandle};
use crate::audio::decoder::SymphoniaSource;
use crate::audio::types::CodecInfo;
use crate::error::{PlayerError, Result};
use crate::state::PlayerEvent;
use crate::stream::{self, StreamConnection};

/// Commands sent to the playback thread
#[derive(Debug)]
enum HandleCommand {
    Play,
    Pause,
    Stop,
    SetVolume(f32),
    Release,
}

/// Production backend built on rodio + symphonia
#[derive(Debug, Default)]
pub struct RodioBackend;

impl RodioBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for RodioBackend {
    fn open(
        &self,
        url: &str,
        volume: f32,
        events: Sender<PlayerEvent>,
    ) -> Result<Box<dyn PlaybackHandle>> {
        let (cmd_tx, cmd_rx) = bounded::<HandleCommand>(16);
        let url = url.to_string();

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || run(url, volume, events, cmd_rx))
            .map_err(|e| PlayerError::Audio(format!("Failed to spawn playback thread: {}", e)))?;

        Ok(Box::new(RodioHandle { cmd_tx }))
    }
}

/// Handle to one playback thread
pub struct RodioHandle {
    cmd_tx: Sender<HandleCommand>,
}

impl PlaybackHandle for RodioHandle {
    fn play(&mut self) {
        let _ = self.cmd_tx.send(HandleCommand::Play);
    }

    fn pause(&mut self) {
        let _ = self.cmd_tx.send(HandleCommand::Pause);
    }

    fn stop(&mut self) {
        let _ = self.cmd_tx.send(HandleCommand::Stop);
    }

    fn set_volume(&mut self, volume: f32) {
        let _ = self.cmd_tx.send(HandleCommand::SetVolume(volume));
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        // Best-effort release. The thread is not joined: an in-flight
        // connect cannot be cancelled and exits once its timeout elapses.
        let _ = self.cmd_tx.send(HandleCommand::Release);
    }
}

/// Live output resources. `sink` is declared before `_stream` so it is
/// dropped first.
struct Playback {
    sink: Sink,
    _stream: OutputStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Idle,
    Playing,
    Paused,
}

/// The playback thread's main loop
fn run(
    url: String,
    volume: f32,
    events: Sender<PlayerEvent>,
    cmd_rx: Receiver<HandleCommand>,
) {
    let mut volume = volume.clamp(0.0, 1.0);
    let mut output: Option<Playback> = None;
    let mut state = SinkState::Idle;
    let mut codec: Option<CodecInfo> = None;
    let mut error_slot: Option<Arc<Mutex<Option<String>>>> = None;
    let mut producer_stop: Option<Arc<AtomicBool>> = None;

    let cancel_producer = |flag: &mut Option<Arc<AtomicBool>>| {
        if let Some(f) = flag.take() {
            f.store(true, Ordering::SeqCst);
        }
    };

    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(HandleCommand::Play) => match state {
                SinkState::Playing => {}
                SinkState::Paused => {
                    if let Some(p) = &output {
                        p.sink.play();
                    }
                    state = SinkState::Playing;
                    // The underlying library re-fires its play callback on
                    // resume; mirror that with the cached codec info
                    if let Some(info) = codec.clone() {
                        let _ = events.send(PlayerEvent::PlayStarted(info));
                    }
                }
                SinkState::Idle => {
                    if output.is_none() {
                        match OutputStreamBuilder::open_default_stream() {
                            Ok(mut stream) => {
                                stream.log_on_drop(false);
                                let sink = Sink::connect_new(stream.mixer());
                                output = Some(Playback {
                                    sink,
                                    _stream: stream,
                                });
                            }
                            Err(e) => {
                                eprintln!("Failed to open audio output: {e}");
                                let _ = events.send(PlayerEvent::PlayError(format!(
                                    "Failed to open audio output: {e}"
                                )));
                                continue;
                            }
                        }
                    }

                    let connection = match stream::connect(&url) {
                        Ok(c) => c,
                        Err(e) => {
                            eprintln!("Failed to connect to stream: {e}");
                            let _ = events.send(PlayerEvent::LoadError(e.to_string()));
                            continue;
                        }
                    };
                    let StreamConnection {
                        reader,
                        format_hint,
                        stop_flag,
                        ..
                    } = connection;

                    let source = match SymphoniaSource::new_with_hint(reader, format_hint) {
                        Ok(s) => s,
                        Err(e) => {
                            stop_flag.store(true, Ordering::SeqCst);
                            eprintln!("Failed to decode stream: {e}");
                            let _ = events.send(PlayerEvent::LoadError(e.to_string()));
                            continue;
                        }
                    };

                    let info = source.codec_info();
                    let slot = source.error_slot();
                    let playback = output.as_ref().expect("output opened above");
                    playback.sink.append(source);
                    playback.sink.set_volume(volume);
                    playback.sink.play();

                    state = SinkState::Playing;
                    codec = Some(info.clone());
                    error_slot = Some(slot);
                    producer_stop = Some(stop_flag);
                    let _ = events.send(PlayerEvent::PlayStarted(info));
                }
            },
            Ok(HandleCommand::Pause) => {
                if state == SinkState::Playing {
                    if let Some(p) = &output {
                        p.sink.pause();
                    }
                    state = SinkState::Paused;
                    let _ = events.send(PlayerEvent::Paused);
                }
            }
            Ok(HandleCommand::Stop) => {
                if state != SinkState::Idle {
                    if let Some(p) = &output {
                        p.sink.stop();
                    }
                    cancel_producer(&mut producer_stop);
                    error_slot = None;
                    state = SinkState::Idle;
                    let _ = events.send(PlayerEvent::Stopped);
                }
            }
            Ok(HandleCommand::SetVolume(v)) => {
                volume = v.clamp(0.0, 1.0);
                if let Some(p) = &output {
                    p.sink.set_volume(volume);
                }
            }
            Ok(HandleCommand::Release) => {
                cancel_producer(&mut producer_stop);
                if let Some(p) = &output {
                    p.sink.stop();
                }
                break;
            }
            Err(RecvTimeoutError::Timeout) => {
                // Detect the sink draining: clean end of stream vs a
                // mid-play failure recorded in the source's error slot
                let drained = state == SinkState::Playing
                    && output.as_ref().is_some_and(|p| p.sink.empty());
                if drained {
                    let detail = error_slot
                        .take()
                        .and_then(|slot| slot.lock().ok().and_then(|g| g.clone()));
                    cancel_producer(&mut producer_stop);
                    state = SinkState::Idle;
                    match detail {
                        Some(msg) => {
                            eprintln!("Stream died: {msg}");
                            let _ = events
                                .send(PlayerEvent::PlayError(format!("Stream error: {msg}")));
                        }
                        None => {
                            let _ = events.send(PlayerEvent::Ended);
                        }
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                cancel_producer(&mut producer_stop);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn open_handle(url: &str) -> (Box<dyn PlaybackHandle>, Receiver<PlayerEvent>) {
        let (tx, rx) = unbounded();
        let handle = RodioBackend::new()
            .open(url, 0.7, tx)
            .expect("open never touches device or network");
        (handle, rx)
    }

    fn wait_for_event(rx: &Receiver<PlayerEvent>, timeout_ms: u64) -> Option<PlayerEvent> {
        rx.recv_timeout(Duration::from_millis(timeout_ms)).ok()
    }

    #[test]
    fn open_and_drop_does_not_panic() {
        let (handle, _rx) = open_handle("http://example.com/stream");
        drop(handle);
        thread::sleep(Duration::from_millis(50));
    }

    #[test]
    fn commands_before_play_emit_nothing() {
        let (mut handle, rx) = open_handle("http://example.com/stream");

        handle.pause();
        handle.stop();
        handle.set_volume(0.3);
        thread::sleep(Duration::from_millis(300));

        assert!(
            rx.try_recv().is_err(),
            "pause/stop/volume with nothing playing must not emit events"
        );
    }

    #[test]
    fn play_against_dead_endpoint_reports_an_error() {
        // Either the audio device is missing (PlayError) or the host does
        // not resolve (LoadError); both are error events with detail text.
        let (mut handle, rx) = open_handle("http://invalid.invalid.invalid/stream");

        handle.play();

        match wait_for_event(&rx, 15_000) {
            Some(PlayerEvent::LoadError(msg)) | Some(PlayerEvent::PlayError(msg)) => {
                assert!(!msg.is_empty());
            }
            other => panic!("Expected an error event, got {:?}", other),
        }
    }

    #[test]
    fn error_does_not_kill_the_thread() {
        let (mut handle, rx) = open_handle("http://invalid.invalid.invalid/stream");

        handle.play();
        assert!(
            matches!(
                wait_for_event(&rx, 15_000),
                Some(PlayerEvent::LoadError(_)) | Some(PlayerEvent::PlayError(_))
            ),
            "first play should fail"
        );

        // A second attempt must produce another error event rather than
        // silence from a dead thread
        handle.play();
        assert!(
            matches!(
                wait_for_event(&rx, 15_000),
                Some(PlayerEvent::LoadError(_)) | Some(PlayerEvent::PlayError(_))
            ),
            "playback thread should survive errors"
        );
    }
}
