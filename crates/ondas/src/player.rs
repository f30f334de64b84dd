//! Stream player component
//!
//! Owns one playback session, the metadata poller, and the retry timer,
//! and presents the simplified play/pause/volume/error state the UI layer
//! binds to. All state mutation happens on the caller's thread: backend
//! events are drained in order during `poll_at`, which also fires due
//! timers. There is no ordering guarantee between a user command and an
//! in-flight event from a previous action.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::audio::AudioBackend;
use crate::config::station::STREAM_URL;
use crate::config::timeouts::RETRY_DELAY_SECS;
use crate::config::volume::{DEFAULT_PERCENT, MAX_PERCENT};
use crate::metadata::MetadataPoller;
use crate::session::PlaybackSession;
use crate::state::{transition, Effect, PlaybackPhase, PlayerEvent, PlayerSnapshot};

const EVENT_CHANNEL_BOUND: usize = 64;

/// The player component around one stream
pub struct StreamPlayer {
    backend: Box<dyn AudioBackend>,
    session: Option<PlaybackSession>,
    poller: MetadataPoller,
    snapshot: PlayerSnapshot,
    event_tx: Sender<PlayerEvent>,
    event_rx: Receiver<PlayerEvent>,
    /// When the pending reconnect fires, if one is scheduled
    retry_at: Option<Instant>,
}

impl StreamPlayer {
    /// Create a player with the default volume. No handle exists until
    /// [`initialize`](Self::initialize) is called.
    pub fn new(backend: Box<dyn AudioBackend>) -> Self {
        Self::with_volume(backend, DEFAULT_PERCENT)
    }

    /// Create a player starting at the given volume (0-100, clamped)
    pub fn with_volume(backend: Box<dyn AudioBackend>, volume: u8) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_CHANNEL_BOUND);
        let snapshot = PlayerSnapshot {
            volume: volume.min(MAX_PERCENT),
            ..PlayerSnapshot::default()
        };
        Self {
            backend,
            session: None,
            poller: MetadataPoller::new(),
            snapshot,
            event_tx,
            event_rx,
            retry_at: None,
        }
    }

    /// Current UI state
    pub fn snapshot(&self) -> &PlayerSnapshot {
        &self.snapshot
    }

    /// Whether a live playback handle exists
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Whether a delayed reconnect is pending
    pub fn retry_pending(&self) -> bool {
        self.retry_at.is_some()
    }

    /// Whether the metadata poller is running
    pub fn poller_active(&self) -> bool {
        self.poller.is_active()
    }

    /// Construct a new playback handle bound to the fixed stream URL and
    /// the current volume, releasing any prior handle first. Always leaves
    /// exactly one live handle or none.
    pub fn initialize(&mut self) {
        self.session = None;

        match PlaybackSession::open(
            self.backend.as_ref(),
            STREAM_URL,
            self.snapshot.volume,
            self.event_tx.clone(),
        ) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                // Route the failure through the normal error path so the
                // retry machinery engages on the next poll
                eprintln!("Failed to initialize playback: {e}");
                let _ = self.event_tx.send(PlayerEvent::LoadError(e.to_string()));
            }
        }
    }

    /// Toggle between play and pause. No-op if no handle exists.
    pub fn toggle_play(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if self.snapshot.is_playing {
            session.pause();
        } else {
            self.snapshot.is_loading = true;
            self.snapshot.error_message = None;
            self.snapshot.phase = PlaybackPhase::Loading;
            session.play();
        }
    }

    /// Change the desired volume (0-100, clamped). The handle is only
    /// touched when one exists; without a handle this updates the stored
    /// level and nothing else.
    pub fn change_volume(&mut self, volume: u8) {
        let volume = volume.min(MAX_PERCENT);
        self.snapshot.volume = volume;
        if let Some(session) = self.session.as_mut() {
            session.set_volume_percent(volume);
        }
    }

    /// Tear down the current handle and schedule a reconnect after the
    /// fixed retry delay. The sole recovery mechanism; invoked
    /// automatically from the error path, with no cap and no backoff.
    pub fn retry_connection(&mut self, now: Instant) {
        self.cleanup();
        self.retry_at = Some(now + Duration::from_secs(RETRY_DELAY_SECS));
    }

    /// Stop and release the handle (if any) and cancel the metadata
    /// poller. Idempotent; called on teardown and at the start of every
    /// retry.
    pub fn cleanup(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        self.poller.stop();
    }

    /// Drain pending backend events and fire due timers
    pub fn poll(&mut self) {
        self.poll_at(Instant::now());
    }

    /// Advance the component to `now`: apply queued events in order, fire
    /// the retry timer, and refresh the metadata label.
    pub fn poll_at(&mut self, now: Instant) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(event, now);
        }

        if let Some(at) = self.retry_at {
            if now >= at {
                self.retry_at = None;
                self.initialize();
                if !self.snapshot.is_playing {
                    self.toggle_play();
                }
            }
        }

        if let Some(label) = self.poller.poll(now) {
            self.snapshot.current_song = label.to_string();
        }
    }

    fn apply_event(&mut self, event: PlayerEvent, now: Instant) {
        if let PlayerEvent::LoadError(detail) | PlayerEvent::PlayError(detail) = &event {
            eprintln!("Stream error: {detail}");
        }

        for effect in transition(&mut self.snapshot, &event) {
            match effect {
                Effect::StartPoller => {
                    let label = self.poller.start(now);
                    self.snapshot.current_song = label.to_string();
                }
                Effect::StopPoller => self.poller.stop(),
                Effect::ScheduleRetry => self.retry_connection(now),
            }
        }
    }
}

impl Drop for StreamPlayer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{CodecInfo, PlaybackHandle};
    use crate::config::metadata::{FETCHING_LABEL, IDLE_LABEL, NOW_PLAYING_PLACEHOLDER};
    use crate::error::{PlayerError, Result};
    use crate::state::{PlaybackPhase, STREAM_ERROR_MESSAGE};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play(u32),
        Pause(u32),
        Stop(u32),
        SetVolume(u32, f32),
    }

    #[derive(Default)]
    struct BackendProbe {
        opens: u32,
        releases: u32,
        open_volumes: Vec<f32>,
        calls: Vec<Call>,
        fail_open: bool,
        events: Option<Sender<PlayerEvent>>,
    }

    struct FakeHandle {
        id: u32,
        probe: Arc<Mutex<BackendProbe>>,
    }

    impl PlaybackHandle for FakeHandle {
        fn play(&mut self) {
            self.probe.lock().unwrap().calls.push(Call::Play(self.id));
        }
        fn pause(&mut self) {
            self.probe.lock().unwrap().calls.push(Call::Pause(self.id));
        }
        fn stop(&mut self) {
            self.probe.lock().unwrap().calls.push(Call::Stop(self.id));
        }
        fn set_volume(&mut self, volume: f32) {
            self.probe
                .lock()
                .unwrap()
                .calls
                .push(Call::SetVolume(self.id, volume));
        }
    }

    impl Drop for FakeHandle {
        fn drop(&mut self) {
            self.probe.lock().unwrap().releases += 1;
        }
    }

    struct FakeBackend {
        probe: Arc<Mutex<BackendProbe>>,
    }

    impl AudioBackend for FakeBackend {
        fn open(
            &self,
            _url: &str,
            volume: f32,
            events: Sender<PlayerEvent>,
        ) -> Result<Box<dyn PlaybackHandle>> {
            let mut probe = self.probe.lock().unwrap();
            if probe.fail_open {
                return Err(PlayerError::Audio("simulated open failure".to_string()));
            }
            probe.opens += 1;
            probe.open_volumes.push(volume);
            probe.events = Some(events);
            let id = probe.opens;
            Ok(Box::new(FakeHandle {
                id,
                probe: self.probe.clone(),
            }))
        }
    }

    fn player() -> (StreamPlayer, Arc<Mutex<BackendProbe>>) {
        let probe = Arc::new(Mutex::new(BackendProbe::default()));
        let player = StreamPlayer::new(Box::new(FakeBackend {
            probe: probe.clone(),
        }));
        (player, probe)
    }

    fn send(probe: &Arc<Mutex<BackendProbe>>, event: PlayerEvent) {
        let tx = probe.lock().unwrap().events.clone().expect("handle opened");
        tx.send(event).unwrap();
    }

    fn codec() -> CodecInfo {
        CodecInfo {
            codec_name: "MP3".to_string(),
            channels: 2,
            sample_rate: 44100,
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    // --- Initialization ---

    #[test]
    fn initialize_creates_exactly_one_handle() {
        let (mut player, probe) = player();
        player.initialize();

        let p = probe.lock().unwrap();
        assert_eq!(p.opens, 1);
        assert_eq!(p.releases, 0);
        assert!(!player.snapshot().is_playing);
        assert!(player.has_session());
    }

    #[test]
    fn initialize_passes_normalized_volume() {
        let probe = Arc::new(Mutex::new(BackendProbe::default()));
        let mut player = StreamPlayer::with_volume(
            Box::new(FakeBackend {
                probe: probe.clone(),
            }),
            70,
        );
        player.initialize();

        assert_eq!(probe.lock().unwrap().open_volumes, vec![0.7]);
    }

    #[test]
    fn reinitialize_releases_prior_handle() {
        let (mut player, probe) = player();
        player.initialize();
        player.initialize();

        let p = probe.lock().unwrap();
        assert_eq!(p.opens, 2);
        assert_eq!(p.releases, 1);
    }

    #[test]
    fn open_failure_routes_into_error_path() {
        let (mut player, probe) = player();
        probe.lock().unwrap().fail_open = true;

        let t0 = Instant::now();
        player.initialize();
        assert!(!player.has_session());

        player.poll_at(t0);
        assert_eq!(
            player.snapshot().error_message.as_deref(),
            Some(STREAM_ERROR_MESSAGE)
        );
        assert!(player.retry_pending());
    }

    // --- Toggle play ---

    #[test]
    fn toggle_without_handle_is_a_noop() {
        let (mut player, probe) = player();
        player.toggle_play();

        assert!(probe.lock().unwrap().calls.is_empty());
        assert!(!player.snapshot().is_loading);
    }

    #[test]
    fn toggle_from_stopped_requests_playback() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        assert!(player.snapshot().is_loading);
        assert_eq!(player.snapshot().phase, PlaybackPhase::Loading);
        assert!(player.snapshot().error_message.is_none());
        assert_eq!(probe.lock().unwrap().calls, vec![Call::Play(1)]);
    }

    #[test]
    fn loading_persists_until_an_event_arrives() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        player.poll_at(Instant::now());
        assert!(player.snapshot().is_loading);

        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(Instant::now());
        assert!(!player.snapshot().is_loading);
    }

    #[test]
    fn play_started_event_enters_playing_with_poller() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(Instant::now());

        let s = player.snapshot();
        assert!(s.is_playing);
        assert!(!s.is_loading);
        assert!(s.error_message.is_none());
        assert_eq!(s.phase, PlaybackPhase::Playing);
        assert_eq!(s.current_song, FETCHING_LABEL);
        assert!(player.poller_active());
    }

    #[test]
    fn toggle_while_playing_requests_pause() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();
        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(Instant::now());

        player.toggle_play();
        assert!(probe.lock().unwrap().calls.contains(&Call::Pause(1)));

        send(&probe, PlayerEvent::Paused);
        player.poll_at(Instant::now());
        assert_eq!(player.snapshot().phase, PlaybackPhase::Paused);
        assert!(!player.snapshot().is_playing);
        assert!(!player.poller_active());
    }

    // --- Volume ---

    #[test]
    fn volume_change_propagates_normalized() {
        let (mut player, probe) = player();
        player.initialize();
        player.change_volume(40);

        assert_eq!(player.snapshot().volume, 40);
        assert!(probe
            .lock()
            .unwrap()
            .calls
            .contains(&Call::SetVolume(1, 0.4)));
    }

    #[test]
    fn volume_change_without_handle_touches_no_backend() {
        let (mut player, probe) = player();
        player.change_volume(55);

        assert_eq!(player.snapshot().volume, 55);
        assert!(probe.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn volume_change_clamps_out_of_range() {
        let (mut player, probe) = player();
        player.initialize();
        player.change_volume(250);

        assert_eq!(player.snapshot().volume, 100);
        assert!(probe
            .lock()
            .unwrap()
            .calls
            .contains(&Call::SetVolume(1, 1.0)));
    }

    // --- Errors and retry ---

    #[test]
    fn load_error_sets_error_state_and_schedules_retry() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let t0 = Instant::now();
        send(&probe, PlayerEvent::LoadError("HTTP 404".to_string()));
        player.poll_at(t0);

        let s = player.snapshot();
        assert!(!s.is_playing);
        assert!(!s.is_loading);
        assert_eq!(s.error_message.as_deref(), Some(STREAM_ERROR_MESSAGE));
        assert!(player.retry_pending());
        assert!(!player.has_session(), "error retry tears the handle down");
        assert!(!player.poller_active());
    }

    #[test]
    fn retry_fires_no_earlier_than_the_delay() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let t0 = Instant::now();
        send(&probe, PlayerEvent::LoadError("boom".to_string()));
        player.poll_at(t0);
        assert_eq!(probe.lock().unwrap().opens, 1);

        player.poll_at(t0 + Duration::from_millis(4_900));
        assert_eq!(probe.lock().unwrap().opens, 1, "retry must wait 5 seconds");

        player.poll_at(t0 + secs(5));
        let p = probe.lock().unwrap();
        assert_eq!(p.opens, 2, "retry constructs a fresh handle");
        assert!(
            p.calls.contains(&Call::Play(2)),
            "retry issues a play attempt when not already playing"
        );
    }

    #[test]
    fn retry_loops_without_a_cap() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let mut now = Instant::now();
        for round in 1..=4u32 {
            send(&probe, PlayerEvent::LoadError(format!("round {round}")));
            player.poll_at(now);
            now += secs(5);
            player.poll_at(now);
            assert_eq!(probe.lock().unwrap().opens, round + 1);
        }
    }

    #[test]
    fn play_error_takes_the_same_retry_path() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();
        send(&probe, PlayerEvent::PlayStarted(codec()));
        let t0 = Instant::now();
        player.poll_at(t0);

        send(&probe, PlayerEvent::PlayError("stream died".to_string()));
        player.poll_at(t0 + secs(1));

        assert_eq!(
            player.snapshot().error_message.as_deref(),
            Some(STREAM_ERROR_MESSAGE)
        );
        assert!(!player.poller_active());
        assert!(player.retry_pending());

        player.poll_at(t0 + secs(6));
        assert_eq!(probe.lock().unwrap().opens, 2);
    }

    #[test]
    fn manual_retry_tears_down_and_reconnects() {
        let (mut player, probe) = player();
        player.initialize();

        let t0 = Instant::now();
        player.retry_connection(t0);
        assert!(!player.has_session());
        assert_eq!(probe.lock().unwrap().releases, 1);

        player.poll_at(t0 + secs(5));
        assert_eq!(probe.lock().unwrap().opens, 2);
    }

    // --- Cleanup ---

    #[test]
    fn cleanup_releases_handle_and_poller() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();
        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(Instant::now());

        player.cleanup();

        let p = probe.lock().unwrap();
        assert!(p.calls.contains(&Call::Stop(1)));
        assert_eq!(p.releases, 1);
        drop(p);
        assert!(!player.has_session());
        assert!(!player.poller_active());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (mut player, probe) = player();
        player.initialize();

        player.cleanup();
        player.cleanup();
        player.cleanup();

        assert_eq!(probe.lock().unwrap().releases, 1);
        assert!(!player.has_session());
    }

    #[test]
    fn cleanup_without_initialize_is_safe() {
        let (mut player, _probe) = player();
        player.cleanup();
        assert!(!player.has_session());
    }

    #[test]
    fn drop_runs_cleanup() {
        let (mut player, probe) = player();
        player.initialize();
        drop(player);
        assert_eq!(probe.lock().unwrap().releases, 1);
    }

    // --- Metadata label ---

    #[test]
    fn label_starts_idle() {
        let (player, _probe) = player();
        assert_eq!(player.snapshot().current_song, IDLE_LABEL);
    }

    #[test]
    fn label_follows_the_poller_cadence() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let t0 = Instant::now();
        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(t0);
        assert_eq!(player.snapshot().current_song, FETCHING_LABEL);

        player.poll_at(t0 + secs(1));
        assert_eq!(player.snapshot().current_song, NOW_PLAYING_PLACEHOLDER);

        player.poll_at(t0 + secs(10));
        assert_eq!(player.snapshot().current_song, FETCHING_LABEL);

        player.poll_at(t0 + secs(11));
        assert_eq!(player.snapshot().current_song, NOW_PLAYING_PLACEHOLDER);
    }

    #[test]
    fn label_freezes_when_paused() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let t0 = Instant::now();
        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(t0);
        player.poll_at(t0 + secs(1));

        send(&probe, PlayerEvent::Paused);
        player.poll_at(t0 + secs(2));
        player.poll_at(t0 + secs(30));
        assert_eq!(player.snapshot().current_song, NOW_PLAYING_PLACEHOLDER);
    }

    // --- Spec scenarios ---

    #[test]
    fn scenario_start_from_stopped() {
        let probe = Arc::new(Mutex::new(BackendProbe::default()));
        let mut player = StreamPlayer::with_volume(
            Box::new(FakeBackend {
                probe: probe.clone(),
            }),
            70,
        );
        player.initialize();

        player.toggle_play();
        assert!(player.snapshot().is_loading);

        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(Instant::now());

        let s = player.snapshot();
        assert!(s.is_playing);
        assert!(!s.is_loading);
        assert!(s.error_message.is_none());
        assert!(player.poller_active());
    }

    #[test]
    fn scenario_load_error_then_recovery() {
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let t0 = Instant::now();
        send(&probe, PlayerEvent::LoadError("connect refused".to_string()));
        player.poll_at(t0);

        assert!(player.snapshot().error_message.is_some());
        assert!(!player.snapshot().is_playing);

        player.poll_at(t0 + secs(5));
        let p = probe.lock().unwrap();
        assert_eq!(p.opens, 2, "a fresh handle is created");
        assert!(p.calls.contains(&Call::Play(2)), "a play attempt is issued");
        drop(p);

        send(&probe, PlayerEvent::PlayStarted(codec()));
        player.poll_at(t0 + secs(6));
        assert!(player.snapshot().is_playing);
        assert!(player.snapshot().error_message.is_none());
    }

    #[test]
    fn stale_stopped_event_after_error_keeps_error_visible() {
        // The torn-down handle may still deliver its Stopped event while a
        // retry is pending; the error message must survive it.
        let (mut player, probe) = player();
        player.initialize();
        player.toggle_play();

        let t0 = Instant::now();
        send(&probe, PlayerEvent::LoadError("boom".to_string()));
        player.poll_at(t0);

        send(&probe, PlayerEvent::Stopped);
        player.poll_at(t0 + secs(1));

        assert!(player.snapshot().error_message.is_some());
        assert!(player.retry_pending());
    }
}
