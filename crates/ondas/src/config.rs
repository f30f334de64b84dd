//! Configuration constants for the ondas engine

/// Station configuration
pub mod station {
    /// Display name of the station
    pub const NAME: &str = "SS Radio";

    /// The one stream this player knows how to play
    pub const STREAM_URL: &str = "https://s2.free-shoutcast.com/stream/18088";
}

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("Ondas/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Read timeout in seconds
    pub const READ_TIMEOUT_SECS: u64 = 30;
}

/// Timeout configuration
pub mod timeouts {
    /// Delay before a new connection attempt after a playback error, in seconds
    pub const RETRY_DELAY_SECS: u64 = 5;

    /// Maximum time to wait for the format probe in seconds
    pub const PROBE_TIMEOUT_SECS: u64 = 10;
}

/// Metadata poller configuration
pub mod metadata {
    /// Interval between "now playing" refresh cycles, in seconds
    pub const REFRESH_INTERVAL_SECS: u64 = 10;

    /// Delay between the fetching label and the resolved label, in seconds
    pub const RESOLVE_DELAY_SECS: u64 = 1;

    /// Label shown before playback has ever started
    pub const IDLE_LABEL: &str = "Waiting for connection...";

    /// Label shown at the start of each refresh cycle
    pub const FETCHING_LABEL: &str = "Fetching track info...";

    /// Placeholder track label. The station exposes no metadata endpoint,
    /// so the poller resolves every cycle to this fixed string.
    pub const NOW_PLAYING_PLACEHOLDER: &str = "Current Song - Artist";
}

/// Volume configuration (percent scale used by the UI contract)
pub mod volume {
    /// Default volume level
    pub const DEFAULT_PERCENT: u8 = 70;

    /// Maximum volume level
    pub const MAX_PERCENT: u8 = 100;
}

/// Stream buffer configuration (producer-consumer chunk channel)
pub mod buffer {
    /// Chunk size for producer reads from the network response (bytes)
    pub const CHUNK_SIZE: usize = 8 * 1024;

    /// Maximum chunks held in the channel before the producer blocks
    pub const CHANNEL_BOUND: usize = 256;

    /// Interval at which the consumer re-checks for data while waiting (milliseconds)
    pub const CONSUMER_WAIT_TIMEOUT_MS: u64 = 500;
}
