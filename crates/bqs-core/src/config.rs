//! Centralized configuration constants.

use std::time::Duration;

/// Cache TTLs per cached data kind.
///
/// The values reflect observed change frequency: dataset membership churns
/// least, schemas are nearly static, row/size metadata changes most often.
pub struct CacheTtl;

impl CacheTtl {
    /// Table lists change infrequently.
    pub const TABLE_LIST: Duration = Duration::from_secs(5 * 60);
    /// Table metadata changes moderately.
    pub const METADATA: Duration = Duration::from_secs(15 * 60);
    /// Schemas change rarely.
    pub const SCHEMA: Duration = Duration::from_secs(30 * 60);
    /// Store-wide default when a `set` does not specify a TTL.
    pub const DEFAULT: Duration = Self::METADATA;
}

/// External tool invocation parameters.
pub struct BqConfig;

impl BqConfig {
    pub const PROGRAM: &'static str = "bq";
    pub const MAX_LIST_RESULTS: u32 = 1000;
}

/// Terminal browser dimensions and timing.
pub struct UiConfig;

impl UiConfig {
    pub const DEFAULT_TABLE_HEIGHT: u16 = 20;
    pub const MIN_TABLE_HEIGHT: u16 = 5;

    pub const CACHE_COLUMN_WIDTH: u16 = 5;
    pub const TABLE_COLUMN_WIDTH: u16 = 35;
    pub const TYPE_COLUMN_WIDTH: u16 = 8;
    pub const CREATED_COLUMN_WIDTH: u16 = 20;

    /// How long status messages stay visible.
    pub const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);
    /// Input poll interval for the reader thread.
    pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(200);
    /// Redraw tick interval for the event loop.
    pub const TICK_INTERVAL: Duration = Duration::from_millis(250);
}
