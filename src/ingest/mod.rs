// =============================================================================
// Realtime ingestion — vendor WebSocket feeds
// =============================================================================

pub mod news_feed;
pub mod ticker_lookup;
pub mod trade_feed;

pub use ticker_lookup::TickerLookup;

use std::time::Duration;

/// Vendor realtime WebSocket endpoint.  The token rides in the query string.
pub const FINNHUB_WS_URL: &str = "wss://ws.finnhub.io";

/// Minimum delay between subscribe frames, to stay clear of server-side
/// throttling.
pub const SUBSCRIBE_PACING: Duration = Duration::from_millis(500);

/// Delay before re-establishing a dropped WebSocket.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);
