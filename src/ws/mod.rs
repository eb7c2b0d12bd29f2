pub mod actor;
pub mod handler;
pub mod protocol;

use tokio::sync::mpsc;

/// Sender half of a connection's outbound frame channel. The connection's
/// writer task owns the socket sink; every other writer (gateway acks,
/// router deliveries, sweep evictions) pushes frames through a clone of this.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Application close codes:
/// 4001 = connection overridden by a new holder of the same id
/// 4002 = connection expired (liveness sweep)
/// 4003 = admission rejected (error frame precedes the close)
pub const CLOSE_OVERRIDDEN: u16 = 4001;
pub const CLOSE_EXPIRED: u16 = 4002;
pub const CLOSE_REJECTED: u16 = 4003;
