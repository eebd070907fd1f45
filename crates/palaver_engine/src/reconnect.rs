use std::time::Duration;

use tokio::time::Instant;

/// Bounded retry budget after a transport error or drop.
pub const RECONNECT_MAX_ATTEMPTS: u32 = 10;

/// Fixed inter-attempt delay.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Per-attempt timeout, handshake included.
pub const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline for the next attempt, or `None` once the budget is spent.
/// `attempt` is the number of failures so far.
pub fn schedule_reconnect(attempt: u32) -> Option<(Instant, u64)> {
	if attempt >= RECONNECT_MAX_ATTEMPTS {
		return None;
	}
	let delay_ms = RECONNECT_DELAY.as_millis() as u64;
	Some((Instant::now() + RECONNECT_DELAY, delay_ms))
}
