use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Wall clock source, injectable so expiry decisions can be tested at exact instants.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// `at + lifetime_seconds`, saturating at the maximum representable instant.
pub fn expires_after(at: DateTime<Utc>, lifetime_seconds: u64) -> DateTime<Utc> {
    i64::try_from(lifetime_seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|lifetime| at.checked_add_signed(lifetime))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn get_instant() -> Instant {
    Instant::now()
}
