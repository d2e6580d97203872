use chrono::{DateTime, Datelike, NaiveDateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, MutexGuard};

/// Fixed-width RFC 3339 with microseconds and a `Z` suffix. Lexical order of
/// these strings equals chronological order, which the SQL range queries rely on.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Accepts RFC 3339 with any offset, or a bare `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// A polling cursor at or before year 1 means "from the beginning".
pub fn normalize_cursor(since: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    since.filter(|ts| ts.year() > 1)
}

/// Hands out strictly increasing timestamps, so two messages appended by this
/// process never share a `sent_at`.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
    commit_gate: Mutex<()>,
}

/// A timestamp together with the exclusive right to write it. Holding the stamp
/// until the row is stored keeps commit order equal to timestamp order, so a
/// reader polling with `sent_at > cursor` never steps over a later commit.
#[derive(Debug)]
pub struct Stamp<'a> {
    pub at: DateTime<Utc>,
    _gate: MutexGuard<'a, ()>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_micros();
        let mut prev = self.last_micros.load(Ordering::Relaxed);

        loop {
            let next = wall.max(prev + 1);
            match self.last_micros.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now),
                Err(actual) => prev = actual,
            }
        }
    }

    /// Waits for any earlier stamp to be released, then hands out the next timestamp.
    pub async fn stamp(&self) -> Stamp<'_> {
        let gate = self.commit_gate.lock().await;
        Stamp {
            at: self.now(),
            _gate: gate,
        }
    }
}
