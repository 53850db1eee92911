//! Tree identifier generation.
//!
//! Tree ids are 63-bit Snowflake values: roughly time-ordered, unique within
//! a process, and very unlikely to collide across processes. The storage
//! layer still checks every fresh id against committed and staged trees and
//! draws again on collision.
//!
//! # ID Structure
//!
//! ```text
//! | 1 bit: zero | 41 bits: timestamp (ms since epoch) | 12 bits: worker | 10 bits: sequence |
//! ```
//!
//! The timestamp counts milliseconds since 2024-01-01 00:00:00 UTC. The top
//! bit stays clear for roughly 69 years, which keeps every id a positive
//! `i64`.

use std::{
    sync::OnceLock,
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use snafu::Snafu;

use crate::types::TreeId;

/// 2024-01-01 00:00:00 UTC in Unix milliseconds.
const EPOCH_MS: u64 = 1_704_067_200_000;

const WORKER_BITS: u32 = 12;
const SEQUENCE_BITS: u32 = 10;
const TIMESTAMP_SHIFT: u32 = WORKER_BITS + SEQUENCE_BITS;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Clears the sign bit so ids fit a positive `i64`.
const TREE_ID_MASK: u64 = i64::MAX as u64;

/// Last issued (timestamp, sequence) pair.
struct Clock {
    last_ms: u64,
    sequence: u64,
}

impl Clock {
    /// Advances to `now_ms`, or returns `None` if this millisecond is used up.
    ///
    /// A clock that steps backwards keeps issuing from the last timestamp.
    fn tick(&mut self, now_ms: u64) -> Option<(u64, u64)> {
        if now_ms > self.last_ms {
            self.last_ms = now_ms;
            self.sequence = 0;
        } else if self.sequence < SEQUENCE_MASK {
            self.sequence += 1;
        } else {
            return None;
        }
        Some((self.last_ms, self.sequence))
    }
}

static CLOCK: Mutex<Clock> = Mutex::new(Clock { last_ms: 0, sequence: 0 });

static WORKER_ID: OnceLock<u64> = OnceLock::new();

/// Per-process worker id, drawn once from OS entropy mixed with the PID.
///
/// Mixing in the PID keeps two processes on one host apart even if their
/// RNG output collides.
fn worker_id() -> u64 {
    *WORKER_ID.get_or_init(|| {
        use rand::RngExt;
        let pid = u64::from(std::process::id());
        (rand::rng().random::<u64>() ^ pid) & WORKER_MASK
    })
}

/// Errors from tree id generation.
#[derive(Debug, Snafu)]
pub enum SnowflakeError {
    /// System clock is before the Unix epoch.
    #[snafu(display("system clock is before Unix epoch"))]
    SystemClock,
}

fn millis_since_epoch() -> Result<u64, SnowflakeError> {
    let unix =
        SystemTime::now().duration_since(UNIX_EPOCH).map_err(|_| SnowflakeError::SystemClock)?;
    Ok((unix.as_millis() as u64).saturating_sub(EPOCH_MS))
}

/// Generates a raw Snowflake value.
///
/// Values increase strictly within the process. When 1024 values have been
/// issued in one millisecond the caller sleeps until the next.
///
/// # Errors
///
/// Returns [`SnowflakeError::SystemClock`] if the system clock is before the
/// Unix epoch.
///
/// # Example
///
/// ```no_run
/// # use arbor_types::snowflake;
/// let first = snowflake::generate().unwrap();
/// let second = snowflake::generate().unwrap();
/// assert!(second > first);
/// ```
pub fn generate() -> Result<u64, SnowflakeError> {
    loop {
        let now_ms = millis_since_epoch()?;
        if let Some((ms, sequence)) = CLOCK.lock().tick(now_ms) {
            return Ok((ms << TIMESTAMP_SHIFT) | (worker_id() << SEQUENCE_BITS) | sequence);
        }
        thread::sleep(Duration::from_millis(1));
    }
}

/// Generates a fresh, positive [`TreeId`].
///
/// # Errors
///
/// Returns [`SnowflakeError::SystemClock`] if the system clock is before the
/// Unix epoch.
pub fn generate_tree_id() -> Result<TreeId, SnowflakeError> {
    let id = generate()? & TREE_ID_MASK;
    // Zero only when every component is zero, i.e. the clock sits at the epoch.
    Ok(TreeId::new(if id == 0 { 1 } else { id as i64 }))
}

/// Milliseconds since 2024-01-01 UTC encoded in `id`.
#[must_use]
pub fn extract_timestamp(id: u64) -> u64 {
    id >> TIMESTAMP_SHIFT
}

/// Per-millisecond sequence encoded in `id`.
#[must_use]
pub fn extract_sequence(id: u64) -> u64 {
    id & SEQUENCE_MASK
}
