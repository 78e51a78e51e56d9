//! Logical and wall clocks.
//!
//! Every mutation of the page stack is stamped with a `LogicalInstant` from a
//! shared `LogicalClock`. An operation that starts a network round-trip mints a
//! `Token` first; when the response arrives the token is compared against the
//! entry's stamp, and a response that started before the entry's last update
//! is dropped.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;

/// A reading of the logical clock. Totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogicalInstant(u64);

impl LogicalInstant {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogicalInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Monotonic counter; every `now()` returns a strictly greater instant.
#[derive(Debug, Default)]
pub struct LogicalClock {
    counter: AtomicU64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> LogicalInstant {
        LogicalInstant(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Mint a token for an operation that is about to start.
    pub fn token(&self) -> Token {
        Token::new(self.now())
    }
}

/// A logical instant captured before a round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    instant: LogicalInstant,
}

impl Token {
    pub fn new(instant: LogicalInstant) -> Self {
        Self { instant }
    }

    pub fn instant(self) -> LogicalInstant {
        self.instant
    }

    /// Whether a write carrying this token must be dropped because the target
    /// was updated after the token was minted. Ties are allowed.
    pub fn is_stale_against(self, updated: LogicalInstant) -> bool {
        self.instant < updated
    }
}

/// Source of wall-clock time in whole seconds since the Unix epoch.
pub trait WallClock: Send + Sync {
    fn now_secs(&self) -> u64;
}

/// Wall clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now_secs(&self) -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Settable wall clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualWallClock {
    secs: AtomicU64,
}

impl ManualWallClock {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl WallClock for ManualWallClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Logical and wall clocks shared by everything that stamps or checks entries.
pub struct Clock {
    logical: LogicalClock,
    wall: Arc<dyn WallClock>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Arc::new(SystemWallClock))
    }
}

impl Clock {
    pub fn new(wall: Arc<dyn WallClock>) -> Self {
        Self {
            logical: LogicalClock::new(),
            wall,
        }
    }

    pub fn now_logical(&self) -> LogicalInstant {
        self.logical.now()
    }

    pub fn now_wall_secs(&self) -> u64 {
        self.wall.now_secs()
    }

    pub fn token(&self) -> Token {
        self.logical.token()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("logical", &self.logical)
            .field("wall_secs", &self.wall.now_secs())
            .finish()
    }
}
