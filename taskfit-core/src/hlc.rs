//! Hybrid logical clock.
//!
//! Every task version carries a [`Timestamp`] combining wall-clock
//! milliseconds, a logical counter, and the id of the node that issued it.
//! Timestamps encode as `<physical>_<counter>_<node_id>` with the numeric
//! fields zero-padded to fixed widths, so comparing two encoded strings
//! byte-wise gives the same answer as comparing the parsed timestamps.
//! Database indexes and range queries on the stored form depend on this.
//!
//! The widths are a compatibility contract: changing them reorders data
//! that is already stored.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Digits used for the physical-time field of the encoded form.
pub const PHYSICAL_DIGITS: usize = 15;
/// Digits used for the counter field of the encoded form.
pub const COUNTER_DIGITS: usize = 7;

/// Errors from parsing an encoded timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedTimestamp {
    #[error("expected 3 '_'-separated fields, got {0}")]
    FieldCount(usize),

    #[error("physical time must be {PHYSICAL_DIGITS} digits, got '{0}'")]
    PhysicalTime(String),

    #[error("counter must be {COUNTER_DIGITS} digits, got '{0}'")]
    Counter(String),

    #[error("node id must not be empty")]
    EmptyNodeId,
}

/// A hybrid logical clock timestamp.
///
/// Ordering is lexicographic on `(physical_time, counter, node_id)`.
/// Physical time dominates, the counter breaks physical-time ties, and the
/// node id breaks full ties. The node-id comparison is an arbitrary but
/// fixed tie-break between distinct nodes, not a causality claim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub physical_time: i64,
    pub counter: u64,
    pub node_id: String,
}

impl Timestamp {
    /// Builds a timestamp from its parts.
    ///
    /// Node ids must not contain `_` (the field separator) or the encoded
    /// form stops round-tripping.
    pub fn new(physical_time: i64, counter: u64, node_id: impl Into<String>) -> Self {
        Self {
            physical_time,
            counter,
            node_id: node_id.into(),
        }
    }

    /// Parses the canonical encoded form.
    pub fn parse(s: &str) -> Result<Self, MalformedTimestamp> {
        let parts: Vec<&str> = s.split('_').collect();
        if parts.len() != 3 {
            return Err(MalformedTimestamp::FieldCount(parts.len()));
        }

        let physical = parts[0];
        if physical.len() != PHYSICAL_DIGITS || !physical.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedTimestamp::PhysicalTime(physical.to_string()));
        }
        let physical_time: i64 = physical
            .parse()
            .map_err(|_| MalformedTimestamp::PhysicalTime(physical.to_string()))?;

        let counter_str = parts[1];
        if counter_str.len() != COUNTER_DIGITS || !counter_str.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(MalformedTimestamp::Counter(counter_str.to_string()));
        }
        let counter: u64 = counter_str
            .parse()
            .map_err(|_| MalformedTimestamp::Counter(counter_str.to_string()))?;

        if parts[2].is_empty() {
            return Err(MalformedTimestamp::EmptyNodeId);
        }

        Ok(Self {
            physical_time,
            counter,
            node_id: parts[2].to_string(),
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:0phys$}_{:0ctr$}_{}",
            self.physical_time,
            self.counter,
            self.node_id,
            phys = PHYSICAL_DIGITS,
            ctr = COUNTER_DIGITS,
        )
    }
}

impl FromStr for Timestamp {
    type Err = MalformedTimestamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Mutable clock state for one node.
///
/// A clock is owned by exactly one logical actor per installation. `tick`
/// and `receive` read-modify-write the counters, so sharing one across
/// threads requires a lock around the calls; the `&mut` receivers make the
/// exclusive-access requirement explicit.
#[derive(Debug, Clone)]
pub struct Clock {
    last_physical_time: i64,
    last_counter: u64,
    node_id: String,
}

impl Clock {
    /// Creates a fresh clock for a node that has never issued a timestamp.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            last_physical_time: 0,
            last_counter: 0,
            node_id: node_id.into(),
        }
    }

    /// Resumes a clock from the last timestamp this node issued.
    ///
    /// Seeding keeps timestamps monotonic across a restart even when the
    /// wall clock has not advanced past the pre-restart state.
    pub fn seeded(node_id: impl Into<String>, last_issued: &Timestamp) -> Self {
        Self {
            last_physical_time: last_issued.physical_time,
            last_counter: last_issued.counter,
            node_id: node_id.into(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Returns the clock's current state as a timestamp without advancing.
    pub fn last_issued(&self) -> Timestamp {
        Timestamp::new(self.last_physical_time, self.last_counter, self.node_id.clone())
    }

    /// Issues a new timestamp, strictly greater than every previous one
    /// from this clock.
    pub fn tick(&mut self) -> Timestamp {
        self.tick_at(Self::wall_now())
    }

    /// Folds a remote timestamp into local state on message arrival.
    ///
    /// The returned timestamp is greater than or equal to both the remote
    /// timestamp and everything this clock issued before.
    pub fn receive(&mut self, remote: &Timestamp) -> Timestamp {
        self.receive_at(remote, Self::wall_now())
    }

    fn wall_now() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn tick_at(&mut self, wall: i64) -> Timestamp {
        if wall > self.last_physical_time {
            self.last_physical_time = wall;
            self.last_counter = 0;
        } else {
            // Wall clock stalled or regressed; the counter keeps us moving.
            self.last_counter += 1;
        }
        self.last_issued()
    }

    fn receive_at(&mut self, remote: &Timestamp, wall: i64) -> Timestamp {
        let next = self.last_physical_time.max(remote.physical_time).max(wall);

        if next == self.last_physical_time && next == remote.physical_time {
            self.last_counter = self.last_counter.max(remote.counter) + 1;
        } else if next == self.last_physical_time {
            self.last_counter += 1;
        } else if next == remote.physical_time {
            self.last_counter = remote.counter + 1;
        } else {
            self.last_counter = 0;
        }

        self.last_physical_time = next;
        self.last_issued()
    }
}
