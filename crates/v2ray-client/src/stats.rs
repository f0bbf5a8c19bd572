//! Traffic counter naming and best-effort readings.
//!
//! V2Ray names every counter with a `>>>`-delimited path, e.g.
//! `user>>>love@v2ray.com>>>traffic>>>uplink`. The delimiter is part of the
//! wire contract.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use v2ray_proto::stats;

const DELIMITER: &str = ">>>";

/// Traffic direction, as seen from the proxy's client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Bytes sent by the client.
    Uplink,
    /// Bytes received by the client.
    Downlink,
}

impl Direction {
    /// Wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uplink => "uplink",
            Self::Downlink => "downlink",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified counter name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterName(String);

impl CounterName {
    /// `user>>>{email}>>>traffic>>>{direction}`
    #[must_use]
    pub fn user(email: &str, direction: Direction) -> Self {
        Self::traffic("user", email, direction)
    }

    /// `inbound>>>{tag}>>>traffic>>>{direction}`
    #[must_use]
    pub fn inbound(tag: &str, direction: Direction) -> Self {
        Self::traffic("inbound", tag, direction)
    }

    /// `outbound>>>{tag}>>>traffic>>>{direction}`
    #[must_use]
    pub fn outbound(tag: &str, direction: Direction) -> Self {
        Self::traffic("outbound", tag, direction)
    }

    fn traffic(scope: &str, id: &str, direction: Direction) -> Self {
        Self([scope, id, "traffic", direction.as_str()].join(DELIMITER))
    }

    /// The name as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a best-effort traffic read.
///
/// The server answers "no such counter" with the same generic failure as any
/// other fault, so reads never error: every failure is `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "bytes", rename_all = "lowercase")]
pub enum Traffic {
    /// Counter value in bytes.
    Bytes(i64),
    /// Counter missing or the server unreachable.
    Unavailable,
}

impl Traffic {
    /// The byte count, if one was read.
    #[must_use]
    pub fn bytes(self) -> Option<i64> {
        match self {
            Self::Bytes(n) => Some(n),
            Self::Unavailable => None,
        }
    }

    /// Returns `true` if a value was read.
    #[must_use]
    pub fn is_available(self) -> bool {
        matches!(self, Self::Bytes(_))
    }
}

/// One counter returned by a pattern query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Full counter name.
    pub name: String,
    /// Value in bytes.
    pub value: i64,
}

impl From<stats::Stat> for Counter {
    fn from(stat: stats::Stat) -> Self {
        Self {
            name: stat.name,
            value: stat.value,
        }
    }
}

impl Counter {
    /// Split a traffic counter name into `(scope, id, direction)`.
    ///
    /// Returns `None` for counters outside the `*>>>*>>>traffic>>>*` scheme.
    #[must_use]
    pub fn traffic_parts(&self) -> Option<(&str, &str, Direction)> {
        let mut parts = self.name.split(DELIMITER);
        let scope = parts.next()?;
        let id = parts.next()?;
        if parts.next()? != "traffic" {
            return None;
        }
        let direction = match parts.next()? {
            "uplink" => Direction::Uplink,
            "downlink" => Direction::Downlink,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some((scope, id, direction))
    }
}

/// Runtime statistics of the server process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysStats {
    /// Live goroutines.
    pub goroutines: u32,
    /// Completed GC cycles.
    pub gc_cycles: u32,
    /// Bytes of allocated heap objects.
    pub alloc_bytes: u64,
    /// Cumulative bytes allocated.
    pub total_alloc_bytes: u64,
    /// Bytes obtained from the OS.
    pub sys_bytes: u64,
    /// Cumulative heap allocations.
    pub mallocs: u64,
    /// Cumulative heap frees.
    pub frees: u64,
    /// Live heap objects.
    pub live_objects: u64,
    /// Cumulative GC pause.
    #[serde(with = "duration_ns")]
    pub gc_pause_total: Duration,
    /// Server uptime.
    #[serde(with = "duration_secs")]
    pub uptime: Duration,
}

impl From<stats::SysStatsResponse> for SysStats {
    fn from(resp: stats::SysStatsResponse) -> Self {
        Self {
            goroutines: resp.num_goroutine,
            gc_cycles: resp.num_gc,
            alloc_bytes: resp.alloc,
            total_alloc_bytes: resp.total_alloc,
            sys_bytes: resp.sys,
            mallocs: resp.mallocs,
            frees: resp.frees,
            live_objects: resp.live_objects,
            gc_pause_total: Duration::from_nanos(resp.pause_total_ns),
            uptime: Duration::from_secs(u64::from(resp.uptime)),
        }
    }
}

mod duration_ns {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_nanos)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
