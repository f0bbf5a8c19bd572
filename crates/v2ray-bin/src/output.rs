//! Result rendering for `v2rayctl`: plain lines for people, JSON for scripts.

use serde::Serialize;
use serde_json::json;
use v2ray_client::{Counter, ProxyError, SysStats, Traffic};

/// Where and how command results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    /// Printer in JSON (`true`) or human mode.
    #[must_use]
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce() -> String) {
        if self.json {
            match serde_json::to_string_pretty(value) {
                Ok(text) => println!("{text}"),
                Err(e) => tracing::error!(error = %e, "failed to serialize output"),
            }
        } else {
            println!("{}", human());
        }
    }

    /// Uplink/downlink readings for one user or inbound.
    pub fn traffic(&self, subject: &str, uplink: Traffic, downlink: Traffic) {
        let value = json!({ "subject": subject, "uplink": uplink, "downlink": downlink });
        self.emit(&value, || {
            format!(
                "{subject}\n  uplink:   {}\n  downlink: {}",
                describe(uplink),
                describe(downlink)
            )
        });
    }

    /// Success of a mutating command.
    pub fn done(&self, action: &str, subject: &str) {
        let value = json!({ "ok": true, "action": action, "subject": subject });
        self.emit(&value, || format!("{action}: {subject}"));
    }

    /// Newly added user with its (possibly generated) id.
    pub fn user_added(&self, tag: &str, email: &str, id: &str) {
        let value = json!({ "ok": true, "tag": tag, "email": email, "id": id });
        self.emit(&value, || format!("added {email} to {tag} (id {id})"));
    }

    /// Counter listing.
    pub fn counters(&self, counters: &[Counter]) {
        self.emit(&counters, || {
            counters
                .iter()
                .map(|c| format!("{:>16}  {}", c.value, c.name))
                .collect::<Vec<_>>()
                .join("\n")
        });
    }

    /// Server runtime statistics.
    pub fn sys_stats(&self, stats: &SysStats) {
        self.emit(stats, || {
            format!(
                "uptime:       {}s\ngoroutines:   {}\nalloc:        {} bytes\nsys:          {} bytes\nlive objects: {}\ngc cycles:    {}",
                stats.uptime.as_secs(),
                stats.goroutines,
                stats.alloc_bytes,
                stats.sys_bytes,
                stats.live_objects,
                stats.gc_cycles
            )
        });
    }

    /// Classified failure, on stdout in JSON mode so scripts can branch on it.
    pub fn failure(&self, err: &ProxyError) -> bool {
        if !self.json {
            return false;
        }
        let value = json!({ "ok": false, "error": err.kind(), "message": err.to_string(), "details": err.details() });
        self.emit(&value, String::new);
        true
    }
}

fn describe(traffic: Traffic) -> String {
    match traffic {
        Traffic::Bytes(n) => format!("{n} bytes"),
        Traffic::Unavailable => "unavailable".to_string(),
    }
}
