//! Per-poller bookkeeping.
//!
//! Each poller owns one [`PollerStats`] and records the outcome of every
//! cycle into it. The HTTP layer reads the same instance for `/health` and
//! for the exporter's own `sensor_exporter_*` metrics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{self, Write as FmtWrite};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// What one poll cycle did with the readings it saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Readings written to the sink.
    pub published: usize,
    /// Readings dropped because of an error (bad record, unreadable feature).
    pub skipped: usize,
    /// Features deliberately not exported (unclassified name).
    pub ignored: usize,
}

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = RunningStat {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Coarse poller state derived from the recorded cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    /// No cycle has completed yet.
    Starting,
    /// The last cycle succeeded.
    Up,
    /// The last cycle failed; the poller keeps retrying.
    Failing,
    /// The poller could not start and will not run.
    Dead,
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PollerState::Starting => "starting",
            PollerState::Up => "up",
            PollerState::Failing => "failing",
            PollerState::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Point-in-time copy of a poller's statistics.
#[derive(Debug, Clone, Serialize)]
pub struct PollerSnapshot {
    pub name: String,
    pub state: PollerState,
    pub cycles: u64,
    pub successes: u64,
    pub failures: u64,
    pub published_last: u64,
    pub skipped_total: u64,
    pub duration_last_seconds: f64,
    pub duration_avg_seconds: f64,
    pub duration_max_seconds: f64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

/// Thread-safe statistics for one poller.
pub struct PollerStats {
    name: &'static str,
    cycles: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    published_last: AtomicU64,
    skipped_total: AtomicU64,
    last_cycle_ok: AtomicBool,
    duration: Mutex<RunningStat>,
    last_error: Mutex<Option<String>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    fatal: Mutex<Option<String>>,
}

impl PollerStats {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cycles: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            published_last: AtomicU64::new(0),
            skipped_total: AtomicU64::new(0),
            last_cycle_ok: AtomicBool::new(false),
            duration: Mutex::new(RunningStat::default()),
            last_error: Mutex::new(None),
            last_success: Mutex::new(None),
            fatal: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Records a completed cycle. Per-item problems inside it do not make it
    /// a failure.
    pub fn record_success(&self, elapsed: Duration, summary: &CycleSummary) {
        self.record_cycle(elapsed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.published_last
            .store(summary.published as u64, Ordering::Relaxed);
        self.skipped_total
            .fetch_add(summary.skipped as u64, Ordering::Relaxed);
        self.last_cycle_ok.store(true, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_success.lock() {
            *guard = Some(Utc::now());
        }
    }

    /// Records a cycle that published nothing.
    pub fn record_failure(&self, elapsed: Duration, error: &dyn fmt::Display) {
        self.record_cycle(elapsed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.published_last.store(0, Ordering::Relaxed);
        self.last_cycle_ok.store(false, Ordering::Relaxed);
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(error.to_string());
        }
    }

    /// Marks the poller as permanently stopped.
    pub fn mark_fatal(&self, error: &dyn fmt::Display) {
        let message = error.to_string();
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(message.clone());
        }
        if let Ok(mut guard) = self.fatal.lock() {
            *guard = Some(message);
        }
    }

    fn record_cycle(&self, elapsed: Duration) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut s) = self.duration.lock() {
            s.add(elapsed.as_secs_f64());
        }
    }

    pub fn state(&self) -> PollerState {
        let dead = self.fatal.lock().map(|g| g.is_some()).unwrap_or(false);
        if dead {
            PollerState::Dead
        } else if self.cycles.load(Ordering::Relaxed) == 0 {
            PollerState::Starting
        } else if self.last_cycle_ok.load(Ordering::Relaxed) {
            PollerState::Up
        } else {
            PollerState::Failing
        }
    }

    pub fn snapshot(&self) -> PollerSnapshot {
        let duration = self.duration.lock().map(|s| *s).unwrap_or_default();
        PollerSnapshot {
            name: self.name.to_string(),
            state: self.state(),
            cycles: self.cycles.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            published_last: self.published_last.load(Ordering::Relaxed),
            skipped_total: self.skipped_total.load(Ordering::Relaxed),
            duration_last_seconds: duration.last,
            duration_avg_seconds: duration.avg(),
            duration_max_seconds: duration.max,
            last_error: self.last_error.lock().ok().and_then(|g| g.clone()),
            last_success: self.last_success.lock().ok().and_then(|g| *g),
        }
    }
}

/// Renders a plain-text status table for a set of pollers.
pub fn render_table(snapshots: &[PollerSnapshot]) -> String {
    let left_col = 24usize;
    let col_w = 16usize;

    let mut out = String::new();
    writeln!(out, "POLLERS").ok();
    writeln!(out, "=======").ok();
    writeln!(out).ok();

    write!(out, "{:left$}", "", left = left_col).ok();
    for snap in snapshots {
        write!(out, " | {:^col$}", snap.name, col = col_w).ok();
    }
    writeln!(out).ok();
    writeln!(
        out,
        "{}",
        "-".repeat(left_col + snapshots.len() * (col_w + 3))
    )
    .ok();

    let rows: [(&str, fn(&PollerSnapshot) -> String); 9] = [
        ("state", |s| s.state.to_string()),
        ("cycles", |s| s.cycles.to_string()),
        ("successes", |s| s.successes.to_string()),
        ("failures", |s| s.failures.to_string()),
        ("published (last)", |s| s.published_last.to_string()),
        ("skipped (total)", |s| s.skipped_total.to_string()),
        ("duration last (s)", |s| format!("{:.3}", s.duration_last_seconds)),
        ("duration avg (s)", |s| format!("{:.3}", s.duration_avg_seconds)),
        ("last success", |s| {
            s.last_success
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "N/A".to_string())
        }),
    ];

    for (label, value) in rows {
        write!(out, "{:left$}", label, left = left_col).ok();
        for snap in snapshots {
            write!(out, " | {:^col$}", value(snap), col = col_w).ok();
        }
        writeln!(out).ok();
    }

    let errors: Vec<&PollerSnapshot> = snapshots
        .iter()
        .filter(|s| s.last_error.is_some() && s.state != PollerState::Up)
        .collect();
    if !errors.is_empty() {
        writeln!(out).ok();
        writeln!(out, "LAST ERRORS").ok();
        writeln!(out, "-----------").ok();
        for snap in errors {
            if let Some(err) = &snap.last_error {
                writeln!(out, "{}: {}", snap.name, err).ok();
            }
        }
    }
    out
}
