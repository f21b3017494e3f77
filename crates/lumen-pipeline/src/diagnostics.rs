//! Pipeline diagnostics: per-stage timing and skip flags.
//!
//! Collected by [`run_with_diagnostics`](crate::pipeline::run_with_diagnostics)
//! for tuning and for the CLI's benchmark output. Time comes from a
//! caller-supplied [`Clock`] so the library never reads a wall clock
//! itself; [`NullClock`] reports every duration as zero.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::Stage;
use crate::types::Dimensions;

/// Source of timestamps for diagnostics.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A clock that never advances. Used when timings are not wanted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl Clock for NullClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _: &()) -> Duration {
        Duration::ZERO
    }
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics for one stage of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Which stage.
    pub stage: Stage,
    /// Wall-clock duration, including any color-space conversion the
    /// stage triggered (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// The stage had nothing to do and returned early.
    pub skipped: bool,
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Size of the raster that was adjusted.
    pub dimensions: Dimensions,
    /// One entry per stage, in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// RGB/HSV conversions performed, in either direction.
    pub color_conversions: u32,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl PipelineDiagnostics {
    /// Diagnostics for `stage`, if it was recorded.
    #[must_use]
    pub fn stage(&self, stage: Stage) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Stages that did work, in execution order.
    pub fn applied_stages(&self) -> impl Iterator<Item = Stage> + '_ {
        self.stages.iter().filter(|s| !s.skipped).map(|s| s.stage)
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Adjustment Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.dimensions.width,
            self.dimensions.height,
            self.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(format!("Color conversions: {}", self.color_conversions));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Status"
        ));
        lines.push("-".repeat(60));

        let total_ms = duration_ms(self.total_duration);
        for diag in &self.stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let status = if diag.skipped { "skipped" } else { "applied" };
            let name = diag.stage.to_string();
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {status}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
