//! Common utilities shared across modules.

use chrono::Utc;

/// One family's measured token-reduction percentiles from a benchmark run.
/// The run itself is out of scope here (benchmark tooling lives outside
/// this crate); this is just the aggregate shape the gate evaluates.
#[derive(Debug, Clone)]
pub struct BenchmarkFamily {
    pub family: String,
    pub p25: f64,
    pub p50: f64,
    pub min: f64,
}

#[derive(Debug, Clone)]
pub struct BenchmarkAggregate {
    pub overall_min_token_reduction_pct: f64,
    pub families: Vec<BenchmarkFamily>,
}

#[derive(Debug, Clone, Copy)]
pub struct GateThresholds {
    pub p50: f64,
    pub p25: f64,
    pub floor: f64,
}

/// Pass/fail evaluation of a benchmark aggregate against fixed thresholds —
/// `overall.min ≥ floor`, and every family's `p50 ≥ thresholds.p50` and
/// `p25 ≥ thresholds.p25`. Returns the first violated bound's name in the
/// error so a CI gate can report which threshold failed.
pub fn evaluate_benchmark_gate(aggregate: &BenchmarkAggregate, thresholds: &GateThresholds) -> Result<(), String> {
    if aggregate.overall_min_token_reduction_pct < thresholds.floor {
        return Err(format!(
            "overall floor violated: {} < {}",
            aggregate.overall_min_token_reduction_pct, thresholds.floor
        ));
    }
    for family in &aggregate.families {
        if family.p50 < thresholds.p50 {
            return Err(format!("family {} p50 violated: {} < {}", family.family, family.p50, thresholds.p50));
        }
        if family.p25 < thresholds.p25 {
            return Err(format!("family {} p25 violated: {} < {}", family.family, family.p25, thresholds.p25));
        }
        if family.min < thresholds.floor {
            return Err(format!("family {} floor violated: {} < {}", family.family, family.min, thresholds.floor));
        }
    }
    Ok(())
}

/// Get current UTC timestamp in seconds since UNIX_EPOCH.
///
/// Uses chrono for accurate cross-platform timestamp. Signed because every
/// timestamp column in the store is `i64` (SQLite has no native unsigned type).
pub fn get_utc_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Monotonic-enough tick used to mint `versionId`s (`"v" + tick`). Backed by
/// the same timestamp source since this crate has no other clock dependency.
pub fn monotonic_tick() -> i64 {
    Utc::now().timestamp_millis()
}
