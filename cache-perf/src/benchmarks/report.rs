//! Rendering of benchmark results
//!
//! A [`PerfReport`] is resolved from [`PerfStats`] up front, so a degenerate
//! run (no tokens) fails before anything is printed.

use std::fmt;
use std::io::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::{PerfStats, StatsError};
use crate::error::HarnessError;

/// Output format for [`write_report`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(HarnessError::InvalidParameters(format!(
                "Unsupported report format: {}. Use 'text' or 'json'",
                other
            ))),
        }
    }
}

fn as_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64() * 1000.0)
}

/// Totals and tail latencies for one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    #[serde(rename = "total_ms", serialize_with = "as_millis")]
    pub total: Duration,
    #[serde(rename = "avg_ms", serialize_with = "as_millis")]
    pub average: Duration,
    #[serde(rename = "p50_ms", serialize_with = "as_millis")]
    pub p50: Duration,
    #[serde(rename = "p95_ms", serialize_with = "as_millis")]
    pub p95: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerfReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub tenant_count: usize,
    pub token_count: usize,
    pub population: PhaseSummary,
    pub retrieval: PhaseSummary,
    pub retrieval_errors: usize,
    pub retrieval_error_rate: f64,
}

impl PerfReport {
    pub fn from_stats(stats: &PerfStats) -> Result<Self, StatsError> {
        Ok(Self {
            run_id: stats.run_id(),
            started_at: stats.population().started_at(),
            tenant_count: stats.params().tenant_count,
            token_count: stats.params().token_count,
            population: PhaseSummary {
                total: stats.population_duration(),
                average: stats.population_average()?,
                p50: stats.population_percentile(0.5)?,
                p95: stats.population_percentile(0.95)?,
            },
            retrieval: PhaseSummary {
                total: stats.retrieval_duration(),
                average: stats.retrieval_average()?,
                p50: stats.retrieval_percentile(0.5)?,
                p95: stats.retrieval_percentile(0.95)?,
            },
            retrieval_errors: stats.retrieval_errors(),
            retrieval_error_rate: stats.retrieval_error_rate()?,
        })
    }
}

impl fmt::Display for PerfReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "Test Results:")?;
        writeln!(
            f,
            "[{} tenants][{} tokens] [population: total {:?}, avg {:?}] [retrieval: total {:?}, avg {:?}]",
            self.tenant_count,
            self.token_count,
            self.population.total,
            self.population.average,
            self.retrieval.total,
            self.retrieval.average,
        )?;
        writeln!(f, "{}", "=".repeat(74))?;
        writeln!(f, "Populate Statistic")?;
        writeln!(f, "P50 {:?}", self.population.p50)?;
        writeln!(f, "P95 {:?}", self.population.p95)?;
        writeln!(f, "Retrieve Statistic")?;
        writeln!(f, "P50 {:?}", self.retrieval.p50)?;
        writeln!(f, "P95 {:?}", self.retrieval.p95)?;
        writeln!(f, "Retrieval errors: {} of {}", self.retrieval_errors, self.token_count)
    }
}

/// Write `report` to `out` in the requested format
pub fn write_report<W: Write>(report: &PerfReport, format: ReportFormat, out: &mut W) -> Result<(), HarnessError> {
    match format {
        ReportFormat::Text => write!(out, "{}", report)?,
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
