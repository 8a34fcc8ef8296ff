//! Latency statistics over measured phases
//!
//! Percentiles use the nearest-rank estimator without interpolation: sort
//! ascending, take index `floor(p * N + 0.5)` (round half up) and clamp it to
//! `[0, N - 1]`. For ten samples P50 selects index 5 and P95 selects index 9
//! (9.5 rounds up to 10, clamped). Other rounding rules give different answers
//! for small N, so this one is fixed here.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::TestParameters;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("Token count is zero; phase averages are undefined")]
    NoTokens,

    #[error("Cannot compute a percentile of an empty duration sequence")]
    EmptySequence,

    #[error("Percentile {0} is outside [0, 1]")]
    InvalidPercentile(f64),

    #[error("Token count {0} is too large to average over")]
    TokenCountOverflow(usize),
}

/// Wall-clock bounds of one phase plus its per-operation durations
///
/// `durations[i]` is the time spent in operation `i`. The window bounds are
/// measured around the whole loop and include per-iteration overhead.
#[derive(Debug, Clone)]
pub struct ExecutionWindow {
    start: Instant,
    end: Instant,
    started_at: DateTime<Utc>,
    durations: Vec<Duration>,
    failures: usize,
}

impl ExecutionWindow {
    pub fn new(start: Instant, end: Instant, started_at: DateTime<Utc>, durations: Vec<Duration>, failures: usize) -> Self {
        Self {
            start,
            end,
            started_at,
            durations,
            failures,
        }
    }

    /// Total wall-clock time of the phase
    pub fn duration(&self) -> Duration {
        self.end.saturating_duration_since(self.start)
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn durations(&self) -> &[Duration] {
        &self.durations
    }

    /// Operations that completed with a non-fatal error
    pub fn failures(&self) -> usize {
        self.failures
    }
}

/// Mean time per token: `total / token_count`
pub fn phase_average(total: Duration, token_count: usize) -> Result<Duration, StatsError> {
    if token_count == 0 {
        return Err(StatsError::NoTokens);
    }
    let divisor = u32::try_from(token_count).map_err(|_| StatsError::TokenCountOverflow(token_count))?;
    Ok(total / divisor)
}

/// Index selected by the nearest-rank rule for `len` sorted samples
pub fn nearest_rank_index(len: usize, p: f64) -> usize {
    let rank = (p * len as f64 + 0.5).floor() as usize;
    rank.min(len.saturating_sub(1))
}

/// Nearest-rank percentile of `durations`; the input need not be sorted
pub fn percentile(durations: &[Duration], p: f64) -> Result<Duration, StatsError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(StatsError::InvalidPercentile(p));
    }
    if durations.is_empty() {
        return Err(StatsError::EmptySequence);
    }

    let mut sorted = durations.to_vec();
    sorted.sort_unstable();
    Ok(sorted[nearest_rank_index(sorted.len(), p)])
}

/// Read-only statistics for one benchmark run
#[derive(Debug, Clone)]
pub struct PerfStats {
    run_id: Uuid,
    population: ExecutionWindow,
    retrieval: ExecutionWindow,
    params: TestParameters,
}

impl PerfStats {
    pub fn new(run_id: Uuid, population: ExecutionWindow, retrieval: ExecutionWindow, params: TestParameters) -> Self {
        Self {
            run_id,
            population,
            retrieval,
            params,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn params(&self) -> &TestParameters {
        &self.params
    }

    pub fn population(&self) -> &ExecutionWindow {
        &self.population
    }

    pub fn retrieval(&self) -> &ExecutionWindow {
        &self.retrieval
    }

    /// Total duration for populating the cache
    pub fn population_duration(&self) -> Duration {
        self.population.duration()
    }

    /// Total duration for retrieving tokens
    pub fn retrieval_duration(&self) -> Duration {
        self.retrieval.duration()
    }

    /// Mean time to cache one token
    pub fn population_average(&self) -> Result<Duration, StatsError> {
        phase_average(self.population_duration(), self.params.token_count)
    }

    /// Mean time to retrieve one token
    pub fn retrieval_average(&self) -> Result<Duration, StatsError> {
        phase_average(self.retrieval_duration(), self.params.token_count)
    }

    pub fn population_percentile(&self, p: f64) -> Result<Duration, StatsError> {
        percentile(self.population.durations(), p)
    }

    pub fn retrieval_percentile(&self, p: f64) -> Result<Duration, StatsError> {
        percentile(self.retrieval.durations(), p)
    }

    pub fn retrieval_errors(&self) -> usize {
        self.retrieval.failures()
    }

    /// Fraction of retrievals that failed, in `[0, 1]`
    pub fn retrieval_error_rate(&self) -> Result<f64, StatsError> {
        if self.params.token_count == 0 {
            return Err(StatsError::NoTokens);
        }
        Ok(self.retrieval.failures() as f64 / self.params.token_count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|ms| Duration::from_millis(*ms)).collect()
    }

    fn window(total: Duration, durations: Vec<Duration>, failures: usize) -> ExecutionWindow {
        let start = Instant::now();
        ExecutionWindow::new(start, start + total, Utc::now(), durations, failures)
    }

    #[test]
    fn test_phase_average_exact() {
        let avg = phase_average(Duration::from_millis(1000), 400).unwrap();
        assert_eq!(avg, Duration::from_micros(2500));
    }

    #[test]
    fn test_phase_average_zero_tokens_fails() {
        assert_eq!(phase_average(Duration::from_secs(1), 0), Err(StatsError::NoTokens));
    }

    #[test]
    fn test_phase_average_overflow_fails() {
        let huge = u32::MAX as usize + 1;
        assert_eq!(
            phase_average(Duration::from_secs(1), huge),
            Err(StatsError::TokenCountOverflow(huge))
        );
    }

    #[test]
    fn test_nearest_rank_for_ten_samples() {
        assert_eq!(nearest_rank_index(10, 0.5), 5);
        // 9.5 rounds up to 10, clamped to the last index
        assert_eq!(nearest_rank_index(10, 0.95), 9);
        assert_eq!(nearest_rank_index(10, 0.0), 0);
        assert_eq!(nearest_rank_index(10, 1.0), 9);
    }

    #[test]
    fn test_nearest_rank_rounds_half_up() {
        // 0.25 * 10 = 2.5 -> 3
        assert_eq!(nearest_rank_index(10, 0.25), 3);
        // 0.5 * 3 = 1.5 -> 2
        assert_eq!(nearest_rank_index(3, 0.5), 2);
        assert_eq!(nearest_rank_index(1, 0.95), 0);
    }

    #[test]
    fn test_percentile_on_ten_distinct_values() {
        let durations = millis(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

        assert_eq!(percentile(&durations, 0.5).unwrap(), Duration::from_millis(6));
        assert_eq!(percentile(&durations, 0.95).unwrap(), Duration::from_millis(10));
    }

    #[test]
    fn test_percentile_sorts_input() {
        let durations = millis(&[9, 1, 10, 3, 2, 8, 4, 7, 5, 6]);
        assert_eq!(percentile(&durations, 0.5).unwrap(), Duration::from_millis(6));

        // Caller's order is untouched
        assert_eq!(durations[0], Duration::from_millis(9));
    }

    #[test]
    fn test_percentile_degenerate_inputs() {
        assert_eq!(percentile(&[], 0.5), Err(StatsError::EmptySequence));
        assert_eq!(
            percentile(&millis(&[1]), 1.5),
            Err(StatsError::InvalidPercentile(1.5))
        );
        assert!(matches!(
            percentile(&millis(&[1]), f64::NAN),
            Err(StatsError::InvalidPercentile(_))
        ));
    }

    #[test]
    fn test_perf_stats_totals_and_averages() {
        let params = TestParameters {
            tenant_count: 100,
            token_count: 400,
        };
        let stats = PerfStats::new(
            Uuid::new_v4(),
            window(Duration::from_millis(1000), vec![Duration::from_millis(2); 400], 0),
            window(Duration::from_millis(400), vec![Duration::from_millis(1); 400], 4),
            params,
        );

        assert_eq!(stats.population_duration(), Duration::from_millis(1000));
        assert_eq!(stats.population_average().unwrap(), Duration::from_micros(2500));
        assert_eq!(stats.retrieval_average().unwrap(), Duration::from_millis(1));
        assert_eq!(stats.population_percentile(0.95).unwrap(), Duration::from_millis(2));
        assert_eq!(stats.retrieval_errors(), 4);
        assert_eq!(stats.retrieval_error_rate().unwrap(), 0.01);
    }

    #[test]
    fn test_perf_stats_zero_tokens_fail_fast() {
        let params = TestParameters {
            tenant_count: 1,
            token_count: 0,
        };
        let stats = PerfStats::new(
            Uuid::new_v4(),
            window(Duration::from_millis(1), Vec::new(), 0),
            window(Duration::from_millis(1), Vec::new(), 0),
            params,
        );

        assert_eq!(stats.population_average(), Err(StatsError::NoTokens));
        assert_eq!(stats.retrieval_average(), Err(StatsError::NoTokens));
        assert_eq!(stats.population_percentile(0.5), Err(StatsError::EmptySequence));
        assert_eq!(stats.retrieval_percentile(0.95), Err(StatsError::EmptySequence));
        assert_eq!(stats.retrieval_error_rate(), Err(StatsError::NoTokens));
    }
}
