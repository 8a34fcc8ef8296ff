//! Token cache latency harness
//!
//! The [`WorkloadDriver`] populates and then reads back a token cache through a
//! [`CacheAccessor`](crate::cache::CacheAccessor), recording the latency of
//! every operation. [`PerfStats`] turns the two measured phases into totals,
//! averages and nearest-rank percentiles, and [`PerfReport`] renders them.
//!
//! # Running
//!
//! ```bash
//! token-cache-perf --tenants 100 --tokens 400
//! token-cache-perf --format json
//! ```
//!
//! Micro-benchmarks of the accessor and store live under `benches/` and need
//! the `benchmarks` feature:
//!
//! ```bash
//! cargo bench --features benchmarks
//! ```

pub mod driver;
pub mod report;
pub mod stats;

pub use driver::{TestParameters, WorkloadDriver};
pub use report::{PerfReport, PhaseSummary, ReportFormat, write_report};
pub use stats::{ExecutionWindow, PerfStats, StatsError, nearest_rank_index, percentile, phase_average};
