use thiserror::Error;

use crate::benchmarks::StatsError;
use crate::client::ClientError;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Benchmark setup failed for operation {index}: {source}")]
    Setup {
        index: usize,
        #[source]
        source: ClientError,
    },

    #[error("Invalid benchmark parameters: {0}")]
    InvalidParameters(String),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}
