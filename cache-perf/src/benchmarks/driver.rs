//! Latency-instrumented workload driver
//!
//! Runs two strictly sequential phases over `token_count` operations. Operation
//! `i` targets tenant `i % tenant_count` and caches (then retrieves) a token
//! whose scope is `i`, so every cached entry is distinguishable. Only the
//! client call is timed; client construction happens outside the measurement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as TokenLifetime, Utc};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use super::{ExecutionWindow, PerfStats};
use crate::cache::CacheAccessor;
use crate::client::{
    AuthParams, ClientError, ConfidentialClient, Credential, SerializationFormat, SilentParams,
    TokenResponse,
};
use crate::config::BenchmarkConfig;
use crate::error::HarnessError;
use crate::logging::sanitize_log_message;

const SYNTHETIC_ACCESS_TOKEN: &str = "fake_access_token";
const SYNTHETIC_CLIENT_SECRET: &str = "fake_secret";

/// Size of a benchmark run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestParameters {
    /// Number of simulated tenants
    pub tenant_count: usize,
    /// Number of tokens cached and then retrieved
    pub token_count: usize,
}

impl From<&BenchmarkConfig> for TestParameters {
    fn from(config: &BenchmarkConfig) -> Self {
        Self {
            tenant_count: config.tenant_count,
            token_count: config.token_count,
        }
    }
}

/// Drives synthetic clients against a shared cache accessor
pub struct WorkloadDriver {
    client_id: String,
    authority_host: String,
    serialization: SerializationFormat,
    accessor: Arc<dyn CacheAccessor>,
}

impl WorkloadDriver {
    pub fn new(client_id: &str, authority_host: &str, accessor: Arc<dyn CacheAccessor>) -> Self {
        Self {
            client_id: client_id.to_string(),
            authority_host: authority_host.trim_end_matches('/').to_string(),
            serialization: SerializationFormat::default(),
            accessor,
        }
    }

    pub fn from_config(config: &BenchmarkConfig, accessor: Arc<dyn CacheAccessor>) -> Self {
        Self::new(&config.client_id, &config.authority_host, accessor).with_serialization(config.serialization)
    }

    pub fn with_serialization(mut self, format: SerializationFormat) -> Self {
        self.serialization = format;
        self
    }

    /// Run population then retrieval and collect the statistics
    pub async fn run(&self, params: &TestParameters) -> Result<PerfStats, HarnessError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "benchmark",
            run_id = %run_id,
            tenants = params.tenant_count,
            tokens = params.token_count
        );

        async {
            let population = self.populate(params).await?;
            let retrieval = self.retrieve(params).await?;
            Ok::<_, HarnessError>(PerfStats::new(run_id, population, retrieval, params.clone()))
        }
        .instrument(span)
        .await
    }

    /// Cache one synthetic token per operation, timing the export-triggering call
    ///
    /// Client construction or token injection failures abort the run.
    pub async fn populate(&self, params: &TestParameters) -> Result<ExecutionWindow, HarnessError> {
        Self::check_parameters(params)?;
        info!(tokens = params.token_count, "Populating token cache");

        let mut durations = vec![Duration::ZERO; params.token_count];
        let started_at = Utc::now();
        let start = Instant::now();

        for (i, slot) in durations.iter_mut().enumerate() {
            let client = self
                .client_for(i, params.tenant_count)
                .map_err(|source| HarnessError::Setup { index: i, source })?;

            let scope = i.to_string();
            let auth_params = AuthParams {
                scopes: vec![scope.clone()],
            };
            let response = TokenResponse {
                access_token: SYNTHETIC_ACCESS_TOKEN.to_string(),
                refresh_token: None,
                expires_on: Utc::now() + TokenLifetime::hours(1),
                granted_scopes: vec![scope],
            };

            let op_start = Instant::now();
            client
                .auth_result_from_token(&auth_params, response, true)
                .await
                .map_err(|source| HarnessError::Setup { index: i, source })?;
            *slot = op_start.elapsed();
        }

        let end = Instant::now();
        info!(elapsed = ?end.duration_since(start), "Population complete");
        Ok(ExecutionWindow::new(start, end, started_at, durations, 0))
    }

    /// Silently retrieve every populated token, timing each call
    ///
    /// Retrieval errors are logged and counted; their durations are kept.
    pub async fn retrieve(&self, params: &TestParameters) -> Result<ExecutionWindow, HarnessError> {
        Self::check_parameters(params)?;
        info!(tokens = params.token_count, "Beginning token retrieval");

        let credential = Credential::from_secret(SYNTHETIC_CLIENT_SECRET);
        let mut durations = vec![Duration::ZERO; params.token_count];
        let mut failures = 0;
        let started_at = Utc::now();
        let start = Instant::now();

        for (i, slot) in durations.iter_mut().enumerate() {
            let client = self
                .client_for(i, params.tenant_count)
                .map_err(|source| HarnessError::Setup { index: i, source })?;

            let silent = SilentParams {
                scopes: vec![i.to_string()],
                credential: credential.clone(),
                is_app_cache: true,
            };

            let op_start = Instant::now();
            let result = client.acquire_token_silent(&silent).await;
            *slot = op_start.elapsed();

            if let Err(e) = result {
                failures += 1;
                warn!(
                    index = i,
                    partition = %client.partition_key(),
                    error = %sanitize_log_message(&e.to_string()),
                    "Silent retrieval failed"
                );
            }
        }

        let end = Instant::now();
        info!(
            elapsed = ?end.duration_since(start),
            failures = failures,
            "Retrieval complete"
        );
        Ok(ExecutionWindow::new(start, end, started_at, durations, failures))
    }

    fn client_for(&self, index: usize, tenant_count: usize) -> Result<ConfidentialClient, ClientError> {
        let tenant = index % tenant_count;
        let authority = format!("{}/{}", self.authority_host, tenant);
        let client = ConfidentialClient::new(&self.client_id, &authority, self.accessor.clone())?
            .with_serialization(self.serialization);
        debug!(index = index, tenant = tenant, "Client constructed");
        Ok(client)
    }

    fn check_parameters(params: &TestParameters) -> Result<(), HarnessError> {
        if params.tenant_count == 0 {
            return Err(HarnessError::InvalidParameters(
                "tenant count must be at least 1".to_string(),
            ));
        }
        if params.token_count % params.tenant_count != 0 {
            warn!(
                tenants = params.tenant_count,
                tokens = params.token_count,
                "Token count is not a multiple of tenant count; tenants receive uneven load"
            );
        }
        Ok(())
    }
}
