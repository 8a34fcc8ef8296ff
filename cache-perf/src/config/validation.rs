use anyhow::Result;
use figment::{Figment, providers::{Env, Format, Toml, Serialized}};
use garde::Validate;
use clap::Parser;

use super::AppConfig;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "token-cache-perf", about = "Token cache accessor latency benchmark")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, env = "APP_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Number of simulated tenants
    #[arg(long)]
    pub tenants: Option<usize>,

    /// Number of tokens to cache and retrieve
    #[arg(long)]
    pub tokens: Option<usize>,

    /// Report format: text or json
    #[arg(long)]
    pub format: Option<String>,

    /// Environment name
    #[arg(long, env = "ENVIRONMENT")]
    pub environment: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Load configuration, lowest to highest priority:
///
/// 1. Embedded defaults
/// 2. `config/default.toml`
/// 3. `config/{environment}.toml`
/// 4. `--config` file
/// 5. `APP_`-prefixed environment variables (`__` separates sections)
/// 6. CLI flags
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let env_name = cli.environment.clone().unwrap_or_else(||
        std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
    );

    let mut figment = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file("config/default.toml"))
        .merge(Toml::file(format!("config/{}.toml", env_name)));

    if let Some(path) = &cli.config {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment
        .merge(Env::prefixed("APP_").split("__"))
        .merge(Serialized::default("environment", env_name.to_lowercase()));

    if let Some(tenants) = cli.tenants {
        figment = figment.merge(Serialized::default("benchmark.tenant_count", tenants));
    }
    if let Some(tokens) = cli.tokens {
        figment = figment.merge(Serialized::default("benchmark.token_count", tokens));
    }
    if let Some(format) = &cli.format {
        figment = figment.merge(Serialized::default("report.format", format));
    }
    if cli.debug {
        figment = figment.merge(Serialized::default("logging.level", "debug"));
    }

    let config: AppConfig = figment.extract()?;

    // Validate with Garde
    config.validate()?;

    Ok(config)
}
