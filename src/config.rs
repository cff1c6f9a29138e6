//! Command-line Configuration

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser};

use crate::{
    data::Formulation,
    solver::{
        SolveOptions,
        pool::{DEFAULT_POOL_SIZE, PoolConfig},
    },
};

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Run allocation configuration
#[derive(Debug, Parser)]
#[command(
    name = "runalloc",
    about = "Allocate SKU runs to retail doors",
    long_about = None
)]
pub struct AllocateConfig {
    /// Directory holding the input CSV tables
    #[arg(long, env = "RUNALLOC_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Prefix for exported CSV files
    #[arg(long, env = "RUNALLOC_OUTPUT_PREFIX", default_value = "outputs/allocation")]
    pub output_prefix: PathBuf,

    /// Model configuration to build
    #[arg(
        long,
        env = "RUNALLOC_FORMULATION",
        value_enum,
        default_value_t = Formulation::TierHeat
    )]
    pub formulation: Formulation,

    /// Solver settings.
    #[command(flatten)]
    pub solver: SolverConfig,

    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,
}

impl AllocateConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }
}

/// Solver and solution pool settings.
#[derive(Debug, Clone, Default, Args)]
pub struct SolverConfig {
    /// Retain up to K alternative solutions, best first
    #[arg(long = "solution-pool", value_name = "K")]
    pub solution_pool: Option<usize>,

    /// Keep alternatives within this fraction of the best objective
    #[arg(long)]
    pub pool_relative_gap: Option<f64>,

    /// Keep alternatives within this distance of the best objective
    #[arg(long)]
    pub pool_absolute_gap: Option<f64>,

    /// Wall-clock limit in seconds
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub time_limit: Option<Duration>,

    /// Backend thread count
    #[arg(long)]
    pub threads: Option<u32>,

    /// Relative MIP optimality gap
    #[arg(long)]
    pub mip_gap: Option<f64>,
}

impl SolverConfig {
    /// Options for [`AllocationModel::optimize`](crate::model::AllocationModel::optimize).
    pub fn solve_options(&self) -> SolveOptions {
        SolveOptions {
            time_limit: self.time_limit,
            threads: self.threads,
            relative_gap: self.mip_gap,
        }
    }

    /// Pool settings, if pooling was requested.
    ///
    /// A pool gap on its own enables a pool of the default size.
    pub fn pool_config(&self) -> Option<PoolConfig> {
        if self.solution_pool.is_none()
            && self.pool_relative_gap.is_none()
            && self.pool_absolute_gap.is_none()
        {
            return None;
        }

        let mut config = PoolConfig::new(self.solution_pool.unwrap_or(DEFAULT_POOL_SIZE));

        if let Some(gap) = self.pool_relative_gap {
            config = config.with_relative_gap(gap);
        }

        if let Some(gap) = self.pool_absolute_gap {
            config = config.with_absolute_gap(gap);
        }

        Some(config)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Trace every generated variable, objective term and constraint
    #[arg(long)]
    pub log_formulation: bool,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|err| format!("invalid number of seconds: {err}"))?;

    Duration::try_from_secs_f64(seconds).map_err(|err| format!("invalid time limit: {err}"))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn defaults_match_documented_values() -> TestResult {
        let config = AllocateConfig::try_parse_from(["runalloc"])?;

        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.output_prefix, PathBuf::from("outputs/allocation"));
        assert_eq!(config.formulation, Formulation::TierHeat);
        assert_eq!(config.logging.log_format, LogFormat::Compact);
        assert!(!config.logging.log_formulation);
        assert_eq!(config.solver.solve_options(), SolveOptions::default());
        assert_eq!(config.solver.pool_config(), None);

        Ok(())
    }

    #[test]
    fn solver_flags_map_to_options() -> TestResult {
        let config = AllocateConfig::try_parse_from([
            "runalloc",
            "--formulation",
            "door-size",
            "--time-limit",
            "1.5",
            "--threads",
            "4",
            "--mip-gap",
            "0.01",
            "--solution-pool",
            "3",
            "--pool-absolute-gap",
            "8",
        ])?;

        assert_eq!(config.formulation, Formulation::DoorSize);
        assert_eq!(
            config.solver.solve_options(),
            SolveOptions::default()
                .with_time_limit(Duration::from_millis(1500))
                .with_threads(4)
                .with_relative_gap(0.01)
        );
        assert_eq!(
            config.solver.pool_config(),
            Some(PoolConfig::new(3).with_absolute_gap(8.0))
        );

        Ok(())
    }

    #[test]
    fn pool_gap_alone_enables_default_pool() -> TestResult {
        let config = AllocateConfig::try_parse_from(["runalloc", "--pool-relative-gap", "0.1"])?;

        assert_eq!(
            config.solver.pool_config(),
            Some(PoolConfig::new(DEFAULT_POOL_SIZE).with_relative_gap(0.1))
        );

        Ok(())
    }

    #[test]
    fn negative_time_limit_is_rejected() {
        let result = AllocateConfig::try_parse_from(["runalloc", "--time-limit", "-1"]);

        assert!(result.is_err());
    }
}
