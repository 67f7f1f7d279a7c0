//! # Tollgate Admin
//!
//! Operations CLI for the shared rate limit store: run a check, inspect or
//! reset a key, sweep stale counters, or keep sweeping on a cron schedule.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use tollgate_core::ports::{Clock, SystemClock};
use tollgate_core::{Algorithm, LimiterError, RateLimitOutcome, RateLimitOverrides, RateLimiter};
use tollgate_shared::CheckResponse;

mod background;
mod config;
mod error;
mod state;
mod telemetry;

use config::AdminConfig;
use error::AdminError;
use telemetry::TelemetryConfig;

/// Exit status for a check that was denied.
const EXIT_DENIED: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "tollgate-admin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Consume one request of quota for KEY and print the decision
    Check {
        key: String,
        #[arg(short, long, default_value = "fixed")]
        algorithm: Algorithm,
        #[arg(long)]
        window_ms: Option<u64>,
        #[arg(long)]
        max_requests: Option<u64>,
        /// Sliding window only: rejected attempts do not occupy the log
        #[arg(long)]
        exact: bool,
    },
    /// Show the fixed-window counter for KEY without consuming quota
    Info { key: String },
    /// Clear limiter state for KEY
    Reset {
        key: String,
        /// Clear only this algorithm's state; every algorithm's when omitted
        #[arg(short, long)]
        algorithm: Option<Algorithm>,
    },
    /// Delete counters that have no expiry armed
    Sweep,
    /// Run the sweep on a cron schedule until interrupted
    #[cfg(feature = "scheduler")]
    Daemon {
        /// Six-field cron expression; defaults to SWEEP_SCHEDULE
        #[arg(long)]
        schedule: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let cli = Cli::parse();
    let config = AdminConfig::from_env();

    match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &AdminConfig) -> Result<ExitCode, AdminError> {
    let limiter = state::build_limiter(config).await?;

    match command {
        Command::Check {
            key,
            algorithm,
            window_ms,
            max_requests,
            exact,
        } => {
            let overrides = check_overrides(window_ms, max_requests, exact);
            let outcome = limiter.check_limit(&key, &overrides, algorithm).await?;
            let denied = matches!(outcome, RateLimitOutcome::Denied(_));

            print_json(&CheckResponse::from_outcome(
                outcome,
                algorithm,
                SystemClock.now_ms(),
            ))?;

            Ok(if denied {
                ExitCode::from(EXIT_DENIED)
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Info { key } => {
            print_json(&limiter.get_limit_info(&key).await?)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Reset { key, algorithm } => {
            reset_key(&limiter, &key, algorithm).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Sweep => {
            print_json(&limiter.cleanup().await?)?;
            Ok(ExitCode::SUCCESS)
        }
        #[cfg(feature = "scheduler")]
        Command::Daemon { schedule } => {
            let schedule = schedule.unwrap_or_else(|| config.sweep_schedule.clone());
            run_daemon(limiter, &schedule).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn check_overrides(
    window_ms: Option<u64>,
    max_requests: Option<u64>,
    exact: bool,
) -> RateLimitOverrides {
    let mut overrides = RateLimitOverrides::new();
    if let Some(window_ms) = window_ms {
        overrides = overrides.window_ms(window_ms);
    }
    if let Some(max_requests) = max_requests {
        overrides = overrides.max_requests(max_requests);
    }
    if exact {
        overrides = overrides.log_rejected(false);
    }
    overrides
}

async fn reset_key(
    limiter: &RateLimiter,
    key: &str,
    algorithm: Option<Algorithm>,
) -> Result<(), LimiterError> {
    match algorithm {
        Some(algorithm) => limiter.reset_limit_for(key, algorithm).await,
        None => {
            for algorithm in Algorithm::ALL {
                limiter.reset_limit_for(key, algorithm).await?;
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AdminError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(feature = "scheduler")]
async fn run_daemon(limiter: RateLimiter, schedule: &str) -> Result<(), AdminError> {
    let mut scheduler = background::Scheduler::new().await?;

    scheduler
        .add_cron(schedule, move || {
            let limiter = limiter.clone();
            async move {
                if let Err(e) = limiter.cleanup().await {
                    tracing::error!(error = %e, "Scheduled sweep failed");
                }
            }
        })
        .await?;

    scheduler.start().await?;
    tracing::info!(schedule = %schedule, "Sweep daemon running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    scheduler.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use clap::CommandFactory;
    use tollgate_core::RateLimitOptions;
    use tollgate_infra::InMemoryCounterStore;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryCounterStore::new()))
            .with_defaults(RateLimitOptions::new(60_000, 1))
            .unwrap()
    }

    async fn exhaust(limiter: &RateLimiter, key: &str) {
        for algorithm in Algorithm::ALL {
            let overrides = RateLimitOverrides::new();
            limiter.check_limit(key, &overrides, algorithm).await.unwrap();
            let denied = limiter.check_limit(key, &overrides, algorithm).await.unwrap();
            assert!(!denied.success(), "{algorithm} should be exhausted");
        }
    }

    async fn admitted(limiter: &RateLimiter, key: &str, algorithm: Algorithm) -> bool {
        limiter
            .check_limit(key, &RateLimitOverrides::new(), algorithm)
            .await
            .unwrap()
            .success()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_parses_algorithm_names() {
        let cli = Cli::try_parse_from([
            "tollgate-admin",
            "check",
            "api:ip",
            "--algorithm",
            "token_bucket",
            "--max-requests",
            "10",
        ])
        .unwrap();

        match cli.command {
            Command::Check {
                key,
                algorithm,
                max_requests,
                exact,
                ..
            } => {
                assert_eq!(key, "api:ip");
                assert_eq!(algorithm, Algorithm::TokenBucket);
                assert_eq!(max_requests, Some(10));
                assert!(!exact);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let result = Cli::try_parse_from(["tollgate-admin", "check", "k", "-a", "leaky"]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reset_without_algorithm_clears_every_algorithm() {
        let limiter = limiter();
        exhaust(&limiter, "10.0.0.7").await;

        let cli = Cli::try_parse_from(["tollgate-admin", "reset", "10.0.0.7"]).unwrap();
        let Command::Reset { key, algorithm } = cli.command else {
            panic!("expected reset");
        };
        assert_eq!(algorithm, None);
        reset_key(&limiter, &key, algorithm).await.unwrap();

        for algorithm in Algorithm::ALL {
            assert!(admitted(&limiter, "10.0.0.7", algorithm).await, "{algorithm} still blocked");
        }
    }

    #[tokio::test]
    async fn test_reset_with_algorithm_clears_only_that_one() {
        let limiter = limiter();
        exhaust(&limiter, "10.0.0.8").await;

        reset_key(&limiter, "10.0.0.8", Some(Algorithm::TokenBucket))
            .await
            .unwrap();

        assert!(admitted(&limiter, "10.0.0.8", Algorithm::TokenBucket).await);
        assert!(!admitted(&limiter, "10.0.0.8", Algorithm::FixedWindow).await);
        assert!(!admitted(&limiter, "10.0.0.8", Algorithm::SlidingWindow).await);
    }

    #[test]
    fn test_check_overrides_only_set_given_flags() {
        let defaults = tollgate_core::RateLimitOptions::default();

        let merged = check_overrides(None, Some(3), true).merge_over(&defaults);
        assert_eq!(merged.window_ms, defaults.window_ms);
        assert_eq!(merged.max_requests, 3);
        assert!(!merged.log_rejected);

        let merged = check_overrides(None, None, false).merge_over(&defaults);
        assert_eq!(merged, defaults);
    }
}
