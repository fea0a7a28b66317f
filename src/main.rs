//! Maintenance entry point.
//!
//! Connects to PostgreSQL using the `VOUCHER_ENGINE__*` environment, then
//! sweeps expired, never-used vouchers once and exits. Intended to run from
//! a scheduler.

use std::process::ExitCode;

use tracing::{error, info};

use voucher_engine::application::handlers::voucher_admin::CleanupExpiredCommand;
use voucher_engine::config::{init_tracing, AppConfig};
use voucher_engine::domain::foundation::{AuthenticatedCaller, CommandMetadata};
use voucher_engine::VoucherEngine;

const MAINTENANCE_ACTOR: &str = "system:maintenance";

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = init_tracing(&config.logging) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }

    let engine = match VoucherEngine::connect_postgres(&config).await {
        Ok(engine) => engine,
        Err(err) => {
            error!(error = %err, "failed to start voucher engine");
            return ExitCode::FAILURE;
        }
    };

    let metadata = CommandMetadata::new(AuthenticatedCaller::admin(MAINTENANCE_ACTOR))
        .with_correlation_id(uuid::Uuid::new_v4().to_string());
    match engine
        .cleanup_expired_handler()
        .handle(CleanupExpiredCommand::default(), metadata)
        .await
    {
        Ok(deleted) => {
            info!(deleted = deleted.len(), "maintenance run complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, retryable = err.is_retryable(), "maintenance run failed");
            ExitCode::FAILURE
        }
    }
}
