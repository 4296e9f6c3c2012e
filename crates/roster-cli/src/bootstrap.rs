use std::str::FromStr;

use anyhow::{Context, Result};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::EnvFilter;

use roster_engine::{BatchPolicy, ColumnLayout, EngineConfig, MarkerPalette};
use roster_sheets::SheetsConfig;
use roster_telegram::{TelegramClientConfig, TelegramPollingConfig, TelegramWebhookConfig};

use crate::cli_args::Cli;

const DEFAULT_SHEET_WIDTH: u32 = 26;

pub(crate) fn init_tracing(default_level: &str) {
    let default_directive = Directive::from_str(default_level)
        .unwrap_or_else(|_| LevelFilter::INFO.into());
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

pub(crate) fn engine_config_from_cli(cli: &Cli) -> Result<EngineConfig> {
    let config = EngineConfig {
        layout: ColumnLayout {
            name: cli.column_name,
            identity_id: cli.column_identity,
            handle: cli.column_handle,
            stage: cli.column_stage,
            batch: cli.column_batch,
            header_rows: cli.header_rows,
        },
        batches: BatchPolicy {
            count: cli.batch_count,
            capacity: cli.batch_capacity,
        },
        palette: MarkerPalette::from_hex(
            &cli.color_registered,
            &cli.color_credentials_issued,
            &cli.color_paid,
        )
        .context("invalid marker palette")?,
    };
    config.validate().context("invalid roster layout")?;
    Ok(config)
}

/// Snapshots and row markers span at least A:Z, widened when a configured
/// column sits further right.
pub(crate) fn sheets_config_from_cli(cli: &Cli, layout: &ColumnLayout) -> SheetsConfig {
    let widest = [
        layout.name,
        layout.identity_id,
        layout.handle,
        layout.stage,
        layout.batch,
    ]
    .into_iter()
    .max()
    .unwrap_or(DEFAULT_SHEET_WIDTH);
    SheetsConfig {
        api_base: cli.sheets_api_base.clone(),
        spreadsheet_id: cli.spreadsheet_id.clone(),
        sheet_name: cli.sheet_name.clone(),
        sheet_gid: cli.sheet_gid,
        access_token: cli.sheets_access_token.clone(),
        last_column: widest.max(DEFAULT_SHEET_WIDTH),
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    }
}

pub(crate) fn telegram_client_config_from_cli(cli: &Cli) -> TelegramClientConfig {
    TelegramClientConfig {
        api_base: cli.telegram_api_base.clone(),
        bot_token: cli.telegram_bot_token.clone(),
        request_timeout_ms: cli.request_timeout_ms,
        retry_max_attempts: cli.retry_max_attempts,
        retry_base_delay_ms: cli.retry_base_delay_ms,
    }
}

pub(crate) fn webhook_config_from_cli(cli: &Cli) -> TelegramWebhookConfig {
    TelegramWebhookConfig {
        bind: cli.webhook_bind.clone(),
        secret_token: cli
            .webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string),
    }
}

pub(crate) fn polling_config_from_cli(cli: &Cli) -> TelegramPollingConfig {
    TelegramPollingConfig {
        state_path: cli.polling_state_path.clone(),
        poll_timeout_secs: cli.polling_timeout_secs,
        failure_backoff_ms: cli.retry_base_delay_ms.saturating_mul(4),
        poll_once: cli.poll_once,
    }
}
