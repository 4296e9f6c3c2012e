use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use roster_engine::Engine;
use roster_sheets::SheetsRecordStore;
use roster_telegram::{run_telegram_polling, run_telegram_webhook_server, TelegramApiClient};

use crate::bootstrap::{
    engine_config_from_cli, polling_config_from_cli, sheets_config_from_cli,
    telegram_client_config_from_cli, webhook_config_from_cli,
};
use crate::cli_args::{Cli, CliTransportMode};

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    let engine_config = engine_config_from_cli(&cli)?;
    let store = SheetsRecordStore::new(sheets_config_from_cli(&cli, &engine_config.layout))
        .context("failed to create sheets record store")?;
    let client = TelegramApiClient::new(telegram_client_config_from_cli(&cli))?;
    info!(
        transport = cli.transport.as_str(),
        spreadsheet = %cli.spreadsheet_id,
        sheet = %cli.sheet_name,
        batches = engine_config.batches.count,
        "roster bot starting"
    );
    let engine = Arc::new(Engine::new(
        engine_config,
        Arc::new(store),
        Arc::new(client.clone()),
    ));

    match cli.transport {
        CliTransportMode::Webhook => {
            run_telegram_webhook_server(engine, webhook_config_from_cli(&cli)).await
        }
        CliTransportMode::Polling => {
            run_telegram_polling(engine, &client, &polling_config_from_cli(&cli)).await?;
            Ok(())
        }
    }
}
