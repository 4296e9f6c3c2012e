use std::path::PathBuf;

use clap::{Parser, ValueEnum};

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_column(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse column: {error}"))?;
    if parsed == 0 {
        return Err("columns are 1-based (A = 1)".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliTransportMode {
    Polling,
    Webhook,
}

impl CliTransportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Webhook => "webhook",
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "roster",
    about = "Event roster bot: binds chat accounts to sheet rows and tracks participant stages",
    version
)]
pub struct Cli {
    #[arg(
        long = "log-level",
        env = "ROSTER_LOG_LEVEL",
        default_value = "info",
        help = "Default log directive when RUST_LOG is unset (error, warn, info, debug, trace)"
    )]
    pub log_level: String,

    #[arg(
        long = "transport",
        env = "ROSTER_TRANSPORT",
        value_enum,
        default_value_t = CliTransportMode::Polling,
        help = "How updates arrive: long polling or a webhook server"
    )]
    pub transport: CliTransportMode,

    #[arg(
        long = "telegram-bot-token",
        env = "ROSTER_TELEGRAM_BOT_TOKEN",
        hide_env_values = true,
        help = "Telegram bot token"
    )]
    pub telegram_bot_token: String,

    #[arg(
        long = "telegram-api-base",
        env = "ROSTER_TELEGRAM_API_BASE",
        default_value = "https://api.telegram.org",
        help = "Base URL for the Telegram Bot API"
    )]
    pub telegram_api_base: String,

    #[arg(
        long = "webhook-bind",
        env = "ROSTER_WEBHOOK_BIND",
        default_value = "127.0.0.1:8080",
        help = "Socket address for the webhook server"
    )]
    pub webhook_bind: String,

    #[arg(
        long = "webhook-secret",
        env = "ROSTER_WEBHOOK_SECRET",
        hide_env_values = true,
        help = "Expected X-Telegram-Bot-Api-Secret-Token value for webhook calls"
    )]
    pub webhook_secret: Option<String>,

    #[arg(
        long = "polling-state-path",
        env = "ROSTER_POLLING_STATE_PATH",
        default_value = ".roster/telegram-polling.json",
        help = "JSON file holding the next getUpdates offset"
    )]
    pub polling_state_path: PathBuf,

    #[arg(
        long = "polling-timeout-secs",
        env = "ROSTER_POLLING_TIMEOUT_SECS",
        default_value_t = 30,
        help = "Long-poll wait per getUpdates call"
    )]
    pub polling_timeout_secs: u64,

    #[arg(
        long = "poll-once",
        env = "ROSTER_POLL_ONCE",
        default_value_t = false,
        help = "Run one polling cycle and exit"
    )]
    pub poll_once: bool,

    #[arg(
        long = "sheets-api-base",
        env = "ROSTER_SHEETS_API_BASE",
        default_value = "https://sheets.googleapis.com",
        help = "Base URL for the Google Sheets API"
    )]
    pub sheets_api_base: String,

    #[arg(
        long = "spreadsheet-id",
        env = "ROSTER_SPREADSHEET_ID",
        help = "Spreadsheet holding the roster"
    )]
    pub spreadsheet_id: String,

    #[arg(
        long = "sheet-name",
        env = "ROSTER_SHEET_NAME",
        default_value = "Sheet1",
        help = "Tab name of the roster inside the spreadsheet"
    )]
    pub sheet_name: String,

    #[arg(
        long = "sheet-gid",
        env = "ROSTER_SHEET_GID",
        default_value_t = 0,
        help = "Numeric tab id used for row color markers"
    )]
    pub sheet_gid: i64,

    #[arg(
        long = "sheets-access-token",
        env = "ROSTER_SHEETS_ACCESS_TOKEN",
        hide_env_values = true,
        help = "OAuth bearer token with spreadsheet read/write scope"
    )]
    pub sheets_access_token: String,

    #[arg(long = "column-name", env = "ROSTER_COLUMN_NAME", default_value_t = 2, value_parser = parse_column)]
    pub column_name: u32,

    #[arg(long = "column-identity", env = "ROSTER_COLUMN_IDENTITY", default_value_t = 7, value_parser = parse_column)]
    pub column_identity: u32,

    #[arg(long = "column-handle", env = "ROSTER_COLUMN_HANDLE", default_value_t = 8, value_parser = parse_column)]
    pub column_handle: u32,

    #[arg(long = "column-stage", env = "ROSTER_COLUMN_STAGE", default_value_t = 9, value_parser = parse_column)]
    pub column_stage: u32,

    #[arg(long = "column-batch", env = "ROSTER_COLUMN_BATCH", default_value_t = 10, value_parser = parse_column)]
    pub column_batch: u32,

    #[arg(
        long = "header-rows",
        env = "ROSTER_HEADER_ROWS",
        default_value_t = 1,
        help = "Rows at the top of the sheet excluded from statistics"
    )]
    pub header_rows: u32,

    #[arg(
        long = "batch-count",
        env = "ROSTER_BATCH_COUNT",
        default_value_t = 8,
        help = "Number of credential-issuance batches"
    )]
    pub batch_count: u8,

    #[arg(
        long = "batch-capacity",
        env = "ROSTER_BATCH_CAPACITY",
        default_value_t = 15,
        value_parser = parse_positive_usize,
        help = "Advisory number of participants per batch"
    )]
    pub batch_capacity: usize,

    #[arg(long = "color-registered", env = "ROSTER_COLOR_REGISTERED", default_value = "#ADD8E6")]
    pub color_registered: String,

    #[arg(
        long = "color-credentials-issued",
        env = "ROSTER_COLOR_CREDENTIALS_ISSUED",
        default_value = "#FFA500"
    )]
    pub color_credentials_issued: String,

    #[arg(long = "color-paid", env = "ROSTER_COLOR_PAID", default_value = "#90EE90")]
    pub color_paid: String,

    #[arg(
        long = "request-timeout-ms",
        env = "ROSTER_REQUEST_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = parse_positive_u64,
        help = "Timeout for each Sheets or Telegram request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "retry-max-attempts",
        env = "ROSTER_RETRY_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = parse_positive_usize,
        help = "Attempts per request including the first"
    )]
    pub retry_max_attempts: usize,

    #[arg(
        long = "retry-base-delay-ms",
        env = "ROSTER_RETRY_BASE_DELAY_MS",
        default_value_t = 250,
        value_parser = parse_positive_u64,
        help = "Base delay for exponential retry backoff"
    )]
    pub retry_base_delay_ms: u64,
}
