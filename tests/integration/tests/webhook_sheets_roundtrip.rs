use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use reqwest::StatusCode;
use roster_engine::{Engine, EngineConfig};
use roster_sheets::{SheetsConfig, SheetsRecordStore};
use roster_telegram::{
    build_webhook_router, TelegramApiClient, TelegramClientConfig, TELEGRAM_SECRET_HEADER,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

fn build_engine(sheets: &MockServer, telegram: &MockServer) -> Arc<Engine> {
    let store = SheetsRecordStore::new(SheetsConfig {
        api_base: sheets.base_url(),
        spreadsheet_id: "roster-sheet".to_string(),
        sheet_name: "Roster".to_string(),
        sheet_gid: 12,
        access_token: "sheets-token".to_string(),
        last_column: 26,
        request_timeout_ms: 2_000,
        retry_max_attempts: 2,
        retry_base_delay_ms: 1,
    })
    .expect("sheets store");
    let client = TelegramApiClient::new(TelegramClientConfig {
        api_base: telegram.base_url(),
        bot_token: "bot-token".to_string(),
        request_timeout_ms: 2_000,
        retry_max_attempts: 2,
        retry_base_delay_ms: 1,
    })
    .expect("telegram client");
    Arc::new(Engine::new(
        EngineConfig::default(),
        Arc::new(store),
        Arc::new(client),
    ))
}

async fn serve(engine: Arc<Engine>) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = build_webhook_router(engine, Some("hook-secret".to_string()));
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    tokio::time::sleep(Duration::from_millis(25)).await;
    (addr, handle)
}

async fn post_update(addr: SocketAddr, update: Value) -> Value {
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/webhook"))
        .header(TELEGRAM_SECRET_HEADER, "hook-secret")
        .json(&update)
        .send()
        .await
        .expect("post update");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("json body")
}

#[tokio::test]
async fn integration_webhook_binds_row_and_commits_stage_through_sheets() {
    let sheets = MockServer::start();
    let telegram = MockServer::start();

    let snapshot = sheets.mock(|when, then| {
        when.method(GET)
            .path("/v4/spreadsheets/roster-sheet/values/Roster!A:Z")
            .header("authorization", "Bearer sheets-token");
        then.status(200).json_body(json!({
            "range": "Roster!A1:Z3",
            "majorDimension": "ROWS",
            "values": [
                ["#", "Full name"],
                ["1", "Иван Петров"],
                ["2", "Anna Smirnova"]
            ]
        }));
    });
    let owner_read = sheets.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/roster-sheet/values/Roster!G2");
        then.status(200).json_body(json!({"range": "Roster!G2"}));
    });
    let identity_write = sheets.mock(|when, then| {
        when.method(PUT)
            .path("/v4/spreadsheets/roster-sheet/values/Roster!G2")
            .query_param("valueInputOption", "RAW")
            .body_includes("\"700\"");
        then.status(200).json_body(json!({"updatedCells": 1}));
    });
    let handle_write = sheets.mock(|when, then| {
        when.method(PUT)
            .path("/v4/spreadsheets/roster-sheet/values/Roster!H2")
            .body_includes("\"@ivan\"");
        then.status(200).json_body(json!({"updatedCells": 1}));
    });
    let reply = telegram.mock(|when, then| {
        when.method(POST)
            .path("/botbot-token/sendMessage")
            .body_includes("Row 2 | saved @ivan")
            .body_includes("\"callback_data\":\"s3_2\"");
        then.status(200).json_body(json!({
            "ok": true,
            "result": {"message_id": 41, "chat": {"id": 700, "type": "private"}, "text": "Row 2 | saved @ivan"}
        }));
    });

    let engine = build_engine(&sheets, &telegram);
    let (addr, server) = serve(engine).await;

    let body = post_update(
        addr,
        json!({
            "update_id": 1,
            "message": {
                "message_id": 3,
                "chat": {"id": 700, "type": "private"},
                "from": {"id": 700, "first_name": "Ivan", "username": "ivan"},
                "text": "петров иван"
            }
        }),
    )
    .await;
    assert_eq!(body["outcome"]["outcome"], "bound");
    snapshot.assert();
    owner_read.assert();
    identity_write.assert();
    handle_write.assert();
    reply.assert();

    let stage_write = sheets.mock(|when, then| {
        when.method(PUT)
            .path("/v4/spreadsheets/roster-sheet/values/Roster!I2")
            .body_includes("\"paid\"");
        then.status(200).json_body(json!({"updatedCells": 1}));
    });
    let marker = sheets.mock(|when, then| {
        when.method(POST)
            .path("/v4/spreadsheets/roster-sheet:batchUpdate")
            .body_includes("\"sheetId\":12")
            .body_includes("\"startRowIndex\":1")
            .body_includes("\"endColumnIndex\":26");
        then.status(200).json_body(json!({"spreadsheetId": "roster-sheet", "replies": [{}]}));
    });
    let edit = telegram.mock(|when, then| {
        when.method(POST).path("/botbot-token/editMessageText").json_body(json!({
            "chat_id": 700,
            "message_id": 41,
            "text": "Row 2 | saved @ivan\n\n→ paid ✓"
        }));
        then.status(200).json_body(json!({
            "ok": true,
            "result": {"message_id": 41, "chat": {"id": 700, "type": "private"}}
        }));
    });
    let ack = telegram.mock(|when, then| {
        when.method(POST)
            .path("/botbot-token/answerCallbackQuery")
            .json_body(json!({"callback_query_id": "cb-9"}));
        then.status(200).json_body(json!({"ok": true, "result": true}));
    });

    let body = post_update(
        addr,
        json!({
            "update_id": 2,
            "callback_query": {
                "id": "cb-9",
                "from": {"id": 700, "first_name": "Ivan", "username": "ivan"},
                "data": "s3_2",
                "message": {
                    "message_id": 41,
                    "chat": {"id": 700, "type": "private"},
                    "text": "Row 2 | saved @ivan"
                }
            }
        }),
    )
    .await;
    assert_eq!(body["outcome"]["outcome"], "stage_committed");
    assert_eq!(body["outcome"]["stage"], "paid");
    stage_write.assert();
    marker.assert();
    edit.assert();
    ack.assert();

    server.abort();
}

#[tokio::test]
async fn integration_sheets_outage_surfaces_retry_reply() {
    let sheets = MockServer::start();
    let telegram = MockServer::start();
    let snapshot = sheets.mock(|when, then| {
        when.method(GET).path("/v4/spreadsheets/roster-sheet/values/Roster!A:Z");
        then.status(503).body("backend unavailable");
    });
    let reply = telegram.mock(|when, then| {
        when.method(POST)
            .path("/botbot-token/sendMessage")
            .body_includes("unavailable right now");
        then.status(200).json_body(json!({
            "ok": true,
            "result": {"message_id": 5, "chat": {"id": 800, "type": "private"}}
        }));
    });

    let (addr, server) = serve(build_engine(&sheets, &telegram)).await;
    let body = post_update(
        addr,
        json!({
            "update_id": 3,
            "message": {
                "message_id": 4,
                "chat": {"id": 800, "type": "private"},
                "from": {"id": 800, "first_name": "Anna"},
                "text": "Anna Smirnova"
            }
        }),
    )
    .await;
    assert_eq!(body["outcome"]["outcome"], "unresolved");
    assert_eq!(body["outcome"]["reason"], "store_unavailable");
    snapshot.assert_calls(2);
    reply.assert();
    server.abort();
}
