mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

async fn create_relay_config(app: &TestApp, path: &str) -> i64 {
    let (status, config) = app
        .api(
            Method::POST,
            "/api/forwarding-configs",
            Some(json!({
                "name": "primary",
                "enabled": true,
                "webhookUrls": [app.sink.url(path)],
                "allowedTickers": {"MNQ1!": []},
                "symbolMap": {"MNQ1!": "MNQZ5"},
                "riskPercentage": 50,
                "roundingMode": "down",
                "token": "relay-token",
                "accountId": "ACC-1"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", config);
    config["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_entry_then_take_profit_round_trip() {
    let app = TestApp::new(None).await;
    create_relay_config(&app, "/relay/a").await;

    let (status, body) = app
        .webhook(r#"{"action":"entry","ticker":"MNQ1!","price":21500,"direction":"long","quantity":3,"stopLoss":21480,"takeProfit":21550}"#)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["outcome"], "opened");
    assert_eq!(body["message"], "entry processed successfully");
    let trade_id = body["tradeId"].as_i64().unwrap();

    // discord, telegram, external dashboard, broker relay
    let received = app.sink.wait_for(4).await;
    assert_eq!(received.len(), 4);

    let relay = app.sink.bodies_for("/relay/a");
    assert_eq!(relay.len(), 1);
    assert_eq!(relay[0]["symbol"], "MNQZ5");
    assert_eq!(relay[0]["data"], "buy");
    assert_eq!(relay[0]["quantity"].to_string(), "1");
    assert_eq!(relay[0]["price"].to_string(), "21500");
    assert_eq!(relay[0]["tp"].to_string(), "21550");
    assert_eq!(relay[0]["multiple_accounts"][0]["account_id"], "ACC-1");

    let telegram = app.sink.bodies_for("/telegram/bot123:bot-token/sendMessage");
    assert_eq!(telegram.len(), 1);
    assert_eq!(telegram[0]["chat_id"], "42");
    assert!(telegram[0]["text"].as_str().unwrap().contains("*BUY* Signal"));

    let external = app.sink.bodies_for("/external");
    assert_eq!(external[0]["symbol"], "MNQ1!");
    assert_eq!(external[0]["positionSize"], 3.0);

    let (status, body) = app
        .webhook(r#"{"action":"take_profit","ticker":"MNQ1!","price":21550}"#)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "closed");
    assert_eq!(body["tradeId"], trade_id);

    // Exit goes to the three notification destinations, never to the relay.
    app.sink.wait_for(7).await;
    assert_eq!(app.sink.bodies_for("/relay/a").len(), 1);
    let discord = app.sink.bodies_for("/discord");
    assert_eq!(discord.len(), 2);
    assert_eq!(discord[1]["embeds"][0]["title"], "🎯 TAKE_PROFIT Signal");

    let (_, trade) = app
        .api(Method::GET, &format!("/api/trades/{}", trade_id), None)
        .await;
    assert_eq!(trade["status"], "closed");
    assert_eq!(trade["exitReason"], "take_profit");
    assert_eq!(trade["pnl"], 150.0);
    assert_eq!(trade["events"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_free_text_alert() {
    let app = TestApp::new(None).await;

    let (status, body) = app
        .webhook("🟢 CL1! BUY Signal | Entry: 68.50 | SL: 68.00 | TP: 69.50 | Contracts: 2 | Strategy: CL-5M")
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "opened");

    let (status, body) = app
        .webhook(r#"{"content":"🎯 CL1! BUY TP1 HIT | Exit: 69.50 | P&L: $1,000.00 | Strategy: CL-5M"}"#)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["outcome"], "closed");

    let (_, trade) = app
        .api(Method::GET, &format!("/api/trades/{}", body["tradeId"]), None)
        .await;
    assert_eq!(trade["pnl"], 1000.0);
    assert_eq!(trade["strategy"], "CL-5M");
}

#[tokio::test]
async fn test_rejections() {
    let app = TestApp::new(Some("webhook-shared-secret")).await;

    let (status, body) = app
        .webhook(r#"{"action":"entry","ticker":"ES1!","price":5000}"#)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized: Invalid webhook secret");

    let (status, body) = app
        .webhook(r#"{"secret":"webhook-shared-secret","action":"entry","ticker":"ES1!"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: action, ticker, price");

    let (status, body) = app.webhook("good morning traders").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unable to parse webhook content");
    assert!(body["details"].is_string());

    let (status, body) = app
        .webhook(r#"{"secret":"webhook-shared-secret","action":"hold","ticker":"ES1!","price":5000}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown action: hold");

    let (_, listing) = app.api(Method::GET, "/api/trades", None).await;
    assert_eq!(listing["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_free_text_with_non_positive_price_is_rejected() {
    let app = TestApp::new(None).await;

    let (status, body) = app.webhook("CL1! BUY Signal | Entry: 0 | Contracts: 2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid price: 0");

    let (status, _) = app
        .webhook(r#"{"content":"CL1! BUY Take Profit HIT | Exit: -1"}"#)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, listing) = app.api(Method::GET, "/api/trades", None).await;
    assert_eq!(listing["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_concurrent_duplicate_entries() {
    let app = TestApp::new(None).await;
    let body = r#"{"action":"entry","ticker":"NQ1!","price":21000,"strategy":"NQ-1M"}"#;

    let ((s1, b1), (s2, b2)) = tokio::join!(app.webhook(body), app.webhook(body));
    assert_eq!(s1, StatusCode::OK);
    assert_eq!(s2, StatusCode::OK);

    let mut outcomes = vec![b1["outcome"].as_str().unwrap(), b2["outcome"].as_str().unwrap()];
    outcomes.sort();
    assert_eq!(outcomes, vec!["duplicate", "opened"]);
    assert_eq!(b1["tradeId"], b2["tradeId"]);

    let (_, listing) = app
        .api(Method::GET, "/api/trades?ticker=NQ1!&status=open", None)
        .await;
    assert_eq!(listing["pagination"]["total"], 1);

    // Only the winner is forwarded.
    app.sink.wait_for(3).await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(app.sink.received().len(), 3);
}

#[tokio::test]
async fn test_redelivered_exit_is_duplicate() {
    let app = TestApp::new(None).await;
    app.webhook(r#"{"action":"entry","ticker":"GC1!","price":2400}"#).await;

    let exit = r#"{"action":"stop_loss","ticker":"GC1!","price":2390}"#;
    let (_, first) = app.webhook(exit).await;
    let (_, second) = app.webhook(exit).await;
    assert_eq!(first["outcome"], "closed");
    assert_eq!(second["outcome"], "duplicate");
    assert_eq!(first["tradeId"], second["tradeId"]);
}

#[tokio::test]
async fn test_order_management_and_unmatched_exits() {
    let app = TestApp::new(None).await;

    let (status, body) = app
        .webhook(r#"{"action":"cancel","ticker":"ES1!","price":5000}"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ignored");
    assert!(body.get("tradeId").is_none());

    let (_, body) = app
        .webhook(r#"{"action":"take_profit","ticker":"ES1!","price":5010}"#)
        .await;
    assert_eq!(body["outcome"], "no_open_trade");

    app.webhook(r#"{"action":"entry","ticker":"ES1!","price":5000,"strategy":"A"}"#).await;
    app.webhook(r#"{"action":"entry","ticker":"ES1!","price":5001,"strategy":"B"}"#).await;
    let (_, body) = app
        .webhook(r#"{"action":"take_profit","ticker":"ES1!","price":5010}"#)
        .await;
    assert_eq!(body["outcome"], "unmatched");
}

#[tokio::test]
async fn test_failing_destination_is_isolated() {
    let app = TestApp::new(None).await;
    create_relay_config(&app, "/relay/fail").await;

    let (status, body) = app
        .webhook(r#"{"action":"entry","ticker":"MNQ1!","price":21500,"quantity":2}"#)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "opened");

    app.sink.wait_for(4).await;
    assert_eq!(app.sink.bodies_for("/discord").len(), 1);

    let mut errors = serde_json::Value::Null;
    for _ in 0..50 {
        let (_, logs) = app.api(Method::GET, "/api/logs?category=broker", None).await;
        if logs["logs"].as_array().map(|l| !l.is_empty()).unwrap_or(false) {
            errors = logs;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(errors["logs"][0]["level"], "error");
    assert!(errors["logs"][0]["message"]
        .as_str()
        .unwrap()
        .contains("rejected signal"));
}
