#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    extract::{Path, State},
    http::{header, Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use zeroize::Zeroizing;

use signal_relay::application::router::build_router;
use signal_relay::application::state::AppState;
use signal_relay::auth::ApiKeys;
use signal_relay::config::AppConfig;
use signal_relay::infrastructure::adapters::telegram::TelegramConfig;
use signal_relay::infrastructure::forwarder::DestinationSettings;
use signal_relay::infrastructure::http_sink::HttpSink;
use signal_relay::persistence::{init_memory_database, DatabaseConfig};
use signal_relay::rate_limit::{create_rate_limiter, RateLimiterConfig};

pub const API_KEY: &str = "operator-key-0123456789abcdef0123456789";

/// Local HTTP server standing in for every outbound destination.
/// Paths containing `fail` answer 500.
#[derive(Clone, Default)]
pub struct MockSink {
    pub base_url: String,
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn record(
    State(sink): State<MockSink>,
    Path(path): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    sink.received.lock().unwrap().push((format!("/{}", path), body));
    if path.contains("fail") {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

impl MockSink {
    pub async fn spawn() -> MockSink {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut sink = MockSink::default();
        sink.base_url = format!("http://{}", listener.local_addr().unwrap());

        let app = Router::new()
            .route("/*path", post(record))
            .with_state(sink.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        sink
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn received(&self) -> Vec<(String, Value)> {
        self.received.lock().unwrap().clone()
    }

    pub fn bodies_for(&self, prefix: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(_, body)| body)
            .collect()
    }

    /// Wait until at least `count` requests arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<(String, Value)> {
        for _ in 0..150 {
            let received = self.received();
            if received.len() >= count {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!(
            "expected {} deliveries, got {:?}",
            count,
            self.received()
        );
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sink: MockSink,
}

impl TestApp {
    pub async fn new(webhook_secret: Option<&str>) -> TestApp {
        let sink = MockSink::spawn().await;
        let config = AppConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
                log_queries: false,
            },
            webhook_secret: webhook_secret.map(|s| Zeroizing::new(s.to_string())),
            api_keys: ApiKeys::from_csv(API_KEY),
            destinations: DestinationSettings {
                telegram: Some(TelegramConfig {
                    api_base: sink.url("/telegram"),
                    bot_token: Zeroizing::new("123:bot-token".to_string()),
                    chat_id: "42".to_string(),
                }),
                discord_webhook_url: Some(sink.url("/discord")),
                external_dashboard_url: Some(sink.url("/external")),
            },
            forward_timeout: Duration::from_secs(2),
            dedup_window_secs: 60,
            rate_limit: RateLimiterConfig {
                requests_per_minute: 10_000,
            },
        };

        let pool = init_memory_database().await.unwrap();
        let http = Arc::new(HttpSink::new(config.forward_timeout).unwrap());
        let state = AppState::new(pool, &config, http);
        let router = build_router(state.clone(), create_rate_limiter(&config.rate_limit));

        TestApp {
            router,
            state,
            sink,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn webhook(&self, body: &str) -> (StatusCode, Value) {
        let content_type = if body.trim_start().starts_with('{') {
            "application/json"
        } else {
            "text/plain"
        };
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri("/webhook")
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn api(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", API_KEY));
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}
