use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u32,
    pub name: String,
}

/// What `/echo` saw of the incoming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub content_type: Option<String>,
    pub body: Option<Value>,
}

pub fn app() -> Router {
    Router::new()
        .route("/items", get(items_text))
        .route("/items/json", get(items_json))
        .route("/malformed", get(malformed))
        .route("/echo", any(echo))
        .route("/slow/{millis}", get(slow))
        .route("/status/{code}", get(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub fn sample_items() -> Vec<Item> {
    vec![
        Item {
            id: 1,
            name: "first".to_string(),
        },
        Item {
            id: 2,
            name: "second".to_string(),
        },
    ]
}

async fn items_text() -> &'static str {
    "ok"
}

async fn items_json() -> Json<Vec<Item>> {
    Json(sample_items())
}

async fn malformed() -> &'static str {
    "not json"
}

async fn echo(method: Method, headers: HeaderMap, body: Bytes) -> Result<Json<Echo>, StatusCode> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?)
    };
    Ok(Json(Echo {
        method: method.to_string(),
        content_type,
        body,
    }))
}

async fn slow(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "late"
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}
