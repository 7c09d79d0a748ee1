//! Subscription control routes.
//!
//! Bodies are parsed as JSON whatever the `Content-Type`: browsers send
//! page-unload beacons as `text/plain`.

use std::sync::Arc;

use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::HttpServerState;
use crate::domain::subscription::{SubscribeOutcome, SubscriptionError, Symbol};

/// A stock code sent as a JSON string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Code {
    /// `"005930"`
    Text(String),
    /// `5930`
    Number(serde_json::Number),
}

impl Code {
    /// The code as text. Numbers keep their JSON spelling.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

/// `POST /subscribe` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Stock code.
    #[serde(default)]
    pub code: Option<Code>,
}

/// `POST /subscribe` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    /// Normalized stock code.
    pub code: String,
    /// Always `true`; rejections are errors.
    pub accepted: bool,
    /// `false` if the code was already desired.
    pub added: bool,
}

/// One code or a list of codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Codes {
    /// A single code.
    One(Code),
    /// Several codes.
    Many(Vec<Code>),
}

/// `POST /unsubscribe` body. `code` and `codes` may be combined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    /// A single stock code.
    #[serde(default)]
    pub code: Option<Code>,
    /// One or more stock codes.
    #[serde(default)]
    pub codes: Option<Codes>,
}

impl UnsubscribeRequest {
    /// Every non-blank code in the request.
    #[must_use]
    pub fn into_codes(self) -> Vec<String> {
        let many = match self.codes {
            Some(Codes::One(code)) => vec![code],
            Some(Codes::Many(codes)) => codes,
            None => Vec::new(),
        };
        self.code
            .into_iter()
            .chain(many)
            .map(Code::into_string)
            .filter(|c| !c.trim().is_empty())
            .collect()
    }
}

/// `POST /unsubscribe` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeResponse {
    /// Codes that were desired and are now removed.
    pub removed: Vec<Symbol>,
}

/// Error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Capacity, on capacity rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<usize>,
}

/// Control API errors.
#[derive(Debug)]
pub enum ApiError {
    /// Body missing, unparseable or without a usable code.
    BadRequest(String),
    /// Desired set is full.
    AtCapacity {
        /// Configured maximum.
        max: usize,
    },
}

impl From<SubscriptionError> for ApiError {
    fn from(error: SubscriptionError) -> Self {
        match error {
            SubscriptionError::InvalidSymbol(e) => Self::BadRequest(e.to_string()),
            SubscriptionError::AtCapacity { max } => Self::AtCapacity { max },
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadRequest(format!("invalid JSON body: {error}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Self::BadRequest(error) => (StatusCode::BAD_REQUEST, ErrorResponse { error, max: None }),
            Self::AtCapacity { max } => (
                StatusCode::CONFLICT,
                ErrorResponse {
                    error: format!("subscription limit of {max} reached"),
                    max: Some(max),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

pub(super) async fn subscribe_handler(
    State(state): State<Arc<HttpServerState>>,
    body: Bytes,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let request: SubscribeRequest = parse_body(&body)?;
    let code = request.code.map(Code::into_string).unwrap_or_default();

    let outcome = state.subscriptions.subscribe(&code)?;

    Ok(Json(SubscribeResponse {
        code: code.trim().to_string(),
        accepted: true,
        added: outcome == SubscribeOutcome::Added,
    }))
}

pub(super) async fn unsubscribe_handler(
    State(state): State<Arc<HttpServerState>>,
    body: Bytes,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let request: UnsubscribeRequest = parse_body(&body)?;
    let codes = request.into_codes();

    if codes.is_empty() {
        return Err(ApiError::BadRequest(
            "expected a non-empty \"code\" or \"codes\"".to_string(),
        ));
    }

    let removed = state.subscriptions.unsubscribe(&codes);
    Ok(Json(UnsubscribeResponse { removed }))
}

pub(super) async fn list_handler(State(state): State<Arc<HttpServerState>>) -> Json<Vec<Symbol>> {
    Json(state.subscriptions.list())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::SubscriptionService;
    use crate::domain::streaming::FeedState;
    use crate::domain::subscription::{IntentEvent, IntentReceiver, SubscriptionRegistry, intent};
    use crate::infrastructure::http::create_router;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(capacity: usize) -> (axum::Router, IntentReceiver) {
        let (tx, rx) = intent::channel(16);
        let registry = Arc::new(SubscriptionRegistry::new(capacity, tx));
        let state = Arc::new(HttpServerState::new(
            "test".to_string(),
            SubscriptionService::new(registry),
            Arc::new(FeedState::new()),
        ));
        (create_router(state), rx)
    }

    async fn post(app: &axum::Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        post_as(app, uri, "application/json", body).await
    }

    async fn post_as(
        app: &axum::Router,
        uri: &str,
        content_type: &str,
        body: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", content_type)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn subscribe_accepts_and_publishes() {
        let (app, mut rx) = app(2);

        let (status, body) = post(&app, "/subscribe", r#"{"code":" 005930 "}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "005930");
        assert_eq!(body["accepted"], true);
        assert_eq!(body["added"], true);
        assert_eq!(
            rx.drain_all(),
            vec![IntentEvent::Subscribe(Symbol::parse("005930").unwrap())]
        );
    }

    #[tokio::test]
    async fn repeated_subscribe_is_idempotent() {
        let (app, mut rx) = app(1);

        post(&app, "/subscribe", r#"{"code":"005930"}"#).await;
        let (status, body) = post(&app, "/subscribe", r#"{"code":"005930"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], false);
        assert_eq!(rx.drain_all().len(), 1);
    }

    #[tokio::test]
    async fn subscribe_at_capacity_conflicts() {
        let (app, _rx) = app(1);

        post(&app, "/subscribe", r#"{"code":"005930"}"#).await;
        let (status, body) = post(&app, "/subscribe", r#"{"code":"000660"}"#).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["max"], 1);
    }

    #[tokio::test]
    async fn subscribe_rejects_blank_and_missing_codes() {
        let (app, _rx) = app(1);

        for body in [r#"{"code":"   "}"#, "{}", "not json"] {
            let (status, _) = post(&app, "/subscribe", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[tokio::test]
    async fn unsubscribe_accepts_every_body_shape() {
        let (app, _rx) = app(5);
        for code in ["A", "B", "C", "D"] {
            post(&app, "/subscribe", &format!(r#"{{"code":"{code}"}}"#)).await;
        }

        let (_, body) = post(&app, "/unsubscribe", r#"{"code":"A"}"#).await;
        assert_eq!(body["removed"], serde_json::json!(["A"]));

        let (_, body) = post(&app, "/unsubscribe", r#"{"codes":"B"}"#).await;
        assert_eq!(body["removed"], serde_json::json!(["B"]));

        let (status, body) = post(&app, "/unsubscribe", r#"{"codes":["C","D","Z"]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], serde_json::json!(["C", "D"]));
    }

    #[tokio::test]
    async fn unsubscribe_without_codes_is_bad_request() {
        let (app, _rx) = app(1);

        for body in ["{}", r#"{"codes":[]}"#, r#"{"code":""}"#] {
            let (status, _) = post(&app, "/unsubscribe", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        }
    }

    #[tokio::test]
    async fn list_is_sorted() {
        let (app, _rx) = app(3);
        for code in ["035720", "005930", "000660"] {
            post(&app, "/subscribe", &format!(r#"{{"code":"{code}"}}"#)).await;
        }

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/subscriptions")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let listed: Vec<String> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(listed, vec!["000660", "005930", "035720"]);
    }

    #[tokio::test]
    async fn beacon_unsubscribe_with_text_plain_frees_the_slot() {
        let (app, mut rx) = app(1);
        post(&app, "/subscribe", r#"{"code":"005930"}"#).await;
        rx.drain_all();

        let (status, body) = post_as(
            &app,
            "/unsubscribe",
            "text/plain;charset=UTF-8",
            r#"{"code":"005930"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], serde_json::json!(["005930"]));
        assert_eq!(
            rx.drain_all(),
            vec![IntentEvent::Unsubscribe(Symbol::parse("005930").unwrap())]
        );

        let (status, _) = post(&app, "/subscribe", r#"{"code":"000660"}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn subscribe_ignores_content_type() {
        let (app, _rx) = app(2);

        let (status, body) =
            post_as(&app, "/subscribe", "text/plain", r#"{"code":"005930"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["added"], true);

        let (status, _) = post_as(&app, "/subscribe", "", r#"{"code":"000660"}"#).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn numeric_codes_are_accepted() {
        let (app, _rx) = app(3);

        let (status, body) = post(&app, "/subscribe", r#"{"code":5930}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], "5930");

        post(&app, "/subscribe", r#"{"code":"660"}"#).await;
        let (status, body) = post(&app, "/unsubscribe", r#"{"codes":[5930, 660]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], serde_json::json!(["5930", "660"]));
    }

    #[test]
    fn unsubscribe_response_round_trips() {
        let response = UnsubscribeResponse {
            removed: vec![Symbol::parse("005930").unwrap()],
        };

        let json = serde_json::to_string(&response).unwrap();
        let back: UnsubscribeResponse = serde_json::from_str(&json).unwrap();

        assert_eq!(json, r#"{"removed":["005930"]}"#);
        assert_eq!(back.removed, response.removed);
    }

    #[test]
    fn into_codes_merges_and_skips_blanks() {
        let request = UnsubscribeRequest {
            code: Some(Code::Text("A".to_string())),
            codes: Some(Codes::Many(vec![
                Code::Text(" ".to_string()),
                Code::Number(7.into()),
                Code::Text("B".to_string()),
            ])),
        };
        assert_eq!(request.into_codes(), vec!["A", "7", "B"]);
    }
}
