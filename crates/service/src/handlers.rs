//! HTTP handlers.

use crate::state::ServiceState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use crosslink_aggregator::AggregateError;
use crosslink_network::AppRequestNetwork;
use crosslink_types::{SubnetId, UnsignedMessage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Body of `POST /aggregate-signatures`.
#[derive(Debug, Deserialize)]
pub struct AggregateSignaturesRequest {
    /// Hex-encoded canonical bytes of the unsigned message.
    pub message: String,

    /// Base58 signing subnet id; omitted means "derive from source chain".
    #[serde(rename = "signing-subnet-id", default)]
    pub signing_subnet_id: Option<String>,

    /// Hex-encoded justification forwarded to validators.
    #[serde(default)]
    pub justification: Option<String>,
}

/// Body of a successful aggregation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct AggregateSignaturesResponse {
    /// Hex-encoded serialized signed message.
    #[serde(rename = "signed-message")]
    pub signed_message: String,
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable failure description.
    pub error: String,
}

/// An error response with its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AggregateError> for ApiError {
    fn from(err: AggregateError) -> Self {
        let status = match err {
            AggregateError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Decode a hex field, tolerating a `0x` prefix.
fn decode_hex_field(value: &str, field: &str) -> Result<Vec<u8>, ApiError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped).map_err(|_| ApiError::bad_request(format!("invalid hex in '{field}'")))
}

/// `POST /aggregate-signatures`
pub async fn aggregate_signatures_handler<N: AppRequestNetwork + 'static>(
    State(state): State<ServiceState<N>>,
    Json(request): Json<AggregateSignaturesRequest>,
) -> Result<Json<AggregateSignaturesResponse>, ApiError> {
    let message_bytes = decode_hex_field(&request.message, "message")?;
    let message = UnsignedMessage::from_bytes(&message_bytes)
        .map_err(|e| ApiError::bad_request(format!("invalid message: {e}")))?;

    let signing_subnet = match request.signing_subnet_id.as_deref() {
        Some(encoded) => encoded
            .parse::<SubnetId>()
            .map_err(|e| ApiError::bad_request(format!("invalid signing-subnet-id: {e}")))?,
        None => SubnetId::PRIMARY,
    };

    let justification = request
        .justification
        .as_deref()
        .map(|encoded| decode_hex_field(encoded, "justification"))
        .transpose()?;

    debug!(
        source_chain = %message.source_chain_id(),
        signing_subnet = %signing_subnet,
        "aggregation requested"
    );

    let signed = state
        .aggregator
        .create_signed_message(
            &message,
            justification.as_deref(),
            signing_subnet,
            state.quorum_percentage,
        )
        .await?;

    info!(
        source_chain = %message.source_chain_id(),
        signers = signed.signers.count_ones(),
        "aggregation complete"
    );
    Ok(Json(AggregateSignaturesResponse {
        signed_message: hex::encode(signed.to_bytes()),
    }))
}

/// `GET /health`
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `GET /metrics`
pub async fn metrics_handler() -> Response {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}
