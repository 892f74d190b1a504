//! The single proxy route.
//!
//! POST bodies are forwarded byte for byte; the only thing added on the way
//! out is the credential.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{ANTHROPIC_VERSION, GatewayConfig, UpstreamFlavor};
use crate::error::GatewayError;

#[derive(Clone)]
pub struct GatewayState {
    config: Arc<GatewayConfig>,
    http: reqwest::Client,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Create the gateway router: one path, any method, permissive CORS.
pub fn router(config: GatewayConfig) -> Router {
    let path = config.path.clone();
    Router::new()
        .route(&path, any(proxy))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(GatewayState::new(config))
}

async fn proxy(State(state): State<GatewayState>, method: Method, body: Bytes) -> Response {
    match forward(&state, method, body).await {
        Ok(response) => response,
        Err(err) => {
            warn!(status = %err.status(), error = %err, "proxy request failed");
            err.into_response()
        }
    }
}

async fn forward(
    state: &GatewayState,
    method: Method,
    body: Bytes,
) -> Result<Response, GatewayError> {
    if method != Method::POST {
        return Err(GatewayError::MethodNotAllowed);
    }
    let config = state.config();
    let Some(credential) = config.credential.as_deref() else {
        return Err(GatewayError::MissingCredential {
            hint: config.flavor.missing_credential_hint(),
        });
    };

    let request = state
        .http
        .post(&config.upstream_url)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body);
    let request = match config.flavor {
        UpstreamFlavor::ChatCompletions => request.bearer_auth(credential),
        UpstreamFlavor::AnthropicMessages => request
            .header("x-api-key", credential)
            .header("anthropic-version", ANTHROPIC_VERSION),
    };

    let upstream = request
        .send()
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    let status = upstream.status().as_u16();
    let text = upstream
        .text()
        .await
        .map_err(|e| GatewayError::Internal(e.to_string()))?;

    if !(200..300).contains(&status) {
        return Err(GatewayError::Upstream {
            status,
            details: text,
        });
    }

    info!(status, bytes = text.len(), "proxied completion");
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    Ok((status, [(header::CONTENT_TYPE, "application/json")], text).into_response())
}
