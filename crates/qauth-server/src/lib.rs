//! HTTP JSON surface for QAuth.
//!
//! Enrollment, code verification and the prize draw over a small axum API.
//! Verification issues a signed session token (header `x-qauth-session`)
//! that the draw endpoint requires.

pub mod session;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use qauth_core::{CancelToken, Identity, Prize, QauthError, QauthService};

pub use session::SessionRegistry;

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-qauth-session";

const NOT_FOUND_MESSAGE: &str = "No secret found for that email. Generate a new QR first.";
const VALID_MESSAGE: &str = "Code is valid!";
const INVALID_MESSAGE: &str = "Invalid code. Make sure your device's clock is correct.";

/// Shared server state.
struct AppState {
    service: Arc<QauthService>,
    sessions: SessionRegistry,
}

#[derive(Debug, Deserialize)]
struct SecretRequest {
    identity: String,
}

#[derive(Debug, Serialize)]
struct SecretResponse {
    identity: String,
    secret: String,
    issuer: String,
    provisioning_uri: String,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    identity: String,
    code: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    valid: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DrawRequest {
    guess: String,
}

#[derive(Debug, Serialize)]
struct DrawResponse {
    guess: String,
    drawn: String,
    prize: Prize,
    alphabet: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    retryable: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ApiError {
    Core(QauthError),
    /// A blocking task panicked or was cancelled.
    Internal(String),
}

impl From<QauthError> for ApiError {
    fn from(err: QauthError) -> Self {
        Self::Core(err)
    }
}

fn status_for(err: &QauthError) -> StatusCode {
    match err {
        QauthError::NotFound(_) => StatusCode::NOT_FOUND,
        QauthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QauthError::QueueExhausted(_)
        | QauthError::AcquisitionTimeout { .. }
        | QauthError::InstrumentBusy(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, retryable) = match self {
            Self::Core(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    log::warn!("request failed: {err}");
                }
                let message = match err {
                    QauthError::NotFound(_) => NOT_FOUND_MESSAGE.to_string(),
                    ref other => other.to_string(),
                };
                (status, message, err.is_retryable())
            }
            Self::Internal(msg) => {
                log::error!("request task failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg, false)
            }
        };
        (status, Json(ErrorResponse { error, retryable })).into_response()
    }
}

/// Run a blocking core call off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> qauth_core::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(SESSION_HEADER)?.to_str().ok()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_secret(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SecretRequest>,
) -> Result<Json<SecretResponse>, ApiError> {
    let service = Arc::clone(&state.service);
    let enrollment = blocking(move || service.issue_secret(&req.identity)).await?;
    Ok(Json(SecretResponse {
        secret: enrollment.secret().to_string(),
        identity: enrollment.identity,
        issuer: enrollment.provisioning.issuer,
        provisioning_uri: enrollment.uri,
    }))
}

async fn handle_verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let identity = Identity::parse(&req.identity)?;
    let service = Arc::clone(&state.service);
    let checked = identity.clone();
    let valid = blocking(move || service.verify_code(checked.as_str(), &req.code)).await?;

    if !valid {
        return Ok(Json(VerifyResponse {
            valid: false,
            message: INVALID_MESSAGE,
            session: None,
        }));
    }
    let token = state.sessions.bind(session_token(&headers), identity);
    Ok(Json(VerifyResponse {
        valid: true,
        message: VALID_MESSAGE,
        session: Some(token),
    }))
}

async fn handle_draw(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DrawRequest>,
) -> Result<Response, ApiError> {
    let Some(identity) = session_token(&headers).and_then(|t| state.sessions.resolve(t)) else {
        return Ok(Redirect::to("/api/v1/verify").into_response());
    };
    let service = Arc::clone(&state.service);
    let draw = blocking(move || service.play(&identity, &req.guess)).await?;
    Ok(Json(DrawResponse {
        guess: draw.guess,
        drawn: draw.drawn,
        prize: draw.prize,
        alphabet: state.service.alphabet().to_string(),
    })
    .into_response())
}

async fn handle_logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<serde_json::Value> {
    let logged_out = session_token(&headers).is_some_and(|t| state.sessions.close(t));
    Json(serde_json::json!({ "logged_out": logged_out }))
}

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "source": state.service.mode().to_string(),
        "alphabet": state.service.alphabet().to_string(),
    }))
}

async fn handle_index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "QAuth Server",
        "version": qauth_core::VERSION,
        "source": state.service.mode().to_string(),
        "endpoints": {
            "/": "This API index",
            "/health": "Health check",
            "/api/v1/secret": {
                "method": "POST",
                "description": "Issue a new TOTP secret, replacing any previous one",
                "body": { "identity": "Email or other identity key" },
            },
            "/api/v1/verify": {
                "method": "POST",
                "description": "Verify a six-digit code; opens a session on success",
                "body": { "identity": "Identity key", "code": "Six-digit code" },
            },
            "/api/v1/draw": {
                "method": "POST",
                "description": format!("Play the draw; requires the {SESSION_HEADER} header"),
                "body": {
                    "guess": format!("Four {} digits", state.service.alphabet()),
                },
            },
            "/api/v1/logout": {
                "method": "POST",
                "description": format!("End the session named by the {SESSION_HEADER} header"),
            },
        },
    }))
}

/// Build the axum router.
pub fn build_router(service: Arc<QauthService>, session_key: &[u8]) -> Router {
    let state = Arc::new(AppState {
        service,
        sessions: SessionRegistry::new(session_key),
    });

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/v1/secret", post(handle_secret))
        .route("/api/v1/verify", post(handle_verify))
        .route("/api/v1/draw", post(handle_draw))
        .route("/api/v1/logout", post(handle_logout))
        .with_state(state)
}

/// Run the HTTP server until `shutdown` is cancelled.
pub async fn run_server(
    service: Arc<QauthService>,
    session_key: &[u8],
    host: &str,
    port: u16,
    shutdown: CancelToken,
) -> std::io::Result<()> {
    let app = build_router(service, session_key);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !shutdown.is_cancelled() {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            log::info!("shutting down");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::LOCATION;
    use qauth_core::{
        FallbackDrawSeeding, FallbackSource, MemorySecretStore, OtpEngine, Secret, SeedQueue,
    };
    use std::time::{SystemTime, UNIX_EPOCH};

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn state(tmp: &tempfile::TempDir) -> Arc<AppState> {
        let queue = SeedQueue::open(tmp.path().join("seeds.txt"));
        queue.push_back(&Secret::from_bytes(&[0x42; 20])).unwrap();
        let source = Arc::new(FallbackSource::new(
            queue,
            FallbackDrawSeeding::IdentitySecret,
        ));
        let service = QauthService::new(Arc::new(MemorySecretStore::new()), source, "QAuth");
        Arc::new(AppState {
            service: Arc::new(service),
            sessions: SessionRegistry::new(KEY),
        })
    }

    fn current_code() -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        OtpEngine::new().code_at(&Secret::from_bytes(&[0x42; 20]), now)
    }

    fn with_session(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, token.parse().unwrap());
        headers
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&QauthError::NotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&QauthError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&QauthError::InstrumentBusy(Duration::from_secs(1))),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&QauthError::Cancelled),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_verify_unknown_identity_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let result = handle_verify(
            State(state(&tmp)),
            HeaderMap::new(),
            Json(VerifyRequest {
                identity: "nobody@example.com".into(),
                code: "123456".into(),
            }),
        )
        .await;
        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_draw_without_session_redirects() {
        let tmp = tempfile::tempdir().unwrap();
        let response = handle_draw(
            State(state(&tmp)),
            HeaderMap::new(),
            Json(DrawRequest {
                guess: "1234".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/api/v1/verify");
    }

    #[tokio::test]
    async fn test_enroll_verify_draw_logout() {
        let tmp = tempfile::tempdir().unwrap();
        let state = state(&tmp);

        let Json(enrolled) = handle_secret(
            State(Arc::clone(&state)),
            Json(SecretRequest {
                identity: "Alice@Example.com".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(enrolled.identity, "alice@example.com");
        assert!(enrolled.provisioning_uri.starts_with("otpauth://totp/"));

        let Json(wrong) = handle_verify(
            State(Arc::clone(&state)),
            HeaderMap::new(),
            Json(VerifyRequest {
                identity: "alice@example.com".into(),
                code: "000000".into(),
            }),
        )
        .await
        .unwrap();
        if !wrong.valid {
            assert_eq!(wrong.message, INVALID_MESSAGE);
            assert!(wrong.session.is_none());
        }

        let Json(verified) = handle_verify(
            State(Arc::clone(&state)),
            HeaderMap::new(),
            Json(VerifyRequest {
                identity: "alice@example.com".into(),
                code: current_code(),
            }),
        )
        .await
        .unwrap();
        assert!(verified.valid);
        assert_eq!(verified.message, VALID_MESSAGE);
        let token = verified.session.unwrap();

        let response = handle_draw(
            State(Arc::clone(&state)),
            with_session(&token),
            Json(DrawRequest {
                guess: "1234".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bad_guess = handle_draw(
            State(Arc::clone(&state)),
            with_session(&token),
            Json(DrawRequest {
                guess: "12".into(),
            }),
        )
        .await;
        assert_eq!(
            bad_guess.unwrap_err().into_response().status(),
            StatusCode::BAD_REQUEST
        );

        let Json(out) = handle_logout(State(Arc::clone(&state)), with_session(&token)).await;
        assert_eq!(out["logged_out"], true);
        let after = handle_draw(
            State(state),
            with_session(&token),
            Json(DrawRequest {
                guess: "1234".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(after.status(), StatusCode::SEE_OTHER);
    }
}
