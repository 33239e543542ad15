use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::{Config, MockCredentials};
use crate::error::{AppError, BusinessCode};
use crate::models::CurrentUser;

/// sha256 of the accepted bearer token, installed as a request extension
#[derive(Clone, Debug)]
pub struct AuthTokenHash(pub String);

// mock auth: a matching bearer token resolves to the fixed admin user.
// anything else passes through anonymously.
pub async fn resolve_user(mut req: Request<Body>, next: Next) -> Response {
    let user = {
        let expected = req.extensions().get::<AuthTokenHash>();
        let username = req
            .extensions()
            .get::<MockCredentials>()
            .map(|c| c.username.as_str())
            .unwrap_or("admin");
        match (expected, bearer_token(req.headers())) {
            (Some(expected), Some(token)) if Config::hash_token(token) == expected.0 => {
                Some(CurrentUser::mock_admin(username))
            }
            (None, Some(_)) => {
                tracing::debug!("Bearer token supplied but no auth token configured");
                None
            }
            (Some(_), Some(_)) => {
                tracing::debug!("Unknown bearer token, continuing anonymously");
                None
            }
            _ => None,
        }
    };

    if let Some(user) = user {
        tracing::trace!("Resolved user {}", user.username);
        req.extensions_mut().insert(user);
    }

    next.run(req).await
}

/// `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme == "Bearer" && !token.is_empty() && !token.contains(' ')).then_some(token)
}

/// one log line per request, levelled by outcome
pub async fn log_requests(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(req).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    // errors travel with http 200, so the envelope code decides the level
    let code = response
        .extensions()
        .get::<BusinessCode>()
        .map(|c| c.0)
        .unwrap_or(0);

    if status >= 500 || code >= 500 {
        tracing::error!("[{}] {} | {} | code {} | {:?} | {}", method, path, status, code, latency, client);
    } else if status >= 400 || code >= 400 {
        tracing::warn!("[{}] {} | {} | code {} | {:?} | {}", method, path, status, code, latency, client);
    } else {
        tracing::info!("[{}] {} | {} | {:?} | {}", method, path, status, latency, client);
    }

    response
}

/// turn bare 413/429 rejections from the body limit and rate limiter into
/// the `{code, message, data}` envelope
pub async fn envelope_rejections(response: Response) -> Response {
    if response.extensions().get::<BusinessCode>().is_some() {
        return response;
    }
    let err = match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => AppError::PayloadTooLarge,
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited,
        _ => return response,
    };

    let mut rewritten = err.into_response();
    // keep the limiter's retry hints
    for (name, value) in response.headers() {
        if name == header::RETRY_AFTER || name.as_str().starts_with("x-ratelimit") {
            rewritten.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rewritten
}
