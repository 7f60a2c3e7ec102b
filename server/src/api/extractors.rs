//! Request extractors.
//!
//! - [`ClientIp`]: origin used by the claim rate limiter
//! - [`Authenticated`]: organizer account resolved from a bearer token

use super::error::AppError;
use crate::server::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::extract::connect_info::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use gatepass_core::types::AccountId;
use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Client IP address.
///
/// # Priority
///
/// When forwarded headers are trusted (the service sits behind a proxy):
/// 1. `X-Forwarded-For` (first IP in the list)
/// 2. `X-Real-IP`
///
/// Otherwise, or when neither header parses, the connection address, falling
/// back to localhost when the server was not started with connect info.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let connect_info = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(Self(client_ip(
            &parts.headers,
            connect_info.map(|info| info.0),
            state.trust_forwarded_headers,
        )))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded: bool) -> IpAddr {
    if trust_forwarded {
        let forwarded = headers
            .get("X-Forwarded-For")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
        let real_ip = headers
            .get("X-Real-IP")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<IpAddr>().ok());
        if let Some(ip) = real_ip {
            return ip;
        }
    }
    peer.map_or(IpAddr::V4(Ipv4Addr::LOCALHOST), |addr| addr.ip())
}

/// Authenticated organizer or staff account.
///
/// Reads `Authorization: Bearer <token>` and resolves it through the session
/// store. Missing, malformed, unknown and expired tokens are all 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authenticated(pub AccountId);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(AppError::unauthenticated)?;
        let account = state
            .sessions
            .resolve(token, state.clock.now())
            .await
            .map_err(|e| AppError::storage(&e))?
            .ok_or_else(AppError::unauthenticated)?;
        Ok(Self(account))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
