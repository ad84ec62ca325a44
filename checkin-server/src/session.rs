//! Coach sessions
//!
//! A successful login issues an opaque random token carried in the
//! `checkin_session` cookie. Tokens live only in memory, expire after the
//! store's TTL, and are lost on restart.

use axum::http::{header, HeaderMap};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Cookie carrying the session token
pub const SESSION_COOKIE: &str = "checkin_session";

/// Lifetime of a coach session
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Active session tokens and their expiry
#[derive(Debug, Clone)]
pub struct SessionStore {
    tokens: Arc<RwLock<HashMap<String, Instant>>>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue and remember a new token, dropping expired ones
    pub async fn create(&self) -> String {
        let token = new_token();
        let now = Instant::now();
        let mut tokens = self.tokens.write().await;
        tokens.retain(|_, expires| *expires > now);
        tokens.insert(token.clone(), now + self.ttl);
        token
    }

    pub async fn is_valid(&self, token: &str) -> bool {
        let expires = self.tokens.read().await.get(token).copied();
        match expires {
            Some(expires) if expires > Instant::now() => true,
            Some(_) => {
                self.tokens.write().await.remove(token);
                false
            }
            None => false,
        }
    }

    /// Forget a token; returns false if it was not active
    pub async fn revoke(&self, token: &str) -> bool {
        self.tokens.write().await.remove(token).is_some()
    }

    pub async fn active_count(&self) -> usize {
        let now = Instant::now();
        self.tokens
            .read()
            .await
            .values()
            .filter(|expires| **expires > now)
            .count()
    }
}

/// 32 random bytes, hex encoded
fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Compare a submitted password against the configured one
///
/// Both sides are hashed first so the comparison does not depend on where
/// the inputs first differ.
pub fn password_matches(submitted: &str, expected: &str) -> bool {
    let a = Sha256::digest(submitted.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Session token from the request's `Cookie` header
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value establishing a session
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value clearing the session
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}
