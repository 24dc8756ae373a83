//! Fixed-window request budget per client address.

use crate::error::ErrorEnvelope;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

pub const LIMITED_MESSAGE: &str = "Too many requests, please try again later.";

/// Idle windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 4096;

struct Window {
    remaining: AtomicU64,
    /// Epoch second when the current window started.
    started: AtomicU64,
}

impl Window {
    fn new(max_requests: u64, now: u64) -> Self {
        Self {
            remaining: AtomicU64::new(max_requests),
            started: AtomicU64::new(now),
        }
    }

    /// Two threads racing on an expired window may both reset it; at worst a
    /// few extra requests get through at the boundary.
    fn consume(&self, max_requests: u64, window_secs: u64, now: u64) -> bool {
        if now.saturating_sub(self.started.load(Ordering::Relaxed)) >= window_secs {
            self.started.store(now, Ordering::Relaxed);
            self.remaining
                .store(max_requests.saturating_sub(1), Ordering::Relaxed);
            return max_requests > 0;
        }

        loop {
            let current = self.remaining.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .remaining
                .compare_exchange_weak(current, current - 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

pub struct RateLimiter {
    windows: RwLock<HashMap<String, Window>>,
    max_requests: u64,
    window_secs: u64,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_requests,
            window_secs,
        }
    }

    /// Try to spend one request for `client`. Returns `false` when over budget.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, epoch_secs())
    }

    fn check_at(&self, client: &str, now: u64) -> bool {
        // A poisoned lock still holds a usable map.
        {
            let map = self.windows.read().unwrap_or_else(|e| e.into_inner());
            if let Some(window) = map.get(client) {
                return window.consume(self.max_requests, self.window_secs, now);
            }
        }

        let mut map = self.windows.write().unwrap_or_else(|e| e.into_inner());
        if map.len() >= SWEEP_THRESHOLD {
            let window_secs = self.window_secs;
            map.retain(|_, w| now.saturating_sub(w.started.load(Ordering::Relaxed)) < window_secs);
        }
        map.entry(client.to_string())
            .or_insert_with(|| Window::new(self.max_requests, now))
            .consume(self.max_requests, self.window_secs, now)
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Middleware: reject with 429 once the caller's address is over budget.
pub async fn enforce(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if !limiter.check(&client) {
        tracing::warn!(client = %client, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorEnvelope::new(LIMITED_MESSAGE)),
        )
            .into_response();
    }

    next.run(req).await
}
