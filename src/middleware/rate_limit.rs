use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::warn;

/// Per-IP fixed-window rate limiter.
///
/// Each IP owns one `(window start, count)` pair. A request either lands in
/// the current window and bumps the count, or the window has expired and is
/// reset wholesale before counting. Once the count reaches the limit the
/// request is rejected with 429 and the time left in the window.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<IpAddr, Window>>>,
    max_requests: usize,
    window: Duration,
    message: Arc<str>,
}

struct Window {
    started: Instant,
    count: usize,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64, message: &str) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
            message: Arc::from(message),
        }
    }

    pub async fn check(&self, ip: IpAddr) -> Result<(), RateLimitExceeded> {
        let mut windows = self.windows.write().await;
        let now = Instant::now();

        // Opportunistic prune so idle IPs do not accumulate forever.
        if windows.len() > 1024 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed).as_secs().max(1);
            return Err(RateLimitExceeded {
                message: self.message.to_string(),
                retry_after,
            });
        }

        entry.count += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct RateLimitExceeded {
    pub message: String,
    pub retry_after: u64,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let body = Json(json!({
            "error": self.message,
            "retryAfter": self.retry_after,
            "timestamp": timestamp,
        }));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        response.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

/// Middleware enforcing a [`RateLimiter`] keyed by client IP.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let ip = client_ip(&request);
    if let Err(e) = limiter.check(ip).await {
        warn!(%ip, retry_after = e.retry_after, "rate limit exceeded");
        return Err(e);
    }
    Ok(next.run(request).await)
}

/// Client IP from `X-Forwarded-For` (first hop), then `X-Real-IP`. Falls back
/// to loopback when neither header parses, so the limiter still counts
/// something instead of rejecting the request.
fn client_ip(request: &Request) -> IpAddr {
    if let Some(forwarded) = request.headers().get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                if let Ok(ip) = first.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    if let Some(real_ip) = request.headers().get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            if let Ok(ip) = value.parse::<IpAddr>() {
                return ip;
            }
        }
    }

    IpAddr::from([127, 0, 0, 1])
}
