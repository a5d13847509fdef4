//! Request plumbing for the API routes: request ids, bearer auth on admin
//! routes, the webhook shared secret, and rate limits kept per route class.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{ApiError, AppState, WEBHOOK_SECRET_HEADER};

pub const API_KEYS_VAR: &str = "BRANDFEED_API_KEYS";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Who may call the admin routes.
#[derive(Debug, Clone)]
pub enum AuthState {
    /// Development without configured keys: admin routes are open.
    Open,
    /// Callers must present one of these bearer tokens.
    Keys(Arc<[String]>),
}

impl AuthState {
    /// Reads `BRANDFEED_API_KEYS` (comma-separated bearer tokens).
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var(API_KEYS_VAR).unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// An empty key list is only accepted in development.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let mut keys: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();
        keys.sort_unstable();
        keys.dedup();

        if !keys.is_empty() {
            return Ok(Self::Keys(keys.into()));
        }
        if is_development {
            tracing::warn!("{API_KEYS_VAR} not set; admin routes are open in development");
            return Ok(Self::Open);
        }
        anyhow::bail!("{API_KEYS_VAR} is required outside development")
    }

    fn admits(&self, authorization: Option<&HeaderValue>) -> bool {
        match self {
            Self::Open => true,
            Self::Keys(keys) => bearer_token(authorization)
                .is_some_and(|token| keys.iter().any(|key| secrets_match(key, token))),
        }
    }
}

fn secrets_match(expected: &str, presented: &str) -> bool {
    expected.as_bytes().ct_eq(presented.as_bytes()).into()
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Routes sharing one rate-limit budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Feed and brand listings.
    Read,
    /// Pushed Apify datasets.
    Webhook,
    /// Refresh and maintenance.
    Admin,
}

impl RouteClass {
    fn default_budget(self) -> u32 {
        match self {
            Self::Read => 120,
            Self::Webhook => 30,
            Self::Admin => 10,
        }
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Webhook => write!(f, "webhook"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    opened: Instant,
    used: u32,
}

/// Fixed-window request budgets, one window per [`RouteClass`].
#[derive(Debug, Clone)]
pub struct RateLimits {
    period: Duration,
    budgets: HashMap<RouteClass, u32>,
    windows: Arc<Mutex<HashMap<RouteClass, Window>>>,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl RateLimits {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            budgets: HashMap::new(),
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the per-window budget of `class`.
    #[must_use]
    pub fn with_budget(mut self, class: RouteClass, max_requests: u32) -> Self {
        self.budgets.insert(class, max_requests);
        self
    }

    /// Middleware state limiting `class` against the shared windows.
    #[must_use]
    pub fn guard(&self, class: RouteClass) -> RateGuard {
        RateGuard {
            limits: self.clone(),
            class,
        }
    }

    async fn try_acquire(&self, class: RouteClass) -> bool {
        let budget = self
            .budgets
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_budget());
        let now = Instant::now();

        let mut windows = self.windows.lock().await;
        let window = windows.entry(class).or_insert(Window {
            opened: now,
            used: 0,
        });
        if now.duration_since(window.opened) >= self.period {
            *window = Window {
                opened: now,
                used: 0,
            };
        }
        if window.used >= budget {
            return false;
        }
        window.used += 1;
        true
    }
}

#[derive(Debug, Clone)]
pub struct RateGuard {
    limits: RateLimits,
    class: RouteClass,
}

/// Reuses an incoming `x-request-id` or generates a `UUIDv4`, stores it as a
/// [`RequestId`] extension and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = match req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        Some(incoming) if !incoming.trim().is_empty() => incoming.to_string(),
        _ => Uuid::new_v4().to_string(),
    };
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if auth.admits(req.headers().get(AUTHORIZATION)) {
        return next.run(req).await;
    }
    ApiError::new(
        request_id_of(&req),
        "unauthorized",
        "missing or invalid bearer token",
    )
    .into_response()
}

/// Checks `x-webhook-secret` against the configured secret in constant time.
/// Without a configured secret the webhook is unavailable.
pub async fn require_webhook_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.webhook_secret.as_deref() else {
        return ApiError::new(
            request_id_of(&req),
            "not_configured",
            "webhook secret is not configured",
        )
        .into_response();
    };

    let presented = req
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if secrets_match(expected, presented) {
        return next.run(req).await;
    }

    tracing::warn!("webhook rejected: bad or missing secret");
    ApiError::new(request_id_of(&req), "unauthorized", "invalid webhook secret").into_response()
}

pub async fn enforce_rate_limit(
    State(guard): State<RateGuard>,
    req: Request,
    next: Next,
) -> Response {
    if guard.limits.try_acquire(guard.class).await {
        return next.run(req).await;
    }
    tracing::debug!(class = %guard.class, "rate limit exceeded");
    ApiError::new(
        request_id_of(&req),
        "rate_limited",
        format!("rate limit exceeded for {} routes", guard.class),
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_taken_from_bearer_header_only() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(bearer_token(Some(&header)), Some("test-token"));

        let basic = HeaderValue::from_static("Basic abc123");
        assert_eq!(bearer_token(Some(&basic)), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn empty_keys_open_admin_routes_in_development_only() {
        let dev = AuthState::from_keys("", true).expect("dev allows missing keys");
        assert!(matches!(dev, AuthState::Open));
        assert!(dev.admits(None));

        assert!(AuthState::from_keys(" , ", false).is_err());
    }

    #[test]
    fn configured_keys_admit_exact_tokens() {
        let auth = AuthState::from_keys("alpha, beta ,alpha", false).unwrap();
        let bearer = |token: &'static str| HeaderValue::from_static(token);

        assert!(matches!(&auth, AuthState::Keys(keys) if keys.len() == 2));
        assert!(auth.admits(Some(&bearer("Bearer alpha"))));
        assert!(auth.admits(Some(&bearer("Bearer beta"))));
        assert!(!auth.admits(Some(&bearer("Bearer alph"))));
        assert!(!auth.admits(Some(&bearer("alpha"))));
        assert!(!auth.admits(None));
    }

    #[test]
    fn secrets_match_requires_exact_bytes() {
        assert!(secrets_match("s3cret", "s3cret"));
        assert!(!secrets_match("s3cret", "s3cre"));
        assert!(!secrets_match("s3cret", "S3CRET"));
        assert!(!secrets_match("s3cret", ""));
    }

    #[tokio::test]
    async fn each_route_class_has_its_own_window() {
        let limits = RateLimits::new(Duration::from_secs(60))
            .with_budget(RouteClass::Read, 2)
            .with_budget(RouteClass::Admin, 1);

        assert!(limits.try_acquire(RouteClass::Read).await);
        assert!(limits.try_acquire(RouteClass::Read).await);
        assert!(!limits.try_acquire(RouteClass::Read).await);

        assert!(limits.try_acquire(RouteClass::Admin).await);
        assert!(!limits.try_acquire(RouteClass::Admin).await);

        assert!(limits.try_acquire(RouteClass::Webhook).await);
    }

    #[tokio::test]
    async fn guards_share_windows() {
        let limits = RateLimits::new(Duration::from_secs(60)).with_budget(RouteClass::Read, 1);
        let first = limits.guard(RouteClass::Read);
        let second = limits.guard(RouteClass::Read);

        assert!(first.limits.try_acquire(first.class).await);
        assert!(!second.limits.try_acquire(second.class).await);
    }

    #[tokio::test]
    async fn window_resets_after_period() {
        let limits = RateLimits::new(Duration::ZERO).with_budget(RouteClass::Admin, 1);
        assert!(limits.try_acquire(RouteClass::Admin).await);
        assert!(limits.try_acquire(RouteClass::Admin).await);
    }
}
