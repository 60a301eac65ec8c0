/// Inbound rate limiting
use crate::config::RateLimitConfig;
use crate::error::{GalleryError, GalleryResult};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc};

/// Global request limiter for the HTTP surface
pub struct InboundRateLimiter {
    limiter: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    enabled: bool,
}

impl InboundRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::new(50).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::new(25).unwrap()));

        Self {
            limiter: Arc::new(GovernorLimiter::direct(quota)),
            enabled: config.enabled,
        }
    }

    /// Check the global quota
    pub fn check(&self) -> GalleryResult<()> {
        if !self.enabled {
            return Ok(());
        }
        match self.limiter.check() {
            Ok(_) => Ok(()),
            Err(_) => Err(GalleryError::RateLimitExceeded {
                retry_after: std::time::Duration::from_secs(1),
            }),
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<crate::context::AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    match ctx.rate_limiter.check() {
        Ok(_) => Ok(next.run(request).await),
        Err(_) => Err(StatusCode::TOO_MANY_REQUESTS),
    }
}
