/// Application context and dependency injection
use crate::{
    config::ServerConfig,
    engine::coalesce::ActionCoalescer,
    engine::coordinator::{MutationCoordinator, RemoteStore},
    error::GalleryResult,
    rate_limit::InboundRateLimiter,
    remote::CatApiClient,
};
use std::sync::Arc;
use std::time::Duration;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub cat_api: Arc<CatApiClient>,
    pub coordinator: Arc<MutationCoordinator>,
    pub coalescer: Arc<ActionCoalescer>,
    pub rate_limiter: Arc<InboundRateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub fn new(config: ServerConfig) -> GalleryResult<Self> {
        // Validate configuration
        config.validate()?;

        // Initialize the remote adapter
        let cat_api = Arc::new(CatApiClient::new(&config.upstream)?);

        // Initialize the optimistic engine: coordinator plus coalescer
        let coordinator = Arc::new(MutationCoordinator::new(
            Arc::clone(&cat_api) as Arc<dyn RemoteStore>
        ));
        let coalescer = Arc::new(ActionCoalescer::new(
            config.engine.coalesce_policy,
            Duration::from_millis(config.engine.coalesce_window_ms),
            Arc::clone(&coordinator),
        ));

        // Initialize inbound rate limiter
        let rate_limiter = Arc::new(InboundRateLimiter::new(&config.rate_limit));

        Ok(Self {
            config: Arc::new(config),
            cat_api,
            coordinator,
            coalescer,
            rate_limiter,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
