/// Remote cat API adapter
///
/// Thin translation layer between domain calls and the external
/// image-hosting/voting REST API. No retries, no caching; a failed
/// attempt surfaces immediately as a tagged error for the coordinator.
pub mod client;
pub mod types;

pub use client::CatApiClient;
pub use types::{Image, UploadedImage};
