/// HTTP client for the external cat API
use crate::config::UpstreamConfig;
use crate::engine::coordinator::RemoteStore;
use crate::engine::{Favourite, Vote, VoteValue};
use crate::error::{GalleryError, GalleryResult};
use crate::remote::types::{
    CreatedResponse, FavouriteBody, Image, UploadedImage, VoteBody, WireFavourite, WireVote,
};
use async_trait::async_trait;
use reqwest::multipart;
use std::time::Duration;
use tracing::{debug, error};

/// Error-text marker the remote emits when a favourite already exists
const DUPLICATE_FAVOURITE_MARKER: &str = "DUPLICATE_FAVOURITE";

pub struct CatApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CatApiClient {
    pub fn new(config: &UpstreamConfig) -> GalleryResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GalleryError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into a transport error
    async fn failure(response: reqwest::Response) -> GalleryError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default().trim().to_string();
        error!(status, message = %message, "upstream request rejected");
        GalleryError::Transport { status, message }
    }

    async fn fetch_wire_votes(&self, user_id: &str) -> GalleryResult<Vec<WireVote>> {
        let response = self
            .http
            .get(self.url("/votes"))
            .header("x-api-key", &self.api_key)
            .query(&[("sub_id", user_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        Ok(response.json().await?)
    }

    /// List images for this user, newest first
    pub async fn list_images(
        &self,
        user_id: &str,
        limit: u32,
        page: u32,
    ) -> GalleryResult<Vec<Image>> {
        let response = self
            .http
            .get(self.url("/images"))
            .header("x-api-key", &self.api_key)
            .query(&[
                ("limit", limit.to_string()),
                ("page", page.to_string()),
                ("order", "DESC".to_string()),
                ("sub_id", user_id.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        Ok(response.json().await?)
    }

    /// Proxy an image upload to the remote API
    pub async fn upload_image(
        &self,
        user_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> GalleryResult<UploadedImage> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new()
            .part("file", part)
            .text("sub_id", user_id.to_string());

        let response = self
            .http
            .post(self.url("/images/upload"))
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let uploaded: UploadedImage = response.json().await?;
        debug!(image_id = %uploaded.id, "image uploaded upstream");
        Ok(uploaded)
    }
}

#[async_trait]
impl RemoteStore for CatApiClient {
    async fn submit_vote(
        &self,
        image_id: &str,
        user_id: &str,
        value: VoteValue,
    ) -> GalleryResult<i64> {
        let response = self
            .http
            .post(self.url("/votes"))
            .header("x-api-key", &self.api_key)
            .json(&VoteBody {
                image_id,
                sub_id: user_id,
                value: value.as_wire(),
            })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let created: CreatedResponse = response.json().await?;
        debug!(image_id, remote_id = created.id, "vote recorded upstream");
        Ok(created.id)
    }

    async fn delete_vote(&self, image_id: &str, user_id: &str) -> GalleryResult<i64> {
        // No delete-by-image endpoint exists upstream: list the user's
        // votes to discover the remote id, then delete by id.
        let votes = self.fetch_wire_votes(user_id).await?;
        let Some(vote) = votes.into_iter().find(|vote| vote.image_id == image_id) else {
            return Err(GalleryError::VoteNotFound);
        };

        let response = self
            .http
            .delete(self.url(&format!("/votes/{}", vote.id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        debug!(image_id, remote_id = vote.id, "vote deleted upstream");
        Ok(vote.id)
    }

    async fn submit_favourite(&self, image_id: &str, user_id: &str) -> GalleryResult<i64> {
        let response = self
            .http
            .post(self.url("/favourites"))
            .header("x-api-key", &self.api_key)
            .json(&FavouriteBody {
                image_id,
                sub_id: user_id,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default().trim().to_string();
            return Err(classify_favourite_failure(status, message));
        }

        let created: CreatedResponse = response.json().await?;
        debug!(image_id, remote_id = created.id, "favourite recorded upstream");
        Ok(created.id)
    }

    async fn delete_favourite(&self, favourite_id: i64) -> GalleryResult<i64> {
        let response = self
            .http
            .delete(self.url(&format!("/favourites/{}", favourite_id)))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        Ok(favourite_id)
    }

    async fn list_votes(&self, user_id: &str) -> GalleryResult<Vec<Vote>> {
        let votes = self.fetch_wire_votes(user_id).await?;
        Ok(votes
            .into_iter()
            .map(|wire| Vote {
                id: wire.id,
                image_id: wire.image_id,
                value: VoteValue::from_wire(wire.value),
                user_id: user_id.to_string(),
            })
            .collect())
    }

    async fn list_favourites(&self, user_id: &str) -> GalleryResult<Vec<Favourite>> {
        let response = self
            .http
            .get(self.url("/favourites"))
            .header("x-api-key", &self.api_key)
            .query(&[("sub_id", user_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let favourites: Vec<WireFavourite> = response.json().await?;
        Ok(favourites
            .into_iter()
            .map(|wire| Favourite {
                id: wire.id,
                image_id: wire.image_id,
            })
            .collect())
    }
}

/// Map a failed favourite submission, pattern-matching the remote's
/// duplicate marker out of the error text.
fn classify_favourite_failure(status: u16, message: String) -> GalleryError {
    if message.contains(DUPLICATE_FAVOURITE_MARKER) {
        return GalleryError::AlreadyFavourited;
    }
    GalleryError::Transport { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_marker_maps_to_already_favourited() {
        let err = classify_favourite_failure(
            400,
            "{\"message\": \"DUPLICATE_FAVOURITE - favourites are unique\"}".to_string(),
        );
        assert!(matches!(err, GalleryError::AlreadyFavourited));
    }

    #[test]
    fn test_other_failures_stay_transport() {
        let err = classify_favourite_failure(401, "AUTHENTICATION_ERROR".to_string());
        assert!(matches!(err, GalleryError::Transport { status: 401, .. }));
    }
}
