/// Wire shapes of the remote API and their normalized forms
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vote row as the remote API returns it
#[derive(Debug, Deserialize)]
pub(crate) struct WireVote {
    pub id: i64,
    pub image_id: String,
    pub value: i64,
}

/// Favourite row as the remote API returns it
#[derive(Debug, Deserialize)]
pub(crate) struct WireFavourite {
    pub id: i64,
    pub image_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct VoteBody<'a> {
    pub image_id: &'a str,
    pub sub_id: &'a str,
    pub value: u8,
}

#[derive(Debug, Serialize)]
pub(crate) struct FavouriteBody<'a> {
    pub image_id: &'a str,
    pub sub_id: &'a str,
}

/// `{id}` response of the remote create endpoints
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedResponse {
    pub id: i64,
}

/// Remote image, normalized for the gallery surface. Read-only; the
/// engine only ever references images by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response of the upload proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedImage {
    pub id: String,
    pub url: String,
}
