/// Image listing and upload proxy endpoints
///
/// Thin forwarding to the remote API; the engine never mutates images
/// and only references them by id.
use crate::{
    context::AppContext,
    error::{GalleryError, GalleryResult},
    remote::{Image, UploadedImage},
};
use axum::{
    extract::{Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/images", get(list_images))
        .route("/api/images/upload", post(upload_image))
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub struct ImagesQuery {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub page: u32,
}

async fn list_images(
    State(ctx): State<AppContext>,
    Query(query): Query<ImagesQuery>,
) -> GalleryResult<Json<Vec<Image>>> {
    query
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;
    let images = ctx
        .cat_api
        .list_images(&query.user_id, query.limit, query.page)
        .await?;
    Ok(Json(images))
}

/// Forward a multipart upload (`file` + `sub_id`) to the remote API
async fn upload_image(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> GalleryResult<Json<UploadedImage>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut sub_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GalleryError::Validation(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().map(|name| name.to_string());
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| GalleryError::Validation(format!("Failed to read file: {}", e)))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("sub_id") => {
                let text = field.text().await.map_err(|e| {
                    GalleryError::Validation(format!("Failed to read sub_id: {}", e))
                })?;
                sub_id = Some(text);
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| {
        GalleryError::Validation("No file uploaded or invalid file".to_string())
    })?;
    let sub_id = sub_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GalleryError::Validation("No sub_id provided".to_string()))?;

    let uploaded = ctx.cat_api.upload_image(&sub_id, &filename, bytes).await?;
    Ok(Json(uploaded))
}
