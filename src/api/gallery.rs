/// Vote and favourite endpoints
///
/// Queries are refetch-through: they pull the remote list and
/// reconcile the reflected cache before answering. Mutations go
/// through the optimistic engine: the reflected state updates before
/// the response is built, and the network call is coalesced.
use crate::{
    context::AppContext,
    engine::coalesce::Dispatch,
    engine::coordinator::{Action, MutationReceipt},
    engine::{Favourite, Vote, VoteValue},
    error::{GalleryError, GalleryResult},
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route(
            "/api/votes",
            get(user_votes).post(vote).delete(remove_vote),
        )
        .route(
            "/api/favourites",
            get(user_favourites).post(favourite).delete(unfavourite),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct UserQuery {
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VotePayload {
    #[validate(length(min = 1, message = "Image ID is required"))]
    pub image_id: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    pub value: VoteValue,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RemoveVotePayload {
    #[validate(length(min = 1, message = "Image ID is required"))]
    pub image_id: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FavouritePayload {
    #[validate(length(min = 1, message = "Image ID is required"))]
    pub image_id: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UnfavouritePayload {
    #[validate(length(min = 1, message = "Image ID is required"))]
    pub image_id: String,
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(range(min = 1, message = "Favourite ID is required"))]
    pub favourite_id: i64,
}

/// Mutation response: how the action was dispatched plus the reflected
/// list the UI should render right now.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub dispatch: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<MutationReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub votes: Option<Vec<Vote>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favourites: Option<Vec<Favourite>>,
}

impl MutationResponse {
    fn votes(dispatch: Dispatch, votes: Vec<Vote>) -> Self {
        let (label, receipt) = split_dispatch(dispatch);
        Self {
            dispatch: label,
            receipt,
            votes: Some(votes),
            favourites: None,
        }
    }

    fn favourites(dispatch: Dispatch, favourites: Vec<Favourite>) -> Self {
        let (label, receipt) = split_dispatch(dispatch);
        Self {
            dispatch: label,
            receipt,
            votes: None,
            favourites: Some(favourites),
        }
    }
}

fn split_dispatch(dispatch: Dispatch) -> (&'static str, Option<MutationReceipt>) {
    match dispatch {
        Dispatch::Applied(receipt) => ("applied", Some(receipt)),
        Dispatch::Coalesced => ("coalesced", None),
        Dispatch::Scheduled => ("scheduled", None),
    }
}

/// Clicking the direction that is already active means "remove my
/// vote", not "vote the same way again". Decided against the reflected
/// cache, before coalescing.
fn decide_vote_action(
    user_id: &str,
    image_id: &str,
    requested: VoteValue,
    cached: &[Vote],
) -> Action {
    let current = cached
        .iter()
        .find(|vote| vote.image_id == image_id)
        .map(|vote| vote.value);
    if current == Some(requested) {
        Action::RemoveVote {
            user_id: user_id.to_string(),
            image_id: image_id.to_string(),
        }
    } else {
        Action::Vote {
            user_id: user_id.to_string(),
            image_id: image_id.to_string(),
            value: requested,
        }
    }
}

async fn user_votes(
    State(ctx): State<AppContext>,
    Query(query): Query<UserQuery>,
) -> GalleryResult<Json<Vec<Vote>>> {
    query
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;
    let votes = ctx.coordinator.refresh_votes(&query.user_id).await?;
    Ok(Json(votes))
}

async fn user_favourites(
    State(ctx): State<AppContext>,
    Query(query): Query<UserQuery>,
) -> GalleryResult<Json<Vec<Favourite>>> {
    query
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;
    let favourites = ctx.coordinator.refresh_favourites(&query.user_id).await?;
    Ok(Json(favourites))
}

async fn vote(
    State(ctx): State<AppContext>,
    Json(payload): Json<VotePayload>,
) -> GalleryResult<Json<MutationResponse>> {
    payload
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;

    let cached = ctx.coordinator.cached_votes(&payload.user_id);
    let action = decide_vote_action(&payload.user_id, &payload.image_id, payload.value, &cached);
    let dispatch = ctx.coalescer.submit(action).await?;

    Ok(Json(MutationResponse::votes(
        dispatch,
        ctx.coordinator.cached_votes(&payload.user_id),
    )))
}

async fn remove_vote(
    State(ctx): State<AppContext>,
    Json(payload): Json<RemoveVotePayload>,
) -> GalleryResult<Json<MutationResponse>> {
    payload
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;

    let action = Action::RemoveVote {
        user_id: payload.user_id.clone(),
        image_id: payload.image_id,
    };
    let dispatch = ctx.coalescer.submit(action).await?;

    Ok(Json(MutationResponse::votes(
        dispatch,
        ctx.coordinator.cached_votes(&payload.user_id),
    )))
}

async fn favourite(
    State(ctx): State<AppContext>,
    Json(payload): Json<FavouritePayload>,
) -> GalleryResult<Json<MutationResponse>> {
    payload
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;

    let action = Action::Favourite {
        user_id: payload.user_id.clone(),
        image_id: payload.image_id,
    };
    let dispatch = ctx.coalescer.submit(action).await?;

    Ok(Json(MutationResponse::favourites(
        dispatch,
        ctx.coordinator.cached_favourites(&payload.user_id),
    )))
}

async fn unfavourite(
    State(ctx): State<AppContext>,
    Json(payload): Json<UnfavouritePayload>,
) -> GalleryResult<Json<MutationResponse>> {
    payload
        .validate()
        .map_err(|e| GalleryError::Validation(e.to_string()))?;

    let action = Action::Unfavourite {
        user_id: payload.user_id.clone(),
        image_id: payload.image_id,
        favourite_id: payload.favourite_id,
    };
    let dispatch = ctx.coalescer.submit(action).await?;

    Ok(Json(MutationResponse::favourites(
        dispatch,
        ctx.coordinator.cached_favourites(&payload.user_id),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached_vote(image_id: &str, value: VoteValue) -> Vote {
        Vote {
            id: 42,
            image_id: image_id.to_string(),
            value,
            user_id: "user1".to_string(),
        }
    }

    // P4: clicking the active direction removes the vote.
    #[test]
    fn test_same_direction_click_removes_vote() {
        let cached = vec![cached_vote("img1", VoteValue::Up)];
        let action = decide_vote_action("user1", "img1", VoteValue::Up, &cached);
        assert!(matches!(action, Action::RemoveVote { .. }));
    }

    #[test]
    fn test_opposite_direction_click_revotes() {
        let cached = vec![cached_vote("img1", VoteValue::Up)];
        let action = decide_vote_action("user1", "img1", VoteValue::Down, &cached);
        assert!(matches!(
            action,
            Action::Vote {
                value: VoteValue::Down,
                ..
            }
        ));
    }

    #[test]
    fn test_first_click_votes() {
        let action = decide_vote_action("user1", "img1", VoteValue::Up, &[]);
        assert!(matches!(
            action,
            Action::Vote {
                value: VoteValue::Up,
                ..
            }
        ));
    }

    #[test]
    fn test_other_images_do_not_affect_decision() {
        let cached = vec![cached_vote("img2", VoteValue::Up)];
        let action = decide_vote_action("user1", "img1", VoteValue::Up, &cached);
        assert!(matches!(action, Action::Vote { .. }));
    }
}
