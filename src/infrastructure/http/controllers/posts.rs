use crate::{
    domain::entities::*,
    infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedPrincipal},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};

/// Public: anonymous readers get every live lock flagged.
pub async fn list_posts(
    State(state): State<AppState>,
    principal: Option<Extension<AuthenticatedPrincipal>>,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<Json<PostListResponse>> {
    let principal = principal.as_ref().map(|Extension(p)| &p.id);
    let page = state.post_service.list_posts(principal, &query).await?;
    Ok(Json(page))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Json(request): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let post = state.post_service.create_post(&principal.id, request).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Post>> {
    let post = state.post_service.get_post(&id).await?;
    Ok(Json(post))
}

/// Edit form: takes or renews the post lock.
pub async fn begin_edit(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
) -> ApiResult<Json<LockedPostResponse>> {
    let response = state.post_service.begin_edit(&principal.id, &id).await?;
    Ok(Json(response))
}

pub async fn commit_edit(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
    Json(request): Json<UpdatePostRequest>,
) -> ApiResult<Json<Post>> {
    let post = state
        .post_service
        .commit_edit(&principal.id, &id, request)
        .await?;
    Ok(Json(post))
}

/// Delete confirmation: takes or renews the post lock.
pub async fn begin_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
) -> ApiResult<Json<LockedPostResponse>> {
    let response = state.post_service.begin_delete(&principal.id, &id).await?;
    Ok(Json(response))
}

pub async fn commit_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.post_service.commit_delete(&principal.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
