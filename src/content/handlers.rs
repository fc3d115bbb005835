use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post, put},
    Extension, Json, Router,
};
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{ItemResponse, ListResponse, MessageResponse},
    repo_types::{Collection, ContentDraft},
};
use crate::{
    auth::gate::{require_admin, require_auth, AuthUser},
    error::{AppError, AppJson},
    state::AppState,
};

// --- routers ---

/// Ordered collections: public reads, admin-only writes.
pub fn collection_router(state: &AppState, collection: Collection) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(list_published))
        .route("/:id", get(get_item));

    // route_layer order: the last one added runs first.
    let admin = Router::new()
        .route("/all", get(list_all))
        .route("/", post(create_item))
        .route("/:id", put(update_item).delete(delete_item))
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.keys.clone(), require_auth));

    public.merge(admin).layer(Extension(collection))
}

/// Singleton sections: public read, writes for any authenticated user.
pub fn section_router(state: &AppState, section: Collection) -> Router<AppState> {
    let public = Router::new().route("/", get(get_section));

    let authed = Router::new()
        .route("/admin", get(get_section_admin))
        .route("/", post(upsert_section))
        .route("/publish", patch(toggle_section))
        .route_layer(middleware::from_fn_with_state(state.keys.clone(), require_auth));

    public.merge(authed).layer(Extension(section))
}

fn parse_id(raw: &str, c: Collection) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| not_found(c))
}

fn not_found(c: Collection) -> AppError {
    AppError::not_found(format!("{} not found", c.label()))
}

// --- collection handlers ---

#[instrument(skip(state), fields(collection = c.slug()))]
pub async fn list_published(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
) -> Result<Json<ListResponse>, AppError> {
    let items = state.content.list(c, true).await?;
    Ok(Json(items.into()))
}

#[instrument(skip(state), fields(collection = c.slug()))]
pub async fn list_all(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
) -> Result<Json<ListResponse>, AppError> {
    let items = state.content.list(c, false).await?;
    Ok(Json(items.into()))
}

#[instrument(skip(state), fields(collection = c.slug()))]
pub async fn get_item(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
    Path(id): Path<String>,
) -> Result<Json<ItemResponse>, AppError> {
    let id = parse_id(&id, c)?;
    let item = state.content.get(c, id).await?.ok_or_else(|| not_found(c))?;
    Ok(Json(ItemResponse::new(Some(item))))
}

#[instrument(skip(state, body), fields(collection = c.slug()))]
pub async fn create_item(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
    AuthUser(identity): AuthUser,
    AppJson(body): AppJson<Value>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    let draft = ContentDraft::from_body(body)?;
    let item = state.content.insert(c, draft).await?;
    info!(user_id = %identity.user_id, id = %item.id, "content created");
    let message = format!("{} created successfully", c.label());
    Ok((StatusCode::CREATED, Json(ItemResponse::with_message(item, message))))
}

#[instrument(skip(state, body), fields(collection = c.slug()))]
pub async fn update_item(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<ItemResponse>, AppError> {
    let id = parse_id(&id, c)?;
    let draft = ContentDraft::from_body(body)?;
    let item = state
        .content
        .update(c, id, draft)
        .await?
        .ok_or_else(|| not_found(c))?;
    info!(user_id = %identity.user_id, %id, "content updated");
    let message = format!("{} updated successfully", c.label());
    Ok(Json(ItemResponse::with_message(item, message)))
}

#[instrument(skip(state), fields(collection = c.slug()))]
pub async fn delete_item(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id, c)?;
    if !state.content.delete(c, id).await? {
        return Err(not_found(c));
    }
    info!(user_id = %identity.user_id, %id, "content deleted");
    Ok(Json(MessageResponse {
        success: true,
        message: format!("{} deleted successfully", c.label()),
    }))
}

// --- section handlers ---

#[instrument(skip(state), fields(section = c.slug()))]
pub async fn get_section(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
) -> Result<Json<ItemResponse>, AppError> {
    let item = state.content.first(c, true).await?;
    Ok(Json(ItemResponse::new(item)))
}

#[instrument(skip(state), fields(section = c.slug()))]
pub async fn get_section_admin(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
) -> Result<Json<ItemResponse>, AppError> {
    let item = state.content.first(c, false).await?;
    Ok(Json(ItemResponse::new(item)))
}

/// Updates the existing section (200) or creates it (201).
#[instrument(skip(state, body), fields(section = c.slug()))]
pub async fn upsert_section(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
    AuthUser(identity): AuthUser,
    AppJson(body): AppJson<Value>,
) -> Result<(StatusCode, Json<ItemResponse>), AppError> {
    let draft = ContentDraft::from_body(body)?;
    if let Some(existing) = state.content.first(c, false).await? {
        let item = state
            .content
            .update(c, existing.id, draft)
            .await?
            .ok_or_else(|| not_found(c))?;
        info!(user_id = %identity.user_id, id = %item.id, "section updated");
        return Ok((StatusCode::OK, Json(ItemResponse::new(Some(item)))));
    }
    let item = state.content.insert(c, draft).await?;
    info!(user_id = %identity.user_id, id = %item.id, "section created");
    Ok((StatusCode::CREATED, Json(ItemResponse::new(Some(item)))))
}

#[instrument(skip(state), fields(section = c.slug()))]
pub async fn toggle_section(
    State(state): State<AppState>,
    Extension(c): Extension<Collection>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ItemResponse>, AppError> {
    let existing = state.content.first(c, false).await?.ok_or_else(|| not_found(c))?;
    let item = state
        .content
        .toggle_published(c, existing.id)
        .await?
        .ok_or_else(|| not_found(c))?;
    info!(user_id = %identity.user_id, published = item.is_published, "section publish toggled");
    Ok(Json(ItemResponse::new(Some(item))))
}
