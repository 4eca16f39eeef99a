use axum::{
    Json, Router,
    extract::{Multipart, Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::{
    access::{AccessError, Identity, authorize_mutation, require_user},
    validation::{ValidationError, validate_piece},
    web::{
        ApiMessage, AppState, AuthUser, PageLayout, PieceRow, auth, escape_html, json_error,
        render_flash_error, render_flash_success, render_login_page, render_page,
        storage::MediaStore,
        uploads::{ImageUpload, read_piece_form},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/gallery", get(gallery_page))
        .route("/gallery/new", get(new_piece_page))
        .route("/gallery/pieces", post(create_piece))
        .route(
            "/gallery/pieces/:id/edit",
            get(edit_piece_page).post(update_piece),
        )
        .route("/gallery/pieces/:id/delete", post(delete_piece))
        .route("/api/gallery", get(api_pieces))
}

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("piece not found")]
    NotFound,
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("storage error")]
    Storage(#[from] anyhow::Error),
}

/// Submitted piece fields. `image` is required on create and optional on
/// edit; the handlers enforce the difference.
pub struct PieceDraft {
    pub title: String,
    pub description: String,
    pub image: Option<ImageUpload>,
}

/// Create a piece owned by the caller. Nothing is written unless every check
/// passes; if the row insert fails after the image was stored, the file is
/// removed again.
pub async fn submit_piece(
    pool: &SqlitePool,
    media: &MediaStore,
    max_image_bytes: u64,
    identity: Identity,
    draft: PieceDraft,
) -> Result<PieceRow, GalleryError> {
    let owner_id = require_user(identity)?;

    // An absent image has no extension in the allowed set.
    let image = draft.image.as_ref().ok_or(ValidationError::InvalidImageType)?;
    validate_piece(
        &draft.title,
        &draft.description,
        Some(&image.meta()),
        max_image_bytes,
    )?;

    let stored_name = media.store_image(&image.extension, &image.bytes).await?;

    let now = chrono::Utc::now();
    let id = Uuid::new_v4();
    let result = sqlx::query(
        "INSERT INTO pieces (id, owner_id, title, description, image_path, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(owner_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(&stored_name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    if let Err(err) = result {
        media.delete(&stored_name).await;
        return Err(err.into());
    }

    Ok(PieceRow {
        id,
        owner_id,
        title: draft.title,
        description: draft.description,
        image_path: stored_name,
        created_at: now,
        updated_at: now,
    })
}

/// Edit a piece: lookup, authorize, then validate. A validation failure
/// leaves the stored row (and image file) untouched. A new image replaces
/// the old file only after the row update succeeded.
pub async fn revise_piece(
    pool: &SqlitePool,
    media: &MediaStore,
    max_image_bytes: u64,
    identity: Identity,
    piece_id: Uuid,
    draft: PieceDraft,
) -> Result<PieceRow, GalleryError> {
    let piece = fetch_piece(pool, piece_id)
        .await?
        .ok_or(GalleryError::NotFound)?;

    authorize_mutation(identity, piece.owner_id)?;

    validate_piece(
        &draft.title,
        &draft.description,
        draft.image.as_ref().map(|image| image.meta()).as_ref(),
        max_image_bytes,
    )?;

    let now = chrono::Utc::now();

    let image_path = match draft.image {
        Some(image) => {
            let stored_name = media.store_image(&image.extension, &image.bytes).await?;
            let result = sqlx::query(
                "UPDATE pieces SET title = ?, description = ?, image_path = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&stored_name)
            .bind(now)
            .bind(piece_id)
            .execute(pool)
            .await;

            if let Err(err) = result {
                media.delete(&stored_name).await;
                return Err(err.into());
            }

            media.delete(&piece.image_path).await;
            stored_name
        }
        None => {
            sqlx::query("UPDATE pieces SET title = ?, description = ?, updated_at = ? WHERE id = ?")
                .bind(&draft.title)
                .bind(&draft.description)
                .bind(now)
                .bind(piece_id)
                .execute(pool)
                .await?;
            piece.image_path.clone()
        }
    };

    Ok(PieceRow {
        id: piece.id,
        owner_id: piece.owner_id,
        title: draft.title,
        description: draft.description,
        image_path,
        created_at: piece.created_at,
        updated_at: now,
    })
}

/// Delete a piece and its stored image.
pub async fn remove_piece(
    pool: &SqlitePool,
    media: &MediaStore,
    identity: Identity,
    piece_id: Uuid,
) -> Result<(), GalleryError> {
    let piece = fetch_piece(pool, piece_id)
        .await?
        .ok_or(GalleryError::NotFound)?;

    authorize_mutation(identity, piece.owner_id)?;

    sqlx::query("DELETE FROM pieces WHERE id = ?")
        .bind(piece_id)
        .execute(pool)
        .await?;

    media.delete(&piece.image_path).await;
    Ok(())
}

pub async fn fetch_piece(pool: &SqlitePool, piece_id: Uuid) -> sqlx::Result<Option<PieceRow>> {
    sqlx::query_as::<_, PieceRow>(
        "SELECT id, owner_id, title, description, image_path, created_at, updated_at
         FROM pieces WHERE id = ?",
    )
    .bind(piece_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_pieces(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<PieceRow>> {
    sqlx::query_as::<_, PieceRow>(
        "SELECT id, owner_id, title, description, image_path, created_at, updated_at
         FROM pieces ORDER BY created_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list_pieces_for_user(
    pool: &SqlitePool,
    user_id: Uuid,
) -> sqlx::Result<Vec<PieceRow>> {
    sqlx::query_as::<_, PieceRow>(
        "SELECT id, owner_id, title, description, image_path, created_at, updated_at
         FROM pieces WHERE owner_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

#[derive(Default, Deserialize)]
pub struct GalleryQuery {
    pub status: Option<String>,
}

async fn gallery_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<GalleryQuery>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let user = auth::current_user(&state, &jar).await;

    let pieces = list_pieces(state.pool_ref(), 100).await.map_err(|err| {
        error!(?err, "failed to list pieces");
        server_error_page(user.as_ref())
    })?;

    let flash = match params.status.as_deref() {
        Some("created") => render_flash_success("Piece created."),
        Some("updated") => render_flash_success("Piece updated."),
        Some("deleted") => render_flash_success("Piece deleted."),
        _ => String::new(),
    };

    Ok(Html(render_gallery_page(user.as_ref(), &pieces, flash)))
}

async fn new_piece_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let Some(user) = auth::current_user(&state, &jar).await else {
        return Err(Redirect::to("/login"));
    };

    Ok(Html(render_piece_form(
        &user,
        &PieceFormView::new_piece(),
        String::new(),
    )))
}

async fn create_piece(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let user = auth::current_user(&state, &jar).await;
    let identity = identity_of(user.as_ref());

    // Anonymous callers are rejected before the form is even parsed.
    if identity.is_anonymous() {
        return Err(unauthenticated_page());
    }
    let user = user.expect("identity is authenticated");

    let form = read_piece_form(multipart, state.max_image_bytes())
        .await
        .map_err(|err| {
            let view = PieceFormView::new_piece();
            (
                StatusCode::BAD_REQUEST,
                Html(render_piece_form(
                    &user,
                    &view,
                    render_flash_error(&err.to_string()),
                )),
            )
        })?;

    let submitted_title = form.title.clone();
    let submitted_description = form.description.clone();
    let draft = PieceDraft {
        title: form.title,
        description: form.description,
        image: form.image,
    };

    match submit_piece(
        state.pool_ref(),
        state.media(),
        state.max_image_bytes(),
        identity,
        draft,
    )
    .await
    {
        Ok(_) => Ok(Redirect::to("/gallery?status=created")),
        Err(GalleryError::Validation(err)) => {
            // Re-render the form with what was typed so nothing is lost.
            let mut view = PieceFormView::new_piece();
            view.title = &submitted_title;
            view.description = &submitted_description;
            Err((
                StatusCode::BAD_REQUEST,
                Html(render_piece_form(
                    &user,
                    &view,
                    render_flash_error(&err.to_string()),
                )),
            ))
        }
        Err(GalleryError::Access(AccessError::Unauthenticated)) => Err(unauthenticated_page()),
        Err(err) => {
            error!(?err, "failed to create piece");
            Err(server_error_page(Some(&user)))
        }
    }
}

async fn edit_piece_page(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(piece_id): AxumPath<Uuid>,
) -> Result<Html<String>, Response> {
    // Anonymous visitors are sent to the login form, like /gallery/new.
    let Some(user) = auth::current_user(&state, &jar).await else {
        return Err(Redirect::to("/login").into_response());
    };

    let piece = fetch_piece(state.pool_ref(), piece_id)
        .await
        .map_err(|err| {
            error!(?err, %piece_id, "failed to load piece");
            server_error_page(Some(&user)).into_response()
        })?
        .ok_or_else(|| not_found_page(Some(&user)).into_response())?;

    if let Err(err) = authorize_mutation(Identity::User(user.id), piece.owner_id) {
        return Err(access_error_response(Some(&user), err));
    }

    Ok(Html(render_piece_form(
        &user,
        &PieceFormView::edit_piece(&piece),
        String::new(),
    )))
}

async fn update_piece(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(piece_id): AxumPath<Uuid>,
    multipart: Multipart,
) -> Response {
    let user = auth::current_user(&state, &jar).await;
    let identity = identity_of(user.as_ref());

    let form = match read_piece_form(multipart, state.max_image_bytes()).await {
        Ok(form) => form,
        Err(err) => {
            return bad_request_page(user.as_ref(), &err.to_string()).into_response();
        }
    };

    let draft = PieceDraft {
        title: form.title,
        description: form.description,
        image: form.image,
    };

    match revise_piece(
        state.pool_ref(),
        state.media(),
        state.max_image_bytes(),
        identity,
        piece_id,
        draft,
    )
    .await
    {
        Ok(_) => Redirect::to("/gallery?status=updated").into_response(),
        Err(GalleryError::Validation(err)) => {
            // A failed edit renders the stored, unchanged values again.
            let user = user.expect("validation implies an authorized caller");
            match fetch_piece(state.pool_ref(), piece_id).await {
                Ok(Some(piece)) => Html(render_piece_form(
                    &user,
                    &PieceFormView::edit_piece(&piece),
                    render_flash_error(&err.to_string()),
                ))
                .into_response(),
                Ok(None) => not_found_page(Some(&user)).into_response(),
                Err(err) => {
                    error!(?err, %piece_id, "failed to reload piece");
                    server_error_page(Some(&user)).into_response()
                }
            }
        }
        Err(GalleryError::Access(err)) => access_error_response(user.as_ref(), err),
        Err(GalleryError::NotFound) => not_found_page(user.as_ref()).into_response(),
        Err(err) => {
            error!(?err, %piece_id, "failed to update piece");
            server_error_page(user.as_ref()).into_response()
        }
    }
}

async fn delete_piece(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(piece_id): AxumPath<Uuid>,
) -> Result<Redirect, Response> {
    let user = auth::current_user(&state, &jar).await;
    let identity = identity_of(user.as_ref());

    match remove_piece(state.pool_ref(), state.media(), identity, piece_id).await {
        Ok(()) => Ok(Redirect::to("/gallery?status=deleted")),
        Err(GalleryError::Access(err)) => Err(access_error_response(user.as_ref(), err)),
        Err(GalleryError::NotFound) => Err(not_found_page(user.as_ref()).into_response()),
        Err(err) => {
            error!(?err, %piece_id, "failed to delete piece");
            Err(server_error_page(user.as_ref()).into_response())
        }
    }
}

#[derive(serde::Serialize)]
struct PieceItem {
    id: Uuid,
    title: String,
    description: String,
    image_url: String,
    created_at: String,
    updated_at: String,
}

async fn api_pieces(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<Vec<PieceItem>>, (StatusCode, Json<ApiMessage>)> {
    let identity = auth::resolve_identity(&state, &jar).await;
    let user_id = require_user(identity)
        .map_err(|_| json_error(StatusCode::UNAUTHORIZED, "Authentication required."))?;

    let pieces = list_pieces_for_user(state.pool_ref(), user_id)
        .await
        .map_err(|err| {
            error!(?err, %user_id, "failed to list pieces for user");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
        })?;

    let items = pieces
        .into_iter()
        .map(|piece| PieceItem {
            id: piece.id,
            title: piece.title,
            description: piece.description,
            image_url: format!("/media/{}", piece.image_path),
            created_at: piece.created_at.to_rfc3339(),
            updated_at: piece.updated_at.to_rfc3339(),
        })
        .collect();

    Ok(Json(items))
}

fn identity_of(user: Option<&AuthUser>) -> Identity {
    match user {
        Some(user) => Identity::User(user.id),
        None => Identity::Anonymous,
    }
}

fn unauthenticated_page() -> (StatusCode, Html<String>) {
    (
        StatusCode::UNAUTHORIZED,
        Html(render_login_page(Some("Please log in to continue."))),
    )
}

fn access_error_response(user: Option<&AuthUser>, err: AccessError) -> Response {
    match err {
        AccessError::Unauthenticated => unauthenticated_page().into_response(),
        AccessError::Forbidden => (
            StatusCode::FORBIDDEN,
            Html(render_page(PageLayout {
                meta_title: "Forbidden — atelier",
                heading: "atelier",
                username: user.map(|u| u.username.as_str()),
                flash_html: render_flash_error("Only the owner may modify this piece."),
                body_html: r#"<p class="note"><a href="/gallery">Back to the gallery</a></p>"#
                    .to_string(),
            })),
        )
            .into_response(),
    }
}

fn bad_request_page(user: Option<&AuthUser>, message: &str) -> (StatusCode, Html<String>) {
    (
        StatusCode::BAD_REQUEST,
        Html(render_page(PageLayout {
            meta_title: "Gallery — atelier",
            heading: "atelier",
            username: user.map(|u| u.username.as_str()),
            flash_html: render_flash_error(message),
            body_html: r#"<p class="note"><a href="/gallery">Back to the gallery</a></p>"#
                .to_string(),
        })),
    )
}

fn not_found_page(user: Option<&AuthUser>) -> (StatusCode, Html<String>) {
    (
        StatusCode::NOT_FOUND,
        Html(render_page(PageLayout {
            meta_title: "Not found — atelier",
            heading: "atelier",
            username: user.map(|u| u.username.as_str()),
            flash_html: render_flash_error("That piece does not exist."),
            body_html: r#"<p class="note"><a href="/gallery">Back to the gallery</a></p>"#
                .to_string(),
        })),
    )
}

fn server_error_page(user: Option<&AuthUser>) -> (StatusCode, Html<String>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(render_page(PageLayout {
            meta_title: "Error — atelier",
            heading: "atelier",
            username: user.map(|u| u.username.as_str()),
            flash_html: render_flash_error("Something went wrong, please try again later."),
            body_html: String::new(),
        })),
    )
}

struct PieceFormView<'a> {
    heading: &'a str,
    action: String,
    submit_label: &'a str,
    title: &'a str,
    description: &'a str,
    current_image: Option<&'a str>,
}

impl<'a> PieceFormView<'a> {
    fn new_piece() -> Self {
        Self {
            heading: "New piece",
            action: "/gallery/pieces".to_string(),
            submit_label: "Create piece",
            title: "",
            description: "",
            current_image: None,
        }
    }

    fn edit_piece(piece: &'a PieceRow) -> Self {
        Self {
            heading: "Edit piece",
            action: format!("/gallery/pieces/{}/edit", piece.id),
            submit_label: "Save changes",
            title: &piece.title,
            description: &piece.description,
            current_image: Some(&piece.image_path),
        }
    }
}

fn render_piece_form(user: &AuthUser, view: &PieceFormView<'_>, flash_html: String) -> String {
    let current_image_html = view
        .current_image
        .map(|image_path| {
            format!(
                r#"<label>Current image</label>
                <img src="/media/{image_path}" alt="current image" style="max-width: 240px; border-radius: 8px; display: block;">
                <p class="note">Leave the file field empty to keep this image.</p>"#,
                image_path = escape_html(image_path),
            )
        })
        .unwrap_or_default();

    let body = format!(
        r#"<section class="panel">
            <h2>{heading}</h2>
            <form method="post" action="{action}" enctype="multipart/form-data">
                <label for="title">Title</label>
                <input id="title" type="text" name="title" value="{title}" required>
                <label for="description">Description</label>
                <textarea id="description" name="description">{description}</textarea>
                {current_image_html}
                <label for="image">Image (jpg/jpeg)</label>
                <input id="image" type="file" name="image" accept=".jpg,.jpeg">
                <button type="submit">{submit_label}</button>
            </form>
        </section>"#,
        heading = escape_html(view.heading),
        action = view.action,
        title = escape_html(view.title),
        description = escape_html(view.description),
        current_image_html = current_image_html,
        submit_label = escape_html(view.submit_label),
    );

    render_page(PageLayout {
        meta_title: "Gallery — atelier",
        heading: "atelier",
        username: Some(&user.username),
        flash_html,
        body_html: body,
    })
}

fn render_gallery_page(user: Option<&AuthUser>, pieces: &[PieceRow], flash_html: String) -> String {
    let cards = pieces
        .iter()
        .map(|piece| {
            let actions = match user {
                Some(user) if user.id == piece.owner_id => format!(
                    r#"<div class="piece-actions">
                        <a href="/gallery/pieces/{id}/edit">Edit</a>
                        <form method="post" action="/gallery/pieces/{id}/delete"><button type="submit">Delete</button></form>
                    </div>"#,
                    id = piece.id,
                ),
                _ => String::new(),
            };
            format!(
                r#"<div class="piece-card">
                    <img src="/media/{image_path}" alt="{title}">
                    <div class="body">
                        <h3>{title}</h3>
                        <p>{description}</p>
                        {actions}
                    </div>
                </div>"#,
                image_path = escape_html(&piece.image_path),
                title = escape_html(&piece.title),
                description = escape_html(&piece.description),
                actions = actions,
            )
        })
        .collect::<String>();

    let new_link = if user.is_some() {
        r#"<p><a href="/gallery/new">Add a new piece</a></p>"#
    } else {
        r#"<p class="note"><a href="/login">Log in</a> to add pieces.</p>"#
    };

    let body = format!(
        r#"<section>
            <h2>Gallery</h2>
            {new_link}
            <div class="piece-grid">
                {cards}
            </div>
        </section>"#,
        new_link = new_link,
        cards = cards,
    );

    render_page(PageLayout {
        meta_title: "Gallery — atelier",
        heading: "atelier",
        username: user.map(|u| u.username.as_str()),
        flash_html,
        body_html: body,
    })
}
