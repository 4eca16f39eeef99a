use axum::{
    Router,
    extract::{Form, Path as AxumPath, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::{
    access::{AccessError, Identity, authorize_mutation, require_user},
    validation::{ValidationError, validate_exhibition},
    web::{
        AppState, AuthUser, ExhibitionRow, PageLayout, auth, escape_html, render_flash_error,
        render_flash_success, render_login_page, render_page,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/exhibitions",
            get(exhibitions_page).post(create_exhibition),
        )
        .route("/exhibitions/new", get(new_exhibition_page))
        .route(
            "/exhibitions/:id/edit",
            get(edit_exhibition_page).post(update_exhibition),
        )
}

#[derive(Debug, Error)]
pub enum ExhibitionError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("exhibition not found")]
    NotFound,
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Deserialize)]
pub struct ExhibitionForm {
    pub title: String,
    pub description: String,
}

/// Create an exhibition owned by the caller.
pub async fn submit_exhibition(
    pool: &SqlitePool,
    identity: Identity,
    form: &ExhibitionForm,
) -> Result<ExhibitionRow, ExhibitionError> {
    let owner_id = require_user(identity)?;
    validate_exhibition(&form.title, &form.description)?;

    let now = chrono::Utc::now();
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO exhibitions (id, owner_id, title, description, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(owner_id)
    .bind(&form.title)
    .bind(&form.description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(ExhibitionRow {
        id,
        owner_id,
        title: form.title.clone(),
        description: form.description.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Edit an exhibition: lookup, authorize, validate. A validation failure
/// leaves the stored row untouched.
pub async fn revise_exhibition(
    pool: &SqlitePool,
    identity: Identity,
    exhibition_id: Uuid,
    form: &ExhibitionForm,
) -> Result<ExhibitionRow, ExhibitionError> {
    let exhibition = fetch_exhibition(pool, exhibition_id)
        .await?
        .ok_or(ExhibitionError::NotFound)?;

    authorize_mutation(identity, exhibition.owner_id)?;
    validate_exhibition(&form.title, &form.description)?;

    let now = chrono::Utc::now();
    sqlx::query("UPDATE exhibitions SET title = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&form.title)
        .bind(&form.description)
        .bind(now)
        .bind(exhibition_id)
        .execute(pool)
        .await?;

    Ok(ExhibitionRow {
        id: exhibition.id,
        owner_id: exhibition.owner_id,
        title: form.title.clone(),
        description: form.description.clone(),
        created_at: exhibition.created_at,
        updated_at: now,
    })
}

pub async fn fetch_exhibition(
    pool: &SqlitePool,
    exhibition_id: Uuid,
) -> sqlx::Result<Option<ExhibitionRow>> {
    sqlx::query_as::<_, ExhibitionRow>(
        "SELECT id, owner_id, title, description, created_at, updated_at
         FROM exhibitions WHERE id = ?",
    )
    .bind(exhibition_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_exhibitions(pool: &SqlitePool, limit: i64) -> sqlx::Result<Vec<ExhibitionRow>> {
    sqlx::query_as::<_, ExhibitionRow>(
        "SELECT id, owner_id, title, description, created_at, updated_at
         FROM exhibitions ORDER BY created_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[derive(Default, Deserialize)]
pub struct ExhibitionsQuery {
    pub status: Option<String>,
}

async fn exhibitions_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<ExhibitionsQuery>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let user = auth::current_user(&state, &jar).await;

    let exhibitions = list_exhibitions(state.pool_ref(), 100).await.map_err(|err| {
        error!(?err, "failed to list exhibitions");
        server_error_page(user.as_ref())
    })?;

    let flash = match params.status.as_deref() {
        Some("created") => render_flash_success("Exhibition created."),
        Some("updated") => render_flash_success("Exhibition updated."),
        _ => String::new(),
    };

    Ok(Html(render_exhibitions_page(
        user.as_ref(),
        &exhibitions,
        flash,
    )))
}

async fn new_exhibition_page(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Html<String>, Redirect> {
    let Some(user) = auth::current_user(&state, &jar).await else {
        return Err(Redirect::to("/login"));
    };

    Ok(Html(render_exhibition_form(
        &user,
        &ExhibitionFormView::new_exhibition(),
        String::new(),
    )))
}

async fn create_exhibition(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<ExhibitionForm>,
) -> Result<Redirect, (StatusCode, Html<String>)> {
    let user = auth::current_user(&state, &jar).await;
    let identity = match &user {
        Some(user) => Identity::User(user.id),
        None => Identity::Anonymous,
    };

    match submit_exhibition(state.pool_ref(), identity, &form).await {
        Ok(_) => Ok(Redirect::to("/exhibitions?status=created")),
        Err(ExhibitionError::Access(AccessError::Unauthenticated)) => Err(unauthenticated_page()),
        Err(ExhibitionError::Validation(err)) => {
            let user = user.expect("validation implies an authenticated caller");
            let mut view = ExhibitionFormView::new_exhibition();
            view.title = &form.title;
            view.description = &form.description;
            Err((
                StatusCode::BAD_REQUEST,
                Html(render_exhibition_form(
                    &user,
                    &view,
                    render_flash_error(&err.to_string()),
                )),
            ))
        }
        Err(err) => {
            error!(?err, "failed to create exhibition");
            Err(server_error_page(user.as_ref()))
        }
    }
}

async fn edit_exhibition_page(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(exhibition_id): AxumPath<Uuid>,
) -> Result<Html<String>, Response> {
    // Anonymous visitors are sent to the login form, like /exhibitions/new.
    let Some(user) = auth::current_user(&state, &jar).await else {
        return Err(Redirect::to("/login").into_response());
    };

    let exhibition = fetch_exhibition(state.pool_ref(), exhibition_id)
        .await
        .map_err(|err| {
            error!(?err, %exhibition_id, "failed to load exhibition");
            server_error_page(Some(&user)).into_response()
        })?
        .ok_or_else(|| not_found_page(Some(&user)).into_response())?;

    if let Err(err) = authorize_mutation(Identity::User(user.id), exhibition.owner_id) {
        return Err(access_error_response(Some(&user), err));
    }

    Ok(Html(render_exhibition_form(
        &user,
        &ExhibitionFormView::edit_exhibition(&exhibition),
        String::new(),
    )))
}

async fn update_exhibition(
    State(state): State<AppState>,
    jar: CookieJar,
    AxumPath(exhibition_id): AxumPath<Uuid>,
    Form(form): Form<ExhibitionForm>,
) -> Response {
    let user = auth::current_user(&state, &jar).await;
    let identity = match &user {
        Some(user) => Identity::User(user.id),
        None => Identity::Anonymous,
    };

    match revise_exhibition(state.pool_ref(), identity, exhibition_id, &form).await {
        Ok(_) => Redirect::to("/exhibitions?status=updated").into_response(),
        Err(ExhibitionError::Validation(err)) => {
            // A failed edit renders the stored, unchanged values again.
            let user = user.expect("validation implies an authorized caller");
            match fetch_exhibition(state.pool_ref(), exhibition_id).await {
                Ok(Some(exhibition)) => Html(render_exhibition_form(
                    &user,
                    &ExhibitionFormView::edit_exhibition(&exhibition),
                    render_flash_error(&err.to_string()),
                ))
                .into_response(),
                Ok(None) => not_found_page(Some(&user)).into_response(),
                Err(err) => {
                    error!(?err, %exhibition_id, "failed to reload exhibition");
                    server_error_page(Some(&user)).into_response()
                }
            }
        }
        Err(ExhibitionError::Access(err)) => access_error_response(user.as_ref(), err),
        Err(ExhibitionError::NotFound) => not_found_page(user.as_ref()).into_response(),
        Err(err) => {
            error!(?err, %exhibition_id, "failed to update exhibition");
            server_error_page(user.as_ref()).into_response()
        }
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
                flash_html: render_flash_error("Only the owner may modify this exhibition."),
                body_html: r#"<p class="note"><a href="/exhibitions">Back to exhibitions</a></p>"#
                    .to_string(),
            })),
        )
            .into_response(),
    }
}

fn not_found_page(user: Option<&AuthUser>) -> (StatusCode, Html<String>) {
    (
        StatusCode::NOT_FOUND,
        Html(render_page(PageLayout {
            meta_title: "Not found — atelier",
            heading: "atelier",
            username: user.map(|u| u.username.as_str()),
            flash_html: render_flash_error("That exhibition does not exist."),
            body_html: r#"<p class="note"><a href="/exhibitions">Back to exhibitions</a></p>"#
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

struct ExhibitionFormView<'a> {
    heading: &'a str,
    action: String,
    submit_label: &'a str,
    title: &'a str,
    description: &'a str,
}

impl<'a> ExhibitionFormView<'a> {
    fn new_exhibition() -> Self {
        Self {
            heading: "New exhibition",
            action: "/exhibitions".to_string(),
            submit_label: "Create exhibition",
            title: "",
            description: "",
        }
    }

    fn edit_exhibition(exhibition: &'a ExhibitionRow) -> Self {
        Self {
            heading: "Edit exhibition",
            action: format!("/exhibitions/{}/edit", exhibition.id),
            submit_label: "Save changes",
            title: &exhibition.title,
            description: &exhibition.description,
        }
    }
}

fn render_exhibition_form(
    user: &AuthUser,
    view: &ExhibitionFormView<'_>,
    flash_html: String,
) -> String {
    let body = format!(
        r#"<section class="panel">
            <h2>{heading}</h2>
            <form method="post" action="{action}">
                <label for="title">Title</label>
                <input id="title" type="text" name="title" value="{title}" required>
                <label for="description">Description</label>
                <textarea id="description" name="description">{description}</textarea>
                <button type="submit">{submit_label}</button>
            </form>
        </section>"#,
        heading = escape_html(view.heading),
        action = view.action,
        title = escape_html(view.title),
        description = escape_html(view.description),
        submit_label = escape_html(view.submit_label),
    );

    render_page(PageLayout {
        meta_title: "Exhibitions — atelier",
        heading: "atelier",
        username: Some(&user.username),
        flash_html,
        body_html: body,
    })
}

fn render_exhibitions_page(
    user: Option<&AuthUser>,
    exhibitions: &[ExhibitionRow],
    flash_html: String,
) -> String {
    let items = exhibitions
        .iter()
        .map(|exhibition| {
            let edit_link = match user {
                Some(user) if user.id == exhibition.owner_id => format!(
                    r#"<a href="/exhibitions/{id}/edit">Edit</a>"#,
                    id = exhibition.id,
                ),
                _ => String::new(),
            };
            format!(
                r#"<li>
                    <h3>{title}</h3>
                    <p>{description}</p>
                    {edit_link}
                </li>"#,
                title = escape_html(&exhibition.title),
                description = escape_html(&exhibition.description),
                edit_link = edit_link,
            )
        })
        .collect::<String>();

    let new_link = if user.is_some() {
        r#"<p><a href="/exhibitions/new">Add a new exhibition</a></p>"#
    } else {
        r#"<p class="note"><a href="/login">Log in</a> to add exhibitions.</p>"#
    };

    let body = format!(
        r#"<section>
            <h2>Exhibitions</h2>
            {new_link}
            <ul class="exhibition-list">
                {items}
            </ul>
        </section>"#,
        new_link = new_link,
        items = items,
    );

    render_page(PageLayout {
        meta_title: "Exhibitions — atelier",
        heading: "atelier",
        username: user.map(|u| u.username.as_str()),
        flash_html,
        body_html: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::validation::{DESCRIPTION_MAX, EXHIBITION_TITLE_MAX};
    use axum::http::header;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        pool
    }

    async fn create_user(pool: &SqlitePool, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(username)
        .bind("test-hash")
        .bind(chrono::Utc::now())
        .execute(pool)
        .await
        .expect("insert user");
        id
    }

    fn form(title: &str, description: &str) -> ExhibitionForm {
        ExhibitionForm {
            title: title.to_string(),
            description: description.to_string(),
        }
    }

    async fn exhibition_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM exhibitions")
            .fetch_one(pool)
            .await
            .expect("count exhibitions")
    }

    #[tokio::test]
    async fn anonymous_create_persists_nothing() {
        let pool = test_pool().await;

        let result = submit_exhibition(&pool, Identity::Anonymous, &form("title", "desc")).await;
        assert!(matches!(
            result,
            Err(ExhibitionError::Access(AccessError::Unauthenticated))
        ));
        assert_eq!(exhibition_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn create_title_boundary() {
        let pool = test_pool().await;
        let owner = create_user(&pool, "alice").await;

        let at_max = "x".repeat(EXHIBITION_TITLE_MAX);
        let created = submit_exhibition(&pool, Identity::User(owner), &form(&at_max, "desc"))
            .await
            .expect("create exhibition");
        assert_eq!(created.title, at_max);
        assert_eq!(created.owner_id, owner);

        let over = "x".repeat(EXHIBITION_TITLE_MAX + 1);
        let result = submit_exhibition(&pool, Identity::User(owner), &form(&over, "desc")).await;
        assert!(matches!(
            result,
            Err(ExhibitionError::Validation(ValidationError::TitleTooLong { .. }))
        ));
        assert_eq!(exhibition_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn create_with_overlong_description_fails() {
        let pool = test_pool().await;
        let owner = create_user(&pool, "alice").await;

        let over = "d".repeat(DESCRIPTION_MAX + 1);
        let result = submit_exhibition(&pool, Identity::User(owner), &form("title", &over)).await;
        assert!(matches!(
            result,
            Err(ExhibitionError::Validation(
                ValidationError::DescriptionTooLong { .. }
            ))
        ));
        assert_eq!(exhibition_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn non_owner_edit_is_forbidden_and_leaves_row_unchanged() {
        let pool = test_pool().await;
        let owner = create_user(&pool, "alice").await;
        let intruder = create_user(&pool, "mallory").await;

        let exhibition =
            submit_exhibition(&pool, Identity::User(owner), &form("original", "original"))
                .await
                .expect("create exhibition");

        let result = revise_exhibition(
            &pool,
            Identity::User(intruder),
            exhibition.id,
            &form("hijacked", "hijacked"),
        )
        .await;
        assert!(matches!(
            result,
            Err(ExhibitionError::Access(AccessError::Forbidden))
        ));

        let stored = fetch_exhibition(&pool, exhibition.id)
            .await
            .expect("fetch")
            .expect("exhibition exists");
        assert_eq!(stored.title, "original");
        assert_eq!(stored.description, "original");
        assert_eq!(stored.owner_id, owner);
    }

    #[tokio::test]
    async fn failed_edit_leaves_row_unchanged() {
        let pool = test_pool().await;
        let owner = create_user(&pool, "alice").await;

        let exhibition = submit_exhibition(&pool, Identity::User(owner), &form("keep", "keep"))
            .await
            .expect("create exhibition");

        let over = "d".repeat(DESCRIPTION_MAX + 1);
        let result = revise_exhibition(
            &pool,
            Identity::User(owner),
            exhibition.id,
            &form("new", &over),
        )
        .await;
        assert!(matches!(result, Err(ExhibitionError::Validation(_))));

        let stored = fetch_exhibition(&pool, exhibition.id)
            .await
            .expect("fetch")
            .expect("exhibition exists");
        assert_eq!(stored.title, "keep");
        assert_eq!(stored.description, "keep");
    }

    #[tokio::test]
    async fn owner_edit_updates_fields() {
        let pool = test_pool().await;
        let owner = create_user(&pool, "alice").await;

        let exhibition = submit_exhibition(&pool, Identity::User(owner), &form("old", "old"))
            .await
            .expect("create exhibition");

        let updated = revise_exhibition(
            &pool,
            Identity::User(owner),
            exhibition.id,
            &form("new title", "new description"),
        )
        .await
        .expect("edit exhibition");

        assert_eq!(updated.title, "new title");
        assert_eq!(updated.description, "new description");
        assert_eq!(updated.owner_id, owner);

        let stored = fetch_exhibition(&pool, exhibition.id)
            .await
            .expect("fetch")
            .expect("exhibition exists");
        assert_eq!(stored.title, "new title");
    }

    #[tokio::test]
    async fn anonymous_edit_form_redirects_to_login() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            media_root: dir.path().to_string_lossy().into_owned(),
            max_image_bytes: 1024,
            port: 0,
        };
        let state = AppState::new(&config).await.expect("build state");

        let response =
            edit_exhibition_page(State(state), CookieJar::new(), AxumPath(Uuid::new_v4()))
                .await
                .err()
                .expect("anonymous caller is redirected");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/login")
        );
    }

    #[tokio::test]
    async fn edit_of_unknown_exhibition_is_not_found() {
        let pool = test_pool().await;
        let owner = create_user(&pool, "alice").await;

        let result = revise_exhibition(
            &pool,
            Identity::User(owner),
            Uuid::new_v4(),
            &form("title", "desc"),
        )
        .await;
        assert!(matches!(result, Err(ExhibitionError::NotFound)));
    }
}
