use axum::{
    extract::{Query, State},
    response::Html,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::error;

use crate::modules::gallery;
use crate::web::{
    AppState, AuthUser, PageLayout, PieceRow, auth, escape_html, render_flash_success,
    render_page,
};

#[derive(Default, Deserialize)]
pub struct LandingQuery {
    pub status: Option<String>,
}

pub async fn landing_page(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<LandingQuery>,
) -> Html<String> {
    let user = auth::current_user(&state, &jar).await;

    let recent = match gallery::list_pieces(state.pool_ref(), 12).await {
        Ok(pieces) => pieces,
        Err(err) => {
            error!(?err, "failed to load recent pieces for landing page");
            Vec::new()
        }
    };

    Html(render_landing(user.as_ref(), &recent, &params))
}

fn render_landing(user: Option<&AuthUser>, recent: &[PieceRow], params: &LandingQuery) -> String {
    let flash = compose_landing_flash(params);

    let intro = match user {
        Some(_) => r#"<p class="note">Add pieces to the gallery or curate an exhibition.</p>"#,
        None => {
            r#"<p class="note">A small gallery for sharing your work. <a href="/register">Register</a> or <a href="/login">log in</a> to add pieces.</p>"#
        }
    };

    let cards = recent
        .iter()
        .map(|piece| {
            format!(
                r#"<div class="piece-card">
                    <img src="/media/{image_path}" alt="{title}">
                    <div class="body">
                        <h3>{title}</h3>
                    </div>
                </div>"#,
                image_path = escape_html(&piece.image_path),
                title = escape_html(&piece.title),
            )
        })
        .collect::<String>();

    let recent_section = if recent.is_empty() {
        r#"<p class="note">No pieces yet.</p>"#.to_string()
    } else {
        format!(r#"<div class="piece-grid">{cards}</div>"#)
    };

    let body = format!(
        r#"<section>
            {intro}
            <h2>Recent pieces</h2>
            {recent_section}
            <p><a href="/gallery">Browse the full gallery</a> · <a href="/exhibitions">Exhibitions</a></p>
        </section>"#,
        intro = intro,
        recent_section = recent_section,
    );

    render_page(PageLayout {
        meta_title: "atelier",
        heading: "atelier",
        username: user.map(|u| u.username.as_str()),
        flash_html: flash,
        body_html: body,
    })
}

fn compose_landing_flash(params: &LandingQuery) -> String {
    match params.status.as_deref() {
        Some("registered") => render_flash_success("Registration successful."),
        Some("logged_out") => render_flash_success("You have been logged out."),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_produce_flashes() {
        let registered = compose_landing_flash(&LandingQuery {
            status: Some("registered".to_string()),
        });
        assert!(registered.contains("Registration successful."));

        let logged_out = compose_landing_flash(&LandingQuery {
            status: Some("logged_out".to_string()),
        });
        assert!(logged_out.contains("You have been logged out."));
    }

    #[test]
    fn unknown_or_missing_status_renders_nothing() {
        assert!(compose_landing_flash(&LandingQuery::default()).is_empty());
        assert!(
            compose_landing_flash(&LandingQuery {
                status: Some("bogus".to_string()),
            })
            .is_empty()
        );
    }
}
