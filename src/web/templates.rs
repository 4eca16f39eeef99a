use chrono::{Datelike, Utc};

const BASE_STYLES: &str = r#"
        :root { color-scheme: light; }
        body { font-family: "Helvetica Neue", Arial, sans-serif; margin: 0; background: #f8fafc; color: #0f172a; }
        header { background: #ffffff; padding: 1.75rem 1.5rem; border-bottom: 1px solid #e2e8f0; }
        .header-bar { display: flex; justify-content: space-between; align-items: center; flex-wrap: wrap; gap: 1rem; }
        .header-bar h1 { margin: 0; font-size: 1.6rem; }
        .header-links { display: flex; gap: 0.75rem; align-items: center; flex-wrap: wrap; }
        .header-links a { color: #1d4ed8; text-decoration: none; font-weight: 600; background: #e0f2fe; padding: 0.45rem 0.9rem; border-radius: 999px; border: 1px solid #bfdbfe; }
        .header-links a:hover { background: #bfdbfe; }
        .header-links span { color: #475569; font-size: 0.95rem; }
        .logout-form { display: inline; }
        .logout-form button { padding: 0.45rem 0.9rem; border: none; border-radius: 999px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        .logout-form button:hover { background: #1d4ed8; }
        main { padding: 2rem 1.5rem; max-width: 960px; margin: 0 auto; box-sizing: border-box; }
        .panel { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; padding: 1.5rem; box-shadow: 0 18px 40px rgba(15, 23, 42, 0.08); margin-bottom: 2rem; }
        .panel h2 { margin-top: 0; }
        label { display: block; margin-top: 1rem; margin-bottom: 0.4rem; font-weight: 600; }
        input[type="text"], input[type="password"], textarea { width: 100%; padding: 0.75rem; border-radius: 8px; border: 1px solid #cbd5f5; background: #f8fafc; color: #0f172a; box-sizing: border-box; font-size: 1rem; }
        input:focus, textarea:focus { outline: none; border-color: #2563eb; box-shadow: 0 0 0 3px rgba(37, 99, 235, 0.12); }
        textarea { min-height: 7rem; resize: vertical; }
        button[type="submit"] { margin-top: 1.5rem; padding: 0.85rem 1.2rem; border: none; border-radius: 8px; background: #2563eb; color: #ffffff; font-weight: 600; cursor: pointer; }
        button[type="submit"]:hover { background: #1d4ed8; }
        .flash { padding: 1rem 1.25rem; border-radius: 10px; margin-bottom: 1.5rem; font-weight: 600; border: 1px solid transparent; }
        .flash.success { background: #ecfdf3; border-color: #bbf7d0; color: #166534; }
        .flash.error { background: #fef2f2; border-color: #fecaca; color: #b91c1c; }
        .piece-grid { display: grid; gap: 1.5rem; grid-template-columns: repeat(auto-fill, minmax(240px, 1fr)); }
        .piece-card { background: #ffffff; border-radius: 12px; border: 1px solid #e2e8f0; overflow: hidden; box-shadow: 0 12px 30px rgba(15, 23, 42, 0.06); }
        .piece-card img { width: 100%; height: 180px; object-fit: cover; display: block; background: #e2e8f0; }
        .piece-card .body { padding: 1rem 1.25rem 1.25rem; }
        .piece-card h3 { margin: 0 0 0.5rem; font-size: 1.05rem; }
        .piece-card p { margin: 0 0 1rem; color: #475569; font-size: 0.92rem; line-height: 1.5; }
        .piece-actions { display: flex; gap: 0.5rem; align-items: center; }
        .piece-actions a { color: #1d4ed8; text-decoration: none; font-weight: 600; font-size: 0.9rem; }
        .piece-actions form { display: inline; }
        .piece-actions button { padding: 0.35rem 0.75rem; border: 1px solid #fecaca; border-radius: 8px; background: #fef2f2; color: #b91c1c; font-weight: 600; cursor: pointer; font-size: 0.85rem; }
        .piece-actions button:hover { background: #fecaca; }
        .exhibition-list { list-style: none; padding: 0; margin: 0; display: grid; gap: 1rem; }
        .exhibition-list li { background: #ffffff; border: 1px solid #e2e8f0; border-radius: 12px; padding: 1.25rem 1.5rem; }
        .exhibition-list h3 { margin: 0 0 0.4rem; }
        .exhibition-list p { margin: 0 0 0.6rem; color: #475569; }
        .note { color: #475569; font-size: 0.95rem; line-height: 1.6; }
        .app-footer { margin-top: 3rem; text-align: center; font-size: 0.85rem; color: #94a3b8; }
        @media (max-width: 768px) {
            header { padding: 1.25rem 1rem; }
            main { padding: 1.5rem 1rem; }
            .header-bar { flex-direction: column; align-items: flex-start; }
        }
"#;

/// Shared page chrome. `user` controls the header links (gallery navigation
/// and logout for signed-in visitors, login/register otherwise).
pub struct PageLayout<'a> {
    pub meta_title: &'a str,
    pub heading: &'a str,
    pub username: Option<&'a str>,
    pub flash_html: String,
    pub body_html: String,
}

pub fn render_page(layout: PageLayout<'_>) -> String {
    let PageLayout {
        meta_title,
        heading,
        username,
        flash_html,
        body_html,
    } = layout;

    let header_links = match username {
        Some(username) => format!(
            r#"<span>Signed in as <strong>{username}</strong></span>
                <a href="/gallery">Gallery</a>
                <a href="/exhibitions">Exhibitions</a>
                <form class="logout-form" method="post" action="/logout"><button type="submit">Log out</button></form>"#,
            username = escape_html(username),
        ),
        None => r#"<a href="/login">Log in</a>
                <a href="/register">Register</a>"#
            .to_string(),
    };

    let footer = render_footer();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{meta_title}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <meta name="robots" content="noindex,nofollow">
    <style>
{styles}
    </style>
</head>
<body>
    <header>
        <div class="header-bar">
            <h1><a href="/" style="color: inherit; text-decoration: none;">{heading}</a></h1>
            <div class="header-links">
                {header_links}
            </div>
        </div>
    </header>
    <main>
        {flash_html}
        {body_html}
        {footer}
    </main>
</body>
</html>"#,
        meta_title = escape_html(meta_title),
        styles = BASE_STYLES,
        heading = escape_html(heading),
        header_links = header_links,
        flash_html = flash_html,
        body_html = body_html,
        footer = footer,
    )
}

pub fn render_flash_error(message: &str) -> String {
    format!(
        r#"<div class="flash error">{}</div>"#,
        escape_html(message)
    )
}

pub fn render_flash_success(message: &str) -> String {
    format!(
        r#"<div class="flash success">{}</div>"#,
        escape_html(message)
    )
}

pub fn render_login_page(error: Option<&str>) -> String {
    let flash = error.map(render_flash_error).unwrap_or_default();
    let body = r#"<section class="panel">
            <h2>Log in</h2>
            <form method="post" action="/login">
                <label for="username">Username</label>
                <input id="username" type="text" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <button type="submit">Log in</button>
            </form>
            <p class="note">No account yet? <a href="/register">Register here</a>.</p>
        </section>"#
        .to_string();

    render_page(PageLayout {
        meta_title: "Log in — atelier",
        heading: "atelier",
        username: None,
        flash_html: flash,
        body_html: body,
    })
}

pub fn render_register_page(error: Option<&str>) -> String {
    let flash = error.map(render_flash_error).unwrap_or_default();
    let body = r#"<section class="panel">
            <h2>Register</h2>
            <form method="post" action="/register">
                <label for="username">Username</label>
                <input id="username" type="text" name="username" required>
                <label for="password">Password</label>
                <input id="password" type="password" name="password" required>
                <label for="password_confirm">Confirm password</label>
                <input id="password_confirm" type="password" name="password_confirm" required>
                <button type="submit">Create account</button>
            </form>
            <p class="note">Already registered? <a href="/login">Log in</a>.</p>
        </section>"#
        .to_string();

    render_page(PageLayout {
        meta_title: "Register — atelier",
        heading: "atelier",
        username: None,
        flash_html: flash,
        body_html: body,
    })
}

pub fn render_footer() -> String {
    let current_year = Utc::now().year();
    format!(
        r#"<footer class="app-footer">© {year} atelier — a small self-hosted gallery</footer>"#,
        year = current_year
    )
}

pub fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
