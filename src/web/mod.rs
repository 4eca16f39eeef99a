pub mod auth;
pub mod landing;
pub mod models;
pub mod responses;
pub mod router;
pub mod state;
pub mod storage;
pub mod templates;
pub mod uploads;

pub use auth::{AuthUser, SESSION_COOKIE, SESSION_TTL_DAYS};
pub use models::{ExhibitionRow, PieceRow};
pub use responses::{ApiMessage, json_error};
pub use state::AppState;
pub use templates::{
    PageLayout, escape_html, render_flash_error, render_flash_success, render_footer,
    render_login_page, render_page, render_register_page,
};
