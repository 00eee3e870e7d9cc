pub mod admin;
pub mod analysis;
pub mod auth;
pub mod delete_requests;
pub mod families;
pub mod health;
pub mod notifications;
pub mod profile;
pub mod records;
pub mod validation;

use axum::{
    routing::{get, post, put},
    Router,
};
use serde::Serialize;

use crate::AppState;

pub use health::health_check;

/// Body of endpoints that have nothing else to return
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
        }
    }
}

/// All HTTP routes, without the CORS and tracing layers added by the binary
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Account
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/refresh-token", post(auth::refresh_token))
        .route("/me", get(auth::me))
        .route("/forgot-password/question", post(auth::security_question))
        .route("/forgot-password/reset", post(auth::reset_password))
        .route("/profile", put(profile::update_profile))
        .route("/profile/password", put(profile::change_password))
        .route("/profile/security", put(profile::update_security_question))
        // Families
        .route(
            "/families",
            post(families::create_family).get(families::list_families),
        )
        .route("/families/join", post(families::join_family))
        .route(
            "/families/:id",
            get(families::get_family).delete(families::delete_family),
        )
        .route("/families/:id/members", get(families::list_members))
        .route(
            "/families/:id/members/:user_id",
            axum::routing::delete(families::remove_member),
        )
        .route("/families/:id/owner", put(families::transfer_owner))
        .route(
            "/families/:id/records",
            get(records::list_records).post(records::create_record),
        )
        .route("/families/:id/analysis", get(analysis::family_analysis))
        // Records
        .route(
            "/records/:id",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/records/:id/delete-request", post(records::request_delete))
        .route("/delete-requests", get(delete_requests::list_pending))
        .route("/delete-requests/:id/approve", post(delete_requests::approve))
        .route("/delete-requests/:id/reject", post(delete_requests::reject))
        // Notifications
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", put(notifications::mark_all_read))
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route(
            "/notifications/:id",
            axum::routing::delete(notifications::delete),
        )
        .route("/analysis", get(analysis::my_analysis))
        // Administration
        .route("/admin/stats", get(admin::admin_stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", axum::routing::delete(admin::delete_user))
        .route("/admin/users/:id/admin", put(admin::set_admin))
        .route("/admin/notifications", post(admin::send_notification));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
}
