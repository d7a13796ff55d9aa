use axum::{
    Json, Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use serde_json::{Value, json};

use crate::middleware::{authenticate, require_admin, require_editor, require_viewer};
use crate::state::AppState;
use crate::{analytics, auth, campaigns, contacts, templates, users, workspaces};

/// The full HTTP surface. Capability checks sit on each route group; the
/// authentication layer wraps every route except the public ones.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/admin/login", post(auth::admin_login))
        .route("/auth/user/login", post(auth::user_login))
        .route("/auth/user/select-workspace", post(auth::select_workspace));

    let session_routes = Router::new().route("/auth/logout", post(auth::logout));

    let admin_routes = Router::new()
        .route(
            "/workspaces",
            post(workspaces::create_workspace).get(workspaces::list_workspaces),
        )
        .route(
            "/workspaces/{id}",
            get(workspaces::get_workspace)
                .put(workspaces::update_workspace)
                .delete(workspaces::delete_workspace),
        )
        .route(
            "/workspaces/{id}/users",
            post(workspaces::add_workspace_user).get(workspaces::list_workspace_users),
        )
        .route(
            "/workspaces/{id}/users/{user_id}",
            get(workspaces::get_workspace_user)
                .put(workspaces::update_workspace_user)
                .delete(workspaces::remove_workspace_user),
        )
        .route(
            "/workspaces/{id}/available-users",
            get(workspaces::list_available_users),
        )
        .route("/users", post(users::create_user).get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/users/{id}/workspaces/{workspace_id}",
            post(users::assign_workspace).delete(users::remove_from_workspace),
        )
        .route_layer(from_fn(require_admin));

    let viewer_routes = Router::new()
        .route("/contacts", get(contacts::list_contacts))
        .route("/contacts/{id}", get(contacts::get_contact))
        .route("/message-templates", get(templates::list_templates))
        .route("/message-templates/{id}", get(templates::get_template))
        .route("/campaigns", get(campaigns::list_campaigns))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        .route("/analytics/campaigns-per-day", get(analytics::campaigns_per_day))
        .route("/analytics/messages-per-day", get(analytics::messages_per_day))
        .route(
            "/analytics/contacts-reached-per-day",
            get(analytics::contacts_reached_per_day),
        )
        .route("/analytics/recent-campaigns", get(analytics::recent_campaigns))
        .route("/analytics/top-tags", get(analytics::top_tags))
        .route_layer(from_fn(require_viewer));

    let editor_routes = Router::new()
        .route("/contacts", post(contacts::create_contact))
        .route(
            "/contacts/{id}",
            put(contacts::update_contact).delete(contacts::delete_contact),
        )
        .route("/message-templates", post(templates::create_template))
        .route(
            "/message-templates/{id}",
            put(templates::update_template).delete(templates::delete_template),
        )
        .route("/campaigns", post(campaigns::create_campaign))
        .route(
            "/campaigns/{id}",
            put(campaigns::update_campaign).delete(campaigns::delete_campaign),
        )
        .route("/campaigns/{id}/copy", post(campaigns::copy_campaign))
        .route("/campaigns/{id}/launch", post(campaigns::launch_campaign))
        .route_layer(from_fn(require_editor));

    let protected_routes = Router::new()
        .merge(session_routes)
        .merge(admin_routes)
        .merge(viewer_routes)
        .merge(editor_routes)
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
