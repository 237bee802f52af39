pub mod content;
pub mod content_directory;
pub mod description;
pub mod soap;
pub mod state;
pub mod thumb;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use crate::http::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Device and service description XML
        .route("/device.xml", get(description::serve_device_xml))
        .route("/cds/scpd.xml", get(description::serve_cds_scpd))
        .route("/cms/scpd.xml", get(description::serve_cms_scpd))
        // UPnP control endpoints (action dispatch)
        .route("/cds/control", axum::routing::post(content_directory::cds_control))
        .route("/cms/control", axum::routing::post(crate::cms::cms_control))
        // Everything else is a catalog id: media bytes, thumbnails,
        // placeholders. GET only — other verbs get 405 from the router.
        .route("/{*id}", get(content::serve_content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
