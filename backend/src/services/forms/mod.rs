//! # Form Service Module
//!
//! Routes under `/admin/forms`:
//!
//! *   **`GET /`**: `index::process`, every form plus the pending admin messages.
//! *   **`POST /save`**: `save::process`, creates or updates a form from a
//!     `SaveFormRequest` and redirects back to the listing.

mod index;
mod save;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/admin/forms";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", get().to(index::process))
        .route("/save", post().to(save::process))
}
