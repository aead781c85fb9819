//! # Form Field Service Module
//!
//! Routes under `/admin/form_field`:
//!
//! *   **`GET /edit/{id}`**: `edit::process`, one field with its page title.
//!     An unknown id redirects to the form listing with an error message.
//! *   **`POST /save/{form_id}`**: `save::process`, creates or updates a field
//!     of the form from a `SaveAttributeRequest`.

mod edit;
mod save;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/admin/form_field";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/edit/{id}", get().to(edit::process))
        .route("/save/{form_id}", post().to(save::process))
}

pub(crate) fn edit_path(id: u32) -> String {
    format!("{API_PATH}/edit/{id}")
}
