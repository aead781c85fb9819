//! # Form Record Service Module
//!
//! Routes under `/admin/form_record`:
//!
//! *   **`GET /{form_id}`**: `index::process`, the records of a form with its
//!     fields and the pending admin messages.
//! *   **`GET /edit/{form_id}/{id}`**: `edit::process`, one record resolved
//!     against the fields of its form.
//! *   **`POST /save/{form_id}`**: `save::process`, creates or updates a
//!     record from a `SaveRecordRequest`.
//!
//! An unknown form redirects to `/admin/forms`, an unknown record to the
//! record listing of its form.

mod edit;
mod index;
mod save;

use actix_web::web::{get, post, scope};
use actix_web::Scope;

const API_PATH: &str = "/admin/form_record";

pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("/{form_id}", get().to(index::process))
        .route("/edit/{form_id}/{id}", get().to(edit::process))
        .route("/save/{form_id}", post().to(save::process))
}
