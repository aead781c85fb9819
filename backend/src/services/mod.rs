//! # Admin Services
//!
//! Thin actix-web handlers over the resources. Every handler opens its own
//! connection and builds fresh resources, so no attribute cache or form
//! context outlives a request.
//!
//! Loading failures never reach actix-web's error handler: the handler logs
//! them, queues the message for the next page and redirects to a listing.

pub mod form_fields;
pub mod form_records;
pub mod forms;

use crate::database::Database;
use crate::error::FormsResult;
use crate::message_manager::state::MessagesState;
use crate::resource::{FormContext, FormRecordResource, FormResource, RecordAttributeResource};
use actix_web::http::header::LOCATION;
use actix_web::HttpResponse;
use common::model::attribute::Attribute;
use common::model::form::Form;
use common::model::record::Record;
use log::warn;
use rusqlite::Connection;
use std::fmt::Display;
use std::path::PathBuf;

/// Listing every load failure falls back to.
pub(crate) const FORMS_INDEX: &str = "/admin/forms";

/// Application state shared by all workers.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub media_root: PathBuf,
}

pub(crate) fn records_index(form_id: u32) -> String {
    format!("/admin/form_record/{form_id}")
}

pub(crate) fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((LOCATION, location))
        .finish()
}

/// Queues `err` for display and redirects to `location`.
pub(crate) async fn redirect_with_error(
    messages: &MessagesState,
    location: &str,
    err: impl Display,
) -> HttpResponse {
    warn!("redirecting to {}: {}", location, err);
    messages.add_error(err.to_string()).await;
    redirect(location)
}

pub(crate) fn unavailable(err: impl Display) -> HttpResponse {
    HttpResponse::ServiceUnavailable().body(format!("Database unavailable: {}", err))
}

pub(crate) fn init_form(conn: &Connection, form_id: u32) -> FormsResult<Form> {
    FormResource::new(conn).load(form_id)
}

pub(crate) fn init_attribute(conn: &Connection, id: u32) -> FormsResult<Attribute> {
    RecordAttributeResource::new(conn).load(id)
}

pub(crate) fn init_record(
    resource: &mut FormRecordResource<'_>,
    ctx: &FormContext,
    id: u32,
) -> FormsResult<Record> {
    resource.load(ctx, id)
}
