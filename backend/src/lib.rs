//! Custom form builder backend: EAV storage of forms, form fields and
//! records, the versioned schema migrations evolving it, and the admin
//! endpoints on top.

pub mod config;
pub mod database;
pub mod entity_type;
pub mod error;
pub mod message_manager;
pub mod resource;
pub mod services;
pub mod setup;

use crate::message_manager::state::MessagesState;
use crate::services::AppState;
use actix_web::web;

/// Registers the shared state and every admin scope on an application.
pub fn configure(state: AppState, messages: MessagesState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::JsonConfig::default().limit(10 * 1024 * 1024)) // 10 MB
            .app_data(web::Data::new(state))
            .app_data(web::Data::new(messages))
            .service(services::forms::configure_routes())
            .service(services::form_fields::configure_routes())
            .service(services::form_records::configure_routes());
    }
}
