use crate::message_manager::state::MessagesState;
use crate::services::{init_attribute, redirect_with_error, unavailable, AppState, FORMS_INDEX};
use actix_web::{web, HttpResponse, Responder};
use common::model::attribute::Attribute;
use serde::Serialize;

#[derive(Serialize)]
struct FieldPage {
    title: String,
    field: Attribute,
}

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
    id: web::Path<u32>,
) -> impl Responder {
    let conn = match state.database.connect() {
        Ok(conn) => conn,
        Err(e) => return unavailable(e),
    };
    match init_attribute(&conn, id.into_inner()) {
        Ok(field) => HttpResponse::Ok().json(FieldPage {
            title: format!("Edit Form Field {}", field.frontend_label),
            field,
        }),
        Err(e) => redirect_with_error(&messages, FORMS_INDEX, e).await,
    }
}
