use crate::message_manager::state::{AdminMessage, MessagesState};
use crate::resource::FormResource;
use crate::services::{unavailable, AppState};
use actix_web::{web, HttpResponse, Responder};
use common::model::form::Form;
use serde::Serialize;

#[derive(Serialize)]
struct FormsPage {
    title: &'static str,
    messages: Vec<AdminMessage>,
    forms: Vec<Form>,
}

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
) -> impl Responder {
    let forms = match state
        .database
        .connect()
        .map_err(|e| e.to_string())
        .and_then(|conn| FormResource::new(&conn).list().map_err(|e| e.to_string()))
    {
        Ok(forms) => forms,
        Err(e) => return unavailable(e),
    };

    HttpResponse::Ok().json(FormsPage {
        title: "Forms",
        messages: messages.drain().await,
        forms,
    })
}
