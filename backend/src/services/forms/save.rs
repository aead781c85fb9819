use crate::error::FormsError;
use crate::message_manager::state::MessagesState;
use crate::resource::FormResource;
use crate::services::{init_form, redirect, redirect_with_error, unavailable, AppState, FORMS_INDEX};
use actix_web::{web, Responder};
use common::model::form::Form;
use common::requests::SaveFormRequest;
use log::info;

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
    payload: web::Json<SaveFormRequest>,
) -> impl Responder {
    let conn = match state.database.connect() {
        Ok(conn) => conn,
        Err(e) => return unavailable(e),
    };
    let payload = payload.into_inner();

    let mut form = match payload.id {
        Some(id) => match init_form(&conn, id) {
            Ok(form) => form,
            Err(e) => return redirect_with_error(&messages, FORMS_INDEX, e).await,
        },
        None => Form::new(""),
    };
    form.title = payload.title;
    form.identifier = payload.identifier;

    match FormResource::new(&conn).save(&mut form) {
        Ok(id) => {
            info!("saved form {}", id);
            messages.add_success("You saved the form.").await;
            redirect(FORMS_INDEX)
        }
        Err(e @ (FormsError::Validation(_) | FormsError::NotFound(_))) => {
            redirect_with_error(&messages, FORMS_INDEX, e).await
        }
        Err(e) => unavailable(e),
    }
}
