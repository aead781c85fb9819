use crate::error::FormsError;
use crate::message_manager::state::MessagesState;
use crate::resource::{FormContext, FormRecordResource};
use crate::services::{
    init_form, init_record, records_index, redirect, redirect_with_error, unavailable, AppState,
    FORMS_INDEX,
};
use actix_web::{web, Responder};
use common::model::record::Record;
use common::requests::SaveRecordRequest;
use log::info;

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
    form_id: web::Path<u32>,
    payload: web::Json<SaveRecordRequest>,
) -> impl Responder {
    let form_id = form_id.into_inner();
    let conn = match state.database.connect() {
        Ok(conn) => conn,
        Err(e) => return unavailable(e),
    };
    let form = match init_form(&conn, form_id) {
        Ok(form) => form,
        Err(e) => return redirect_with_error(&messages, FORMS_INDEX, e).await,
    };
    let listing = records_index(form_id);
    let ctx = FormContext::for_form(form);
    let mut resource = FormRecordResource::new(&conn);
    let payload = payload.into_inner();

    let mut record = match payload.id {
        Some(id) => match init_record(&mut resource, &ctx, id) {
            Ok(record) => record,
            Err(e) => return redirect_with_error(&messages, &listing, e).await,
        },
        None => Record::new(form_id),
    };

    let saved = resource
        .values_from_json(&ctx, &payload.values)
        .and_then(|values| {
            record.values.extend(values);
            resource.save(&ctx, &mut record)
        });

    match saved {
        Ok(id) => {
            info!("saved record {} of form {}", id, form_id);
            messages.add_success("You saved the record.").await;
            redirect(&listing)
        }
        Err(e @ (FormsError::Validation(_) | FormsError::NotFound(_))) => {
            redirect_with_error(&messages, &listing, e).await
        }
        Err(e) => unavailable(e),
    }
}
