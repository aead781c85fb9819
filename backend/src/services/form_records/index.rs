use crate::message_manager::state::{AdminMessage, MessagesState};
use crate::resource::{FormContext, FormRecordResource};
use crate::services::{init_form, redirect_with_error, unavailable, AppState, FORMS_INDEX};
use actix_web::{web, HttpResponse, Responder};
use common::model::attribute::Attribute;
use common::model::record::Record;
use serde::Serialize;

#[derive(Serialize)]
struct RecordsPage {
    title: String,
    messages: Vec<AdminMessage>,
    fields: Vec<Attribute>,
    records: Vec<Record>,
}

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
    form_id: web::Path<u32>,
) -> impl Responder {
    let conn = match state.database.connect() {
        Ok(conn) => conn,
        Err(e) => return unavailable(e),
    };
    let form = match init_form(&conn, form_id.into_inner()) {
        Ok(form) => form,
        Err(e) => return redirect_with_error(&messages, FORMS_INDEX, e).await,
    };

    let title = form.title.clone();
    let ctx = FormContext::for_form(form);
    let mut resource = FormRecordResource::new(&conn);
    let page = resource.list(&ctx).and_then(|records| {
        let fields = resource.load_all_attributes(&ctx)?.to_vec();
        Ok((fields, records))
    });

    match page {
        Ok((fields, records)) => HttpResponse::Ok().json(RecordsPage {
            title,
            messages: messages.drain().await,
            fields,
            records,
        }),
        Err(e) => unavailable(e),
    }
}
