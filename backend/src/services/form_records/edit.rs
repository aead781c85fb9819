use crate::message_manager::state::MessagesState;
use crate::resource::{FormContext, FormRecordResource};
use crate::services::{
    init_form, init_record, records_index, redirect_with_error, unavailable, AppState, FORMS_INDEX,
};
use actix_web::{web, HttpResponse, Responder};
use common::model::attribute::Attribute;
use common::model::record::Record;
use serde::Serialize;

#[derive(Serialize)]
struct RecordPage {
    title: String,
    /// Directory uploads of this form land in.
    upload_dir: String,
    fields: Vec<Attribute>,
    record: Record,
}

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
    path: web::Path<(u32, u32)>,
) -> impl Responder {
    let (form_id, id) = path.into_inner();
    let conn = match state.database.connect() {
        Ok(conn) => conn,
        Err(e) => return unavailable(e),
    };
    let form = match init_form(&conn, form_id) {
        Ok(form) => form,
        Err(e) => return redirect_with_error(&messages, FORMS_INDEX, e).await,
    };

    let title = form.title.clone();
    let ctx = FormContext::for_form(form);
    let mut resource = FormRecordResource::new(&conn);
    let record = match init_record(&mut resource, &ctx, id) {
        Ok(record) => record,
        Err(e) => return redirect_with_error(&messages, &records_index(form_id), e).await,
    };
    let fields = match resource.load_all_attributes(&ctx) {
        Ok(fields) => fields.to_vec(),
        Err(e) => return unavailable(e),
    };

    HttpResponse::Ok().json(RecordPage {
        title,
        upload_dir: state
            .media_root
            .join(resource.images_dir_name(&ctx))
            .display()
            .to_string(),
        fields,
        record,
    })
}
