use crate::error::FormsError;
use crate::message_manager::state::MessagesState;
use crate::resource::RecordAttributeResource;
use crate::services::form_fields::edit_path;
use crate::services::{
    init_attribute, init_form, records_index, redirect, redirect_with_error, unavailable, AppState,
    FORMS_INDEX,
};
use actix_web::{web, Responder};
use common::model::attribute::Attribute;
use common::requests::SaveAttributeRequest;
use log::info;

pub async fn process(
    state: web::Data<AppState>,
    messages: web::Data<MessagesState>,
    form_id: web::Path<u32>,
    payload: web::Json<SaveAttributeRequest>,
) -> impl Responder {
    let conn = match state.database.connect() {
        Ok(conn) => conn,
        Err(e) => return unavailable(e),
    };
    let form = match init_form(&conn, form_id.into_inner()) {
        Ok(form) => form,
        Err(e) => return redirect_with_error(&messages, FORMS_INDEX, e).await,
    };
    let Some(form_id) = form.id else {
        return redirect(FORMS_INDEX);
    };
    let payload = payload.into_inner();
    let resource = RecordAttributeResource::new(&conn);

    let existing = match payload.id {
        Some(id) => match init_attribute(&conn, id) {
            Ok(field) if field.form_id == Some(form_id) => Some(field),
            Ok(_) => {
                return redirect_with_error(
                    &messages,
                    &records_index(form_id),
                    FormsError::not_found("This field does not belong to the form."),
                )
                .await
            }
            Err(e) => return redirect_with_error(&messages, &records_index(form_id), e).await,
        },
        None => None,
    };

    let sort_order = match (payload.sort_order, &existing) {
        (Some(sort_order), _) => sort_order,
        (None, Some(field)) => field.sort_order,
        (None, None) => match resource.next_sort_order(form_id) {
            Ok(sort_order) => sort_order,
            Err(e) => return unavailable(e),
        },
    };

    let mut field = Attribute {
        id: existing.and_then(|field| field.id),
        form_id: Some(form_id),
        attribute_code: payload.attribute_code,
        frontend_label: payload.frontend_label,
        frontend_input: payload.frontend_input,
        backend_type: payload.backend_type,
        sort_order,
        is_required: payload.is_required,
        identifier: payload.identifier,
        input_visibility: payload.input_visibility,
    };

    match resource.save(&mut field) {
        Ok(id) => {
            info!("saved field {} of form {}", id, form_id);
            messages.add_success("You saved the field.").await;
            redirect(&edit_path(id))
        }
        Err(e @ (FormsError::Validation(_) | FormsError::NotFound(_))) => {
            redirect_with_error(&messages, &records_index(form_id), e).await
        }
        Err(e) => unavailable(e),
    }
}
