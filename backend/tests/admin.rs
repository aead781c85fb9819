mod support;

use actix_web::http::header::LOCATION;
use actix_web::http::StatusCode;
use actix_web::{test, App};
use common::model::value::BackendType;
use custom_forms_backend::message_manager::state::{MessageType, MessagesState};
use custom_forms_backend::services::AppState;
use serde_json::{json, Value};
use support::{create_field, create_form, migrated_database};

fn location(resp: &actix_web::dev::ServiceResponse) -> Option<String> {
    resp.headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[actix_web::test]
async fn unknown_field_redirects_with_message() -> anyhow::Result<()> {
    let (dir, database) = migrated_database()?;
    let messages = MessagesState::new();
    let state = AppState {
        database,
        media_root: dir.path().join("media"),
    };
    let app = test::init_service(
        App::new().configure(custom_forms_backend::configure(state, messages.clone())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/admin/form_field/edit/99")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp).as_deref(), Some("/admin/forms"));

    let pending = messages.drain().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message_type, MessageType::Error);
    assert_eq!(pending[0].text, "This field no longer exists.");
    Ok(())
}

#[actix_web::test]
async fn field_edit_page_uses_the_label_in_its_title() -> anyhow::Result<()> {
    let (dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let field = create_field(&conn, &form, "email_address", BackendType::Varchar, 10)?;

    let state = AppState {
        database,
        media_root: dir.path().join("media"),
    };
    let app = test::init_service(
        App::new().configure(custom_forms_backend::configure(state, MessagesState::new())),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/admin/form_field/edit/{}", field.id.unwrap()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["title"], "Edit Form Field email address");
    assert_eq!(body["field"]["attribute_code"], "email_address");
    Ok(())
}

#[actix_web::test]
async fn forms_are_saved_and_listed() -> anyhow::Result<()> {
    let (dir, database) = migrated_database()?;
    let state = AppState {
        database,
        media_root: dir.path().join("media"),
    };
    let app = test::init_service(
        App::new().configure(custom_forms_backend::configure(state, MessagesState::new())),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/admin/forms/save")
        .set_json(json!({"title": "Contact", "identifier": "contact"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::post()
        .uri("/admin/forms/save")
        .set_json(json!({"title": "Other", "identifier": "contact"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/admin/forms").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["forms"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["forms"][0]["title"], "Contact");
    assert_eq!(body["messages"][0]["message_type"], "success");
    assert_eq!(body["messages"][1]["message_type"], "error");
    assert_eq!(
        body["messages"][1]["text"],
        "A form with identifier 'contact' already exists."
    );
    Ok(())
}

#[actix_web::test]
async fn records_flow_through_the_admin() -> anyhow::Result<()> {
    let (dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let form_id = form.id.unwrap();
    create_field(&conn, &form, "email", BackendType::Varchar, 10)?;
    drop(conn);

    let messages = MessagesState::new();
    let state = AppState {
        database,
        media_root: dir.path().join("media"),
    };
    let app = test::init_service(
        App::new().configure(custom_forms_backend::configure(state, messages.clone())),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/admin/form_record/save/{form_id}"))
        .set_json(json!({"values": {"email": "ada@example.com"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        Some(format!("/admin/form_record/{form_id}"))
    );

    let req = test::TestRequest::get()
        .uri(&format!("/admin/form_record/{form_id}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["title"], "Contact");
    assert_eq!(body["fields"][0]["attribute_code"], "email");
    let record_id = body["records"][0]["id"].as_u64().unwrap();
    assert_eq!(
        body["records"][0]["values"]["email"],
        json!({"type": "varchar", "value": "ada@example.com"})
    );

    let req = test::TestRequest::get()
        .uri(&format!("/admin/form_record/edit/{form_id}/{record_id}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["title"], "Contact");
    assert!(body["upload_dir"]
        .as_str()
        .is_some_and(|dir| dir.contains("alekseon_custom_forms")));

    // unknown record goes back to the record listing
    let req = test::TestRequest::get()
        .uri(&format!("/admin/form_record/edit/{form_id}/999"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        location(&resp),
        Some(format!("/admin/form_record/{form_id}"))
    );

    // unknown form goes back to the form listing
    let req = test::TestRequest::get()
        .uri("/admin/form_record/999")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp).as_deref(), Some("/admin/forms"));

    let pending = messages.drain().await;
    assert_eq!(
        pending.iter().map(|m| m.text.as_str()).collect::<Vec<_>>(),
        vec!["This record no longer exists.", "This form no longer exists."]
    );
    Ok(())
}

#[actix_web::test]
async fn new_fields_are_appended_to_the_form() -> anyhow::Result<()> {
    let (dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let form_id = form.id.unwrap();
    create_field(&conn, &form, "email", BackendType::Varchar, 40)?;

    let state = AppState {
        database: database.clone(),
        media_root: dir.path().join("media"),
    };
    let app = test::init_service(
        App::new().configure(custom_forms_backend::configure(state, MessagesState::new())),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/admin/form_field/save/{form_id}"))
        .set_json(json!({
            "attribute_code": "phone",
            "frontend_label": "Phone",
            "backend_type": "varchar",
            "is_required": true
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let target = location(&resp).unwrap();
    assert!(target.starts_with("/admin/form_field/edit/"));

    let req = test::TestRequest::get().uri(&target).to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["field"]["sort_order"], 50);
    assert_eq!(body["field"]["is_required"], true);
    assert_eq!(body["field"]["input_visibility"], "visible");
    Ok(())
}
