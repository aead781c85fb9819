mod support;

use common::model::attribute::{Attribute, InputVisibility};
use common::model::form::Form;
use common::model::record::Record;
use common::model::value::{AttributeValue, BackendType};
use custom_forms_backend::entity_type::FORM_RECORD;
use custom_forms_backend::error::{FormsError, FormsResult};
use custom_forms_backend::resource::{
    AttributeCollectionFactory, AttributeOrder, AttributeQuery, AttributeSource, FormContext,
    FormRecordResource, FormResource, RecordAttributeResource, SortDirection,
};
use serde_json::json;
use std::cell::Cell;
use std::path::Path;
use support::{count, create_field, create_form, migrated_database};

/// Counts how often the attribute collection is queried.
struct CountingSource<'c> {
    inner: AttributeCollectionFactory<'c>,
    calls: &'c Cell<usize>,
}

impl AttributeSource for CountingSource<'_> {
    fn fetch(&self, query: &AttributeQuery) -> FormsResult<Vec<Attribute>> {
        self.calls.set(self.calls.get() + 1);
        self.inner.fetch(query)
    }
}

#[test]
fn forms_round_trip_with_title_and_identifier() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let forms = FormResource::new(&conn);

    let mut form = Form::new("  Contact us ").with_identifier("contact");
    let id = forms.save(&mut form)?;
    assert_eq!(form.title, "Contact us");
    assert!(form.created_at.is_some());

    let loaded = forms.load(id)?;
    assert_eq!(loaded, form);
    assert_eq!(forms.load_by_identifier("contact")?.id, Some(id));

    let mut renamed = loaded.clone();
    renamed.title = "Contact".to_string();
    renamed.identifier = Some("   ".to_string());
    forms.save(&mut renamed)?;
    let reloaded = forms.load(id)?;
    assert_eq!(reloaded.title, "Contact");
    assert_eq!(reloaded.identifier, None);
    assert_eq!(reloaded.created_at, form.created_at);
    Ok(())
}

#[test]
fn duplicate_form_identifier_is_a_validation_error() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let forms = FormResource::new(&conn);
    forms.save(&mut Form::new("First").with_identifier("survey"))?;

    let err = forms
        .save(&mut Form::new("Second").with_identifier("survey"))
        .unwrap_err();
    assert!(matches!(err, FormsError::Validation(_)));
    assert_eq!(
        err.to_string(),
        "A form with identifier 'survey' already exists."
    );
    assert_eq!(forms.list()?.len(), 1);

    // forms without identifier never collide
    forms.save(&mut Form::new("Third"))?;
    forms.save(&mut Form::new("Fourth"))?;
    assert_eq!(forms.list()?.len(), 3);
    Ok(())
}

#[test]
fn missing_form_is_not_found() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let err = FormResource::new(&conn).load(404).unwrap_err();
    assert!(matches!(err, FormsError::NotFound(_)));
    assert_eq!(err.to_string(), "This form no longer exists.");
    Ok(())
}

#[test]
fn fields_get_increasing_sort_orders() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let form_id = form.id.unwrap();
    let fields = RecordAttributeResource::new(&conn);

    assert_eq!(fields.next_sort_order(form_id)?, 10);
    create_field(&conn, &form, "email", BackendType::Varchar, 10)?;
    create_field(&conn, &form, "age", BackendType::Int, 25)?;
    assert_eq!(fields.next_sort_order(form_id)?, 35);

    let mut invalid = Attribute::new("E-mail", "Email", BackendType::Varchar).for_form(form_id);
    assert!(matches!(fields.save(&mut invalid), Err(FormsError::Validation(_))));

    let mut orphan = Attribute::new("email", "Email", BackendType::Varchar);
    assert!(matches!(fields.save(&mut orphan), Err(FormsError::Validation(_))));

    let mut duplicate = Attribute::new("email", "Email", BackendType::Varchar).for_form(form_id);
    assert!(matches!(
        fields.save(&mut duplicate),
        Err(FormsError::Validation(_))
    ));
    Ok(())
}

#[test]
fn field_identifiers_are_unique_per_form() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let contact = create_form(&conn, "Contact")?;
    let survey = create_form(&conn, "Survey")?;
    let fields = RecordAttributeResource::new(&conn);

    let mut first = Attribute::new("contact_email", "Email", BackendType::Varchar)
        .for_form(contact.id.unwrap());
    first.identifier = Some("email".to_string());
    fields.save(&mut first)?;

    let mut other_form = Attribute::new("survey_email", "Email", BackendType::Varchar)
        .for_form(survey.id.unwrap());
    other_form.identifier = Some("email".to_string());
    fields.save(&mut other_form)?;

    let mut same_form = Attribute::new("contact_email_2", "Email", BackendType::Varchar)
        .for_form(contact.id.unwrap());
    same_form.identifier = Some("email".to_string());
    assert!(matches!(
        fields.save(&mut same_form),
        Err(FormsError::Validation(_))
    ));

    let loaded = fields.load(first.id.unwrap())?;
    assert_eq!(loaded, first);
    Ok(())
}

#[test]
fn collection_filters_by_form_and_orders() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let contact = create_form(&conn, "Contact")?;
    let survey = create_form(&conn, "Survey")?;
    create_field(&conn, &contact, "message", BackendType::Text, 30)?;
    create_field(&conn, &contact, "email", BackendType::Varchar, 10)?;
    create_field(&conn, &contact, "name", BackendType::Varchar, 10)?;
    create_field(&conn, &survey, "rating", BackendType::Int, 5)?;

    let factory = AttributeCollectionFactory::new(&conn, FORM_RECORD);
    let attributes = factory.create().add_form_filter(contact.id.unwrap()).load()?;
    let codes: Vec<&str> = attributes.iter().map(|a| a.attribute_code.as_str()).collect();
    assert_eq!(codes, vec!["email", "name", "message"]);
    assert!(attributes.iter().all(|a| a.form_id == contact.id));
    assert!(attributes.windows(2).all(|w| w[0].sort_order <= w[1].sort_order));

    let by_code = factory
        .create()
        .set_order(AttributeOrder::AttributeCode, SortDirection::Desc)
        .load()?;
    let codes: Vec<&str> = by_code.iter().map(|a| a.attribute_code.as_str()).collect();
    assert_eq!(codes, vec!["rating", "name", "message", "email"]);

    // the collection can be iterated again
    assert_eq!(factory.create().load()?.len(), 4);
    Ok(())
}

#[test]
fn attributes_are_loaded_once_per_resource() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let contact = create_form(&conn, "Contact")?;
    let survey = create_form(&conn, "Survey")?;
    create_field(&conn, &contact, "email", BackendType::Varchar, 10)?;

    let calls = Cell::new(0);
    let source = CountingSource {
        inner: AttributeCollectionFactory::new(&conn, FORM_RECORD),
        calls: &calls,
    };
    let mut resource = FormRecordResource::with_source(&conn, source);
    let ctx = FormContext::for_form(contact.clone());
    assert!(!resource.is_loaded());

    let first = resource.load_all_attributes(&ctx)?.clone();
    let second = resource.load_all_attributes(&ctx)?.clone();
    assert_eq!(first, second);
    assert_eq!(first.codes().collect::<Vec<_>>(), vec!["email"]);
    assert_eq!(calls.get(), 1);
    assert!(resource.is_loaded());

    // fields added later are not seen by the same resource
    create_field(&conn, &contact, "name", BackendType::Varchar, 20)?;
    assert_eq!(resource.load_all_attributes(&ctx)?.len(), 1);
    assert_eq!(calls.get(), 1);

    let err = resource
        .load_all_attributes(&FormContext::for_form(survey))
        .unwrap_err();
    assert!(matches!(err, FormsError::ContextMismatch { .. }));
    Ok(())
}

#[test]
fn global_context_sees_every_record_attribute() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let contact = create_form(&conn, "Contact")?;
    let survey = create_form(&conn, "Survey")?;
    create_field(&conn, &contact, "email", BackendType::Varchar, 10)?;
    create_field(&conn, &survey, "rating", BackendType::Int, 10)?;

    let mut resource = FormRecordResource::new(&conn);
    assert_eq!(resource.load_all_attributes(&FormContext::global())?.len(), 2);
    Ok(())
}

#[test]
fn records_are_saved_against_their_form() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let form_id = form.id.unwrap();
    create_field(&conn, &form, "email", BackendType::Varchar, 10)?;
    create_field(&conn, &form, "age", BackendType::Int, 20)?;
    create_field(&conn, &form, "score", BackendType::Decimal, 30)?;
    let ctx = FormContext::for_form(form);

    let mut resource = FormRecordResource::new(&conn);
    let values = resource.values_from_json(
        &ctx,
        json!({"email": "ada@example.com", "age": "36", "score": 9.5})
            .as_object()
            .unwrap(),
    )?;
    let mut record = Record::new(form_id);
    record.values = values;
    let id = resource.save(&ctx, &mut record)?;
    assert!(record.created_at.is_some());

    let mut reader = FormRecordResource::new(&conn);
    let loaded = reader.load(&ctx, id)?;
    assert_eq!(loaded, record);
    assert_eq!(loaded.get("age"), Some(&AttributeValue::Int(36)));

    let mut update = loaded.clone();
    update.set("email", AttributeValue::Varchar("ada@lovelace.dev".to_string()));
    reader.save(&ctx, &mut update)?;
    assert_eq!(
        FormRecordResource::new(&conn).load(&ctx, id)?.get("email"),
        Some(&AttributeValue::Varchar("ada@lovelace.dev".to_string()))
    );
    assert_eq!(count(&conn, "alekseon_custom_form_record_entity_varchar")?, 1);
    Ok(())
}

#[test]
fn record_writes_are_validated() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let contact = create_form(&conn, "Contact")?;
    let survey = create_form(&conn, "Survey")?;
    let contact_id = contact.id.unwrap();
    create_field(&conn, &contact, "email", BackendType::Varchar, 10)?;
    create_field(&conn, &survey, "rating", BackendType::Int, 10)?;

    let mut phone = Attribute::new("phone", "Phone", BackendType::Varchar)
        .for_form(contact_id)
        .required();
    RecordAttributeResource::new(&conn).save(&mut phone)?;
    let mut internal = Attribute::new("internal_note", "Internal note", BackendType::Text)
        .for_form(contact_id)
        .required();
    internal.input_visibility = InputVisibility::AdminOnly;
    RecordAttributeResource::new(&conn).save(&mut internal)?;

    let ctx = FormContext::for_form(contact);
    let mut resource = FormRecordResource::new(&conn);

    // a field of another form
    let mut record = Record::new(contact_id);
    record.set("rating", AttributeValue::Int(5));
    assert!(matches!(
        resource.save(&ctx, &mut record),
        Err(FormsError::Validation(_))
    ));

    // wrong datatype
    let mut record = Record::new(contact_id);
    record
        .set("email", AttributeValue::Int(5))
        .set("phone", AttributeValue::Varchar("555".to_string()));
    assert!(matches!(
        resource.save(&ctx, &mut record),
        Err(FormsError::Validation(_))
    ));

    // required visible field missing; admin only fields are not enforced
    let mut record = Record::new(contact_id);
    record.set("email", AttributeValue::Varchar("a@b.c".to_string()));
    let err = resource.save(&ctx, &mut record).unwrap_err();
    assert_eq!(err.to_string(), "'Phone' is a required field.");

    record.set("phone", AttributeValue::Varchar("555".to_string()));
    resource.save(&ctx, &mut record)?;

    let bad_json = json!({"email": ["a@b.c"]});
    assert!(matches!(
        resource.values_from_json(&ctx, bad_json.as_object().unwrap()),
        Err(FormsError::Validation(_))
    ));
    assert_eq!(count(&conn, "alekseon_custom_form_record")?, 1);
    Ok(())
}

#[test]
fn records_of_other_forms_are_not_found() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let contact = create_form(&conn, "Contact")?;
    let survey = create_form(&conn, "Survey")?;

    let ctx = FormContext::for_form(contact.clone());
    let mut record = Record::new(contact.id.unwrap());
    let id = FormRecordResource::new(&conn).save(&ctx, &mut record)?;

    let err = FormRecordResource::new(&conn)
        .load(&FormContext::for_form(survey), id)
        .unwrap_err();
    assert!(matches!(err, FormsError::NotFound(_)));
    assert!(FormRecordResource::new(&conn).load(&ctx, id + 1).is_err());
    Ok(())
}

#[test]
fn deleting_a_form_removes_its_records() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let form_id = form.id.unwrap();
    create_field(&conn, &form, "email", BackendType::Varchar, 10)?;
    let ctx = FormContext::for_form(form);

    let mut resource = FormRecordResource::new(&conn);
    for email in ["a@example.com", "b@example.com"] {
        let mut record = Record::new(form_id);
        record.set("email", AttributeValue::Varchar(email.to_string()));
        resource.save(&ctx, &mut record)?;
    }
    assert_eq!(FormRecordResource::new(&conn).list(&ctx)?.len(), 2);

    FormResource::new(&conn).delete(form_id)?;
    assert_eq!(count(&conn, "alekseon_custom_form_record")?, 0);
    assert_eq!(count(&conn, "alekseon_custom_form_record_attribute")?, 0);
    assert_eq!(count(&conn, "alekseon_custom_form_record_entity_varchar")?, 0);
    Ok(())
}

#[test]
fn uploads_land_in_the_form_directory() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let photo = create_field(&conn, &form, "photo", BackendType::Varchar, 10)?;
    let ctx = FormContext::for_form(form.clone());

    let resource = FormRecordResource::new(&conn);
    let mut record = Record::new(form.id.unwrap());
    record.id = Some(42);

    let path = resource.upload_path(Path::new("media"), &ctx, &record, &photo, "vacation.jpg");
    let dir = resource.images_dir_name(&ctx);
    assert!(dir.starts_with("alekseon_custom_forms/"));
    assert_eq!(path.parent(), Some(Path::new("media").join(&dir).as_path()));

    let file_name = path.file_name().and_then(|name| name.to_str()).unwrap();
    let pattern = regex::Regex::new(r"^[0-9a-f]{32}\.jpg$")?;
    assert!(pattern.is_match(file_name), "{file_name}");

    assert_eq!(
        resource.images_dir_name(&FormContext::global()),
        "alekseon_custom_forms"
    );
    Ok(())
}

#[test]
fn datetime_and_decimal_values_are_checked_before_storage() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Visits")?;
    let form_id = form.id.unwrap();
    let visit = create_field(&conn, &form, "visit", BackendType::Datetime, 10)?;
    create_field(&conn, &form, "score", BackendType::Decimal, 20)?;
    let ctx = FormContext::for_form(form);
    let mut resource = FormRecordResource::new(&conn);

    for raw in [json!({"visit": "20240101"}), json!({"score": "NaN"})] {
        assert!(matches!(
            resource.values_from_json(&ctx, raw.as_object().unwrap()),
            Err(FormsError::Validation(_))
        ));
    }

    let mut record = Record::new(form_id);
    record.set("visit", AttributeValue::Datetime("20240101".to_string()));
    assert!(matches!(
        resource.save(&ctx, &mut record),
        Err(FormsError::Validation(_))
    ));
    let mut record = Record::new(form_id);
    record.set("score", AttributeValue::Decimal(f64::NAN));
    assert!(matches!(
        resource.save(&ctx, &mut record),
        Err(FormsError::Validation(_))
    ));

    let values = resource.values_from_json(
        &ctx,
        json!({"visit": "2024-01-01", "score": "1.5"}).as_object().unwrap(),
    )?;
    let mut record = Record::new(form_id);
    record.values = values;
    let id = resource.save(&ctx, &mut record)?;

    let loaded = FormRecordResource::new(&conn).load(&ctx, id)?;
    assert_eq!(
        loaded.get("visit"),
        Some(&AttributeValue::Datetime("2024-01-01 00:00:00".to_string()))
    );
    assert_eq!(loaded.get("score"), Some(&AttributeValue::Decimal(1.5)));

    // a numeric cell left behind by an older writer still loads
    conn.execute(
        "UPDATE alekseon_custom_form_record_entity_datetime SET value = 20240101
         WHERE entity_id = ?1 AND attribute_id = ?2",
        rusqlite::params![id, visit.id.unwrap()],
    )?;
    let records = FormRecordResource::new(&conn).list(&ctx)?;
    assert_eq!(
        records[0].get("visit"),
        Some(&AttributeValue::Datetime("20240101".to_string()))
    );
    Ok(())
}

#[test]
fn field_datatype_is_fixed_once_saved() -> anyhow::Result<()> {
    let (_dir, database) = migrated_database()?;
    let conn = database.connect()?;
    let form = create_form(&conn, "Contact")?;
    let mut age = create_field(&conn, &form, "age", BackendType::Int, 10)?;

    age.backend_type = BackendType::Varchar;
    let err = RecordAttributeResource::new(&conn).save(&mut age).unwrap_err();
    assert!(matches!(err, FormsError::Validation(_)));

    age.backend_type = BackendType::Int;
    age.frontend_label = "Age in years".to_string();
    RecordAttributeResource::new(&conn).save(&mut age)?;
    let stored = RecordAttributeResource::new(&conn).load(age.id.unwrap())?;
    assert_eq!(stored.backend_type, BackendType::Int);
    assert_eq!(stored.frontend_label, "Age in years");
    Ok(())
}
