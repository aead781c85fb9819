//! The module's schema history. Every step is idempotent on its own; the
//! runner only decides which ones are due.

use crate::entity_type::{FORM, FORM_RECORD};
use crate::error::MigrationError;
use crate::setup::adapter::{
    ColumnDefault, ColumnDefinition, ColumnType, ForeignKeyAction, IndexType, SchemaSetup,
};
use crate::setup::eav::EavSchemaSetup;
use crate::setup::migration::MigrationStep;
use semver::Version;

type StepResult = Result<(), MigrationError>;

pub fn schema_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new(Version::new(1, 0, 0), "create eav tables", create_eav_tables),
        MigrationStep::new(
            Version::new(1, 0, 2),
            "add record creation time",
            add_record_created_at,
        ),
        MigrationStep::new(
            Version::new(1, 0, 4),
            "add form creation time",
            add_form_created_at,
        ),
        MigrationStep::new(
            Version::new(1, 0, 5),
            "widen attribute codes",
            widen_attribute_codes,
        )
        .existing_installs_only(),
        MigrationStep::new(Version::new(1, 0, 6), "add identifiers", add_identifiers),
        MigrationStep::new(
            Version::new(2, 0, 0),
            "scope record attributes to forms",
            scope_record_attributes,
        ),
    ]
}

fn create_eav_tables(setup: &mut SchemaSetup<'_>) -> StepResult {
    create_eav_structures(setup)?;
    link_records_to_forms(setup)?;
    add_record_attribute_form_id(setup)?;

    // title is the only attribute of the form entity type
    setup.connection().execute(
        &format!(
            "INSERT OR IGNORE INTO {} (attribute_code, frontend_label, frontend_input, backend_type, sort_order, is_required)
             VALUES ('title', 'Title', 'text', 'varchar', 10, 1)",
            FORM.attribute_table
        ),
        [],
    )?;
    Ok(())
}

fn create_eav_structures(setup: &mut SchemaSetup<'_>) -> StepResult {
    let mut eav = EavSchemaSetup::new(setup);
    for entity_type in [FORM, FORM_RECORD] {
        eav.create_full_eav_structure(
            entity_type.attribute_table,
            entity_type.value_table_prefix,
            entity_type.entity_table,
        )?;
    }
    Ok(())
}

fn link_records_to_forms(setup: &mut SchemaSetup<'_>) -> StepResult {
    setup.add_column(FORM_RECORD.entity_table, &form_id_column())?;
    setup.add_foreign_key(
        FORM_RECORD.entity_table,
        "form_id",
        FORM.entity_table,
        "entity_id",
        ForeignKeyAction::Cascade,
    )?;
    setup.add_index(FORM_RECORD.entity_table, &["form_id"], IndexType::Index)?;
    Ok(())
}

fn add_record_created_at(setup: &mut SchemaSetup<'_>) -> StepResult {
    setup.add_column(FORM_RECORD.entity_table, &created_at_column())?;
    Ok(())
}

fn add_form_created_at(setup: &mut SchemaSetup<'_>) -> StepResult {
    setup.add_column(FORM.entity_table, &created_at_column())?;
    Ok(())
}

fn widen_attribute_codes(setup: &mut SchemaSetup<'_>) -> StepResult {
    let attribute_code = ColumnDefinition::new("attribute_code", ColumnType::Varchar(255))
        .not_null()
        .default(ColumnDefault::Text(String::new()));
    setup.modify_column(FORM.attribute_table, &attribute_code)?;
    setup.modify_column(FORM_RECORD.attribute_table, &attribute_code)?;
    Ok(())
}

fn add_identifiers(setup: &mut SchemaSetup<'_>) -> StepResult {
    setup.add_column(FORM.entity_table, &identifier_column())?;
    setup.add_index(FORM.entity_table, &["identifier"], IndexType::Unique)?;
    add_record_attribute_identifier(setup)
}

fn scope_record_attributes(setup: &mut SchemaSetup<'_>) -> StepResult {
    create_eav_structures(setup)?;
    // repairs tables created by releases older than 1.0.5
    widen_attribute_codes(setup)?;
    add_record_attribute_form_id(setup)?;
    add_record_attribute_identifier(setup)?;
    add_input_visibility(setup)
}

fn add_record_attribute_form_id(setup: &mut SchemaSetup<'_>) -> StepResult {
    setup.add_column(FORM_RECORD.attribute_table, &form_id_column())?;
    setup.add_foreign_key(
        FORM_RECORD.attribute_table,
        "form_id",
        FORM.entity_table,
        "entity_id",
        ForeignKeyAction::Cascade,
    )?;
    Ok(())
}

fn add_record_attribute_identifier(setup: &mut SchemaSetup<'_>) -> StepResult {
    setup.add_column(FORM_RECORD.attribute_table, &identifier_column())?;
    setup.add_index(
        FORM_RECORD.attribute_table,
        &["identifier", "form_id"],
        IndexType::Unique,
    )?;
    Ok(())
}

/// `is_enabled` was renamed to `input_visibility`; older installs keep their
/// values, new ones get the column with its default.
fn add_input_visibility(setup: &mut SchemaSetup<'_>) -> StepResult {
    let table = FORM_RECORD.attribute_table;
    let input_visibility = ColumnDefinition::new("input_visibility", ColumnType::SmallInt)
        .not_null()
        .default(ColumnDefault::Integer(1));

    if setup.table_column_exists(table, "is_enabled")? {
        setup.change_column(table, "is_enabled", &input_visibility)?;
    } else {
        setup.add_column(table, &input_visibility)?;
    }
    Ok(())
}

fn form_id_column() -> ColumnDefinition {
    ColumnDefinition::new("form_id", ColumnType::Integer)
        .unsigned()
        .not_null()
}

fn created_at_column() -> ColumnDefinition {
    ColumnDefinition::new("created_at", ColumnType::Timestamp)
        .not_null()
        .default(ColumnDefault::CurrentTimestamp)
}

fn identifier_column() -> ColumnDefinition {
    ColumnDefinition::new("identifier", ColumnType::Varchar(255))
}
