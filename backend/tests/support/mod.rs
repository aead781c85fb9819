#![allow(dead_code)]

use common::model::attribute::Attribute;
use common::model::form::Form;
use common::model::value::BackendType;
use custom_forms_backend::database::Database;
use custom_forms_backend::resource::{FormResource, RecordAttributeResource};
use custom_forms_backend::setup::Migrator;
use rusqlite::Connection;
use tempfile::TempDir;

/// A database file in a fresh temporary directory, migrated to the current
/// schema. Keep the `TempDir` alive for as long as the database is used.
pub fn migrated_database() -> anyhow::Result<(TempDir, Database)> {
    let dir = tempfile::tempdir()?;
    let database = Database::new(dir.path().join("custom_forms.sqlite"));
    let mut conn = database.connect()?;
    Migrator::custom_forms().apply(&mut conn)?;
    Ok((dir, database))
}

pub fn create_form(conn: &Connection, title: &str) -> anyhow::Result<Form> {
    let mut form = Form::new(title);
    FormResource::new(conn).save(&mut form)?;
    Ok(form)
}

pub fn create_field(
    conn: &Connection,
    form: &Form,
    code: &str,
    backend_type: BackendType,
    sort_order: i32,
) -> anyhow::Result<Attribute> {
    let form_id = form.id.ok_or_else(|| anyhow::anyhow!("form is not saved"))?;
    let mut field = Attribute::new(code, code.replace('_', " "), backend_type)
        .for_form(form_id)
        .with_sort_order(sort_order);
    RecordAttributeResource::new(conn).save(&mut field)?;
    Ok(field)
}

pub fn column_names(conn: &Connection, table: &str) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt
        .query_map([table], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
}

pub fn count(conn: &Connection, table: &str) -> anyhow::Result<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?)
}
