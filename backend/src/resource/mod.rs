//! Persistence of forms, form fields and records over the EAV tables.

pub mod attribute;
pub mod attribute_collection;
pub mod form;
pub mod form_record;

pub use attribute::RecordAttributeResource;
pub use attribute_collection::{
    AttributeCollection, AttributeCollectionFactory, AttributeOrder, AttributeQuery,
    AttributeSet, AttributeSource, SortDirection,
};
pub use form::FormResource;
pub use form_record::{FormContext, FormRecordResource};

use crate::entity_type::EntityType;
use crate::error::FormsResult;
use common::model::value::{AttributeValue, AttributeValues, BackendType};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection};

/// Reads the values of `entity_id` for every attribute of `attributes`.
/// Rows of attributes outside the set are ignored.
pub(crate) fn load_values(
    conn: &Connection,
    entity_type: &EntityType,
    entity_id: u32,
    attributes: &AttributeSet,
) -> FormsResult<AttributeValues> {
    let mut values = AttributeValues::new();
    for backend_type in BackendType::ALL {
        if !attributes.iter().any(|a| a.backend_type == backend_type) {
            continue;
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT attribute_id, value FROM {} WHERE entity_id = ?1 AND value IS NOT NULL",
            entity_type.value_table(backend_type)
        ))?;
        let rows = stmt
            .query_map(params![entity_id], |row| {
                let attribute_id: u32 = row.get(0)?;
                let value = match backend_type {
                    BackendType::Varchar => AttributeValue::Varchar(row.get(1)?),
                    BackendType::Text => AttributeValue::Text(row.get(1)?),
                    BackendType::Int => AttributeValue::Int(row.get(1)?),
                    BackendType::Decimal => AttributeValue::Decimal(row.get(1)?),
                    BackendType::Datetime => AttributeValue::Datetime(datetime_cell(row)?),
                };
                Ok((attribute_id, value))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for (attribute_id, value) in rows {
            if let Some(attribute) = attributes.by_id(attribute_id) {
                if attribute.backend_type == backend_type {
                    values.insert(attribute.attribute_code.clone(), value);
                }
            }
        }
    }
    Ok(values)
}

/// DATETIME columns have numeric affinity, so rows written before input was
/// normalized may hold numbers.
fn datetime_cell(row: &rusqlite::Row<'_>) -> rusqlite::Result<String> {
    match row.get::<_, SqlValue>(1)? {
        SqlValue::Integer(i) => Ok(i.to_string()),
        SqlValue::Real(r) => Ok(r.to_string()),
        SqlValue::Text(s) => Ok(s),
        SqlValue::Null | SqlValue::Blob(_) => Err(rusqlite::Error::InvalidColumnType(
            1,
            "value".to_string(),
            row.get_ref(1)?.data_type(),
        )),
    }
}

/// Upserts `values` for `entity_id`. Every code must be present in
/// `attributes`; callers validate that beforehand.
pub(crate) fn save_values(
    conn: &Connection,
    entity_type: &EntityType,
    entity_id: u32,
    attributes: &AttributeSet,
    values: &AttributeValues,
) -> FormsResult<()> {
    for (code, value) in values {
        let Some(attribute_id) = attributes.get(code).and_then(|a| a.id) else {
            continue;
        };
        let sql_value = match value {
            AttributeValue::Varchar(s) | AttributeValue::Text(s) | AttributeValue::Datetime(s) => {
                SqlValue::Text(s.clone())
            }
            AttributeValue::Int(i) => SqlValue::Integer(*i),
            AttributeValue::Decimal(d) => SqlValue::Real(*d),
        };
        conn.execute(
            &format!(
                "INSERT INTO {} (attribute_id, entity_id, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(entity_id, attribute_id) DO UPDATE SET value = excluded.value",
                entity_type.value_table(value.backend_type())
            ),
            params![attribute_id, entity_id, sql_value],
        )?;
    }
    Ok(())
}
