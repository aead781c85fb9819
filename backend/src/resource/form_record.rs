//! Resource of form records.
//!
//! A record's legal attribute codes are the attributes of its form. The form
//! is passed explicitly as a [`FormContext`]; without one the resource falls
//! back to every record attribute of the entity type.

use crate::entity_type::{FORM, FORM_RECORD};
use crate::error::{FormsError, FormsResult};
use crate::resource::attribute_collection::{
    AttributeCollectionFactory, AttributeOrder, AttributeQuery, AttributeSet, AttributeSource,
    SortDirection,
};
use crate::resource::{load_values, save_values};
use common::model::attribute::{Attribute, InputVisibility};
use common::model::form::Form;
use common::model::record::Record;
use common::model::value::{AttributeValue, AttributeValues};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// The form a record is resolved against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormContext {
    form: Option<Form>,
}

impl FormContext {
    /// No form: the unscoped attribute set of the entity type.
    pub fn global() -> Self {
        Self { form: None }
    }

    pub fn for_form(form: Form) -> Self {
        Self { form: Some(form) }
    }

    pub fn form(&self) -> Option<&Form> {
        self.form.as_ref()
    }

    pub fn form_id(&self) -> Option<u32> {
        self.form.as_ref().and_then(|form| form.id)
    }
}

/// One-shot cache of the active attribute set.
#[derive(Debug, Default)]
enum AttributeLatch {
    #[default]
    Unloaded,
    Loaded {
        form_id: Option<u32>,
        attributes: AttributeSet,
    },
}

pub struct FormRecordResource<'c, S: AttributeSource = AttributeCollectionFactory<'c>> {
    conn: &'c Connection,
    source: S,
    attributes: AttributeLatch,
}

impl<'c> FormRecordResource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_source(conn, AttributeCollectionFactory::new(conn, FORM_RECORD))
    }
}

impl<'c, S: AttributeSource> FormRecordResource<'c, S> {
    pub fn with_source(conn: &'c Connection, source: S) -> Self {
        Self {
            conn,
            source,
            attributes: AttributeLatch::Unloaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.attributes, AttributeLatch::Loaded { .. })
    }

    /// Loads the active attributes of `ctx` once; later calls return the
    /// cached set. A resource is bound to the first context it loads for and
    /// rejects any other one.
    pub fn load_all_attributes(&mut self, ctx: &FormContext) -> FormsResult<&AttributeSet> {
        if let AttributeLatch::Loaded { form_id, .. } = &self.attributes {
            if *form_id != ctx.form_id() {
                return Err(FormsError::ContextMismatch {
                    loaded: *form_id,
                    requested: ctx.form_id(),
                });
            }
        } else {
            let query = AttributeQuery {
                order: AttributeOrder::SortOrder,
                direction: SortDirection::Asc,
                form_id: ctx.form_id(),
            };
            let attributes: AttributeSet = self.source.fetch(&query)?.into_iter().collect();
            debug!(
                "loaded {} record attribute(s) for form {:?}",
                attributes.len(),
                ctx.form_id()
            );
            self.attributes = AttributeLatch::Loaded {
                form_id: ctx.form_id(),
                attributes,
            };
        }

        match &self.attributes {
            AttributeLatch::Loaded { attributes, .. } => Ok(attributes),
            AttributeLatch::Unloaded => unreachable!("attribute latch was just loaded"),
        }
    }

    pub fn attribute(&mut self, ctx: &FormContext, attribute_code: &str) -> FormsResult<Option<Attribute>> {
        Ok(self.load_all_attributes(ctx)?.get(attribute_code).cloned())
    }

    /// Converts submitted JSON values into typed values of the context's
    /// attributes. Unknown codes and values of the wrong shape are rejected.
    pub fn values_from_json(
        &mut self,
        ctx: &FormContext,
        raw: &Map<String, Value>,
    ) -> FormsResult<AttributeValues> {
        let attributes = self.load_all_attributes(ctx)?;
        let mut values = AttributeValues::new();
        for (code, value) in raw {
            let attribute = attributes
                .get(code)
                .ok_or_else(|| unknown_attribute(ctx, code))?;
            if value.is_null() {
                continue;
            }
            let typed = AttributeValue::from_json(attribute.backend_type, value).ok_or_else(|| {
                FormsError::validation(format!(
                    "Invalid value for '{}': expected {}.",
                    attribute.frontend_label, attribute.backend_type
                ))
            })?;
            values.insert(code.clone(), typed);
        }
        Ok(values)
    }

    pub fn load(&mut self, ctx: &FormContext, id: u32) -> FormsResult<Record> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT entity_id, form_id, created_at FROM {} WHERE entity_id = ?1",
                    FORM_RECORD.entity_table
                ),
                params![id],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let (entity_id, form_id, created_at) = match row {
            Some(row) if ctx.form_id().map_or(true, |form_id| form_id == row.1) => row,
            _ => return Err(FormsError::not_found("This record no longer exists.")),
        };

        let conn = self.conn;
        let attributes = self.load_all_attributes(ctx)?;
        Ok(Record {
            id: Some(entity_id),
            form_id,
            created_at,
            values: load_values(conn, &FORM_RECORD, entity_id, attributes)?,
        })
    }

    /// Records of the context's form, newest first.
    pub fn list(&mut self, ctx: &FormContext) -> FormsResult<Vec<Record>> {
        let form_id = ctx
            .form_id()
            .ok_or_else(|| FormsError::validation("Records can only be listed for a form."))?;
        let ids: Vec<u32> = {
            let mut stmt = self.conn.prepare(&format!(
                "SELECT entity_id FROM {} WHERE form_id = ?1 ORDER BY entity_id DESC",
                FORM_RECORD.entity_table
            ))?;
            let rows = stmt.query_map(params![form_id], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        ids.into_iter().map(|id| self.load(ctx, id)).collect()
    }

    /// Inserts or updates `record` and its values in one transaction.
    pub fn save(&mut self, ctx: &FormContext, record: &mut Record) -> FormsResult<u32> {
        if let Some(form_id) = ctx.form_id() {
            if form_id != record.form_id {
                return Err(FormsError::validation(format!(
                    "Record belongs to form {}, not to form {}.",
                    record.form_id, form_id
                )));
            }
        }
        self.validate(ctx, record)?;

        let conn = self.conn;
        let form_exists = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE entity_id = ?1", FORM.entity_table),
                params![record.form_id],
                |_| Ok(()),
            )
            .optional()?;
        if form_exists.is_none() {
            return Err(FormsError::not_found("This form no longer exists."));
        }

        let tx = conn.unchecked_transaction()?;
        let id = match record.id {
            Some(id) => {
                let updated = tx.execute(
                    &format!(
                        "UPDATE {} SET form_id = ?1 WHERE entity_id = ?2",
                        FORM_RECORD.entity_table
                    ),
                    params![record.form_id, id],
                )?;
                if updated == 0 {
                    return Err(FormsError::not_found("This record no longer exists."));
                }
                id
            }
            None => {
                tx.execute(
                    &format!("INSERT INTO {} (form_id) VALUES (?1)", FORM_RECORD.entity_table),
                    params![record.form_id],
                )?;
                u32::try_from(tx.last_insert_rowid())
                    .map_err(|_| FormsError::validation("Record id out of range."))?
            }
        };

        let attributes = self.load_all_attributes(ctx)?;
        save_values(&tx, &FORM_RECORD, id, attributes, &record.values)?;
        record.created_at = tx.query_row(
            &format!(
                "SELECT created_at FROM {} WHERE entity_id = ?1",
                FORM_RECORD.entity_table
            ),
            params![id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        record.id = Some(id);
        Ok(id)
    }

    fn validate(&mut self, ctx: &FormContext, record: &Record) -> FormsResult<()> {
        let attributes = self.load_all_attributes(ctx)?;
        for (code, value) in &record.values {
            let attribute = attributes
                .get(code)
                .ok_or_else(|| unknown_attribute(ctx, code))?;
            if attribute.backend_type != value.backend_type() {
                return Err(FormsError::validation(format!(
                    "Attribute '{}' stores {} values, got {}.",
                    code,
                    attribute.backend_type,
                    value.backend_type()
                )));
            }
            if !value.is_storable() {
                return Err(FormsError::validation(format!(
                    "Invalid value for '{}': expected {}.",
                    attribute.frontend_label, attribute.backend_type
                )));
            }
        }
        if record.id.is_none() {
            let missing = attributes.iter().find(|attribute| {
                attribute.is_required
                    && attribute.input_visibility == InputVisibility::Visible
                    && !record.values.contains_key(&attribute.attribute_code)
            });
            if let Some(attribute) = missing {
                return Err(FormsError::validation(format!(
                    "'{}' is a required field.",
                    attribute.frontend_label
                )));
            }
        }
        Ok(())
    }

    /// Deletes a record; its values go with it through the value tables'
    /// foreign keys.
    pub fn delete(&self, id: u32) -> FormsResult<()> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE entity_id = ?1", FORM_RECORD.entity_table),
            params![id],
        )?;
        if deleted == 0 {
            return Err(FormsError::not_found("This record no longer exists."));
        }
        Ok(())
    }

    /// `md5(attribute_code . record_id . unix_time)` plus the original
    /// extension. Uploads for the same attribute and record within the same
    /// second get the same name.
    pub fn name_for_uploaded_file(
        &self,
        record: &Record,
        attribute: &Attribute,
        file_name: &str,
    ) -> String {
        uploaded_file_name(record, attribute, file_name, chrono::Utc::now().timestamp())
    }

    /// Image directory of the entity type, namespaced per form when the
    /// context has one.
    pub fn images_dir_name(&self, ctx: &FormContext) -> String {
        images_dir_name(ctx)
    }

    /// Where an upload for `attribute` of `record` is stored below
    /// `media_root`.
    pub fn upload_path(
        &self,
        media_root: &Path,
        ctx: &FormContext,
        record: &Record,
        attribute: &Attribute,
        file_name: &str,
    ) -> PathBuf {
        media_root
            .join(self.images_dir_name(ctx))
            .join(self.name_for_uploaded_file(record, attribute, file_name))
    }
}

/// Without a `.` the whole name doubles as the extension.
pub fn uploaded_file_name(
    record: &Record,
    attribute: &Attribute,
    file_name: &str,
    timestamp: i64,
) -> String {
    let extension = file_name.rsplit('.').next().unwrap_or(file_name);
    let record_id = record.id.map(|id| id.to_string()).unwrap_or_default();
    format!(
        "{}.{}",
        md5_hex(&format!("{}{}{}", attribute.attribute_code, record_id, timestamp)),
        extension
    )
}

pub fn images_dir_name(ctx: &FormContext) -> String {
    let base = FORM_RECORD.images_dir_name;
    match ctx.form() {
        Some(form) => {
            let seed = format!(
                "{}{}",
                form.created_at.as_deref().unwrap_or_default(),
                form.id.map(|id| id.to_string()).unwrap_or_default()
            );
            format!("{}/{}", base, &md5_hex(&seed)[..10])
        }
        None => base.to_string(),
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = md5::Context::new();
    hasher.consume(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn unknown_attribute(ctx: &FormContext, code: &str) -> FormsError {
    match ctx.form_id() {
        Some(form_id) => FormsError::validation(format!(
            "Attribute '{code}' does not belong to form {form_id}."
        )),
        None => FormsError::validation(format!("Unknown attribute '{code}'.")),
    }
}
