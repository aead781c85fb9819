use crate::entity_type::{FORM, FORM_RECORD};
use crate::error::{FormsError, FormsResult};
use crate::resource::attribute_collection::{AttributeCollectionFactory, AttributeQuery, AttributeSource};
use common::model::attribute::Attribute;
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::OnceLock;

const SORT_ORDER_STEP: i32 = 10;
const MAX_CODE_LENGTH: usize = 255;

fn attribute_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9_]*$").expect("attribute code regex must compile")
    })
}

/// Resource of form fields, the form-scoped record attributes.
pub struct RecordAttributeResource<'c> {
    conn: &'c Connection,
}

impl<'c> RecordAttributeResource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub fn find(&self, id: u32) -> FormsResult<Option<Attribute>> {
        let form_id: Option<Option<u32>> = self
            .conn
            .query_row(
                &format!(
                    "SELECT form_id FROM {} WHERE id = ?1",
                    FORM_RECORD.attribute_table
                ),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(form_id) = form_id else {
            return Ok(None);
        };

        let query = AttributeQuery {
            form_id,
            ..AttributeQuery::default()
        };
        let attributes = AttributeCollectionFactory::new(self.conn, FORM_RECORD).fetch(&query)?;
        Ok(attributes
            .into_iter()
            .find(|attribute| attribute.id == Some(id)))
    }

    pub fn load(&self, id: u32) -> FormsResult<Attribute> {
        self.find(id)?
            .ok_or_else(|| FormsError::not_found("This field no longer exists."))
    }

    /// Fields of a form in display order.
    pub fn for_form(&self, form_id: u32) -> FormsResult<Vec<Attribute>> {
        AttributeCollectionFactory::new(self.conn, FORM_RECORD)
            .create()
            .add_form_filter(form_id)
            .load()
    }

    /// Next free sort order of a form: ten past the highest one in use.
    pub fn next_sort_order(&self, form_id: u32) -> FormsResult<i32> {
        let max: Option<i32> = self.conn.query_row(
            &format!(
                "SELECT MAX(sort_order) FROM {} WHERE form_id = ?1",
                FORM_RECORD.attribute_table
            ),
            params![form_id],
            |row| row.get(0),
        )?;
        Ok(max.map_or(SORT_ORDER_STEP, |max| max + SORT_ORDER_STEP))
    }

    /// Inserts or updates a field. `sort_order` is taken as given; callers
    /// wanting the next free slot ask [`next_sort_order`](Self::next_sort_order).
    pub fn save(&self, attribute: &mut Attribute) -> FormsResult<u32> {
        let form_id = attribute
            .form_id
            .ok_or_else(|| FormsError::validation("A form field must belong to a form."))?;
        validate_code(&attribute.attribute_code)?;
        if attribute.frontend_label.trim().is_empty() {
            return Err(FormsError::validation("Field label is required."));
        }
        let form_exists = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE entity_id = ?1", FORM.entity_table),
                params![form_id],
                |_| Ok(()),
            )
            .optional()?;
        if form_exists.is_none() {
            return Err(FormsError::not_found("This form no longer exists."));
        }

        attribute.identifier = attribute
            .identifier
            .take()
            .map(|identifier| identifier.trim().to_string())
            .filter(|identifier| !identifier.is_empty());
        let duplicate = |attribute: &Attribute| match &attribute.identifier {
            Some(identifier) => format!(
                "Field code '{}' or identifier '{}' is already in use.",
                attribute.attribute_code, identifier
            ),
            None => format!("Field code '{}' is already in use.", attribute.attribute_code),
        };

        match attribute.id {
            Some(id) => {
                let stored: Option<String> = self
                    .conn
                    .query_row(
                        &format!(
                            "SELECT backend_type FROM {} WHERE id = ?1",
                            FORM_RECORD.attribute_table
                        ),
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(stored) = stored else {
                    return Err(FormsError::not_found("This field no longer exists."));
                };
                if stored != attribute.backend_type.as_str() {
                    return Err(FormsError::validation(format!(
                        "Field '{}' stores {} values and cannot be changed to {}.",
                        attribute.attribute_code, stored, attribute.backend_type
                    )));
                }
                let updated = self
                    .conn
                    .execute(
                        &format!(
                            "UPDATE {} SET attribute_code = ?1, frontend_label = ?2, frontend_input = ?3,
                                 backend_type = ?4, sort_order = ?5, is_required = ?6, form_id = ?7,
                                 identifier = ?8, input_visibility = ?9
                             WHERE id = ?10",
                            FORM_RECORD.attribute_table
                        ),
                        params![
                            attribute.attribute_code,
                            attribute.frontend_label,
                            attribute.frontend_input,
                            attribute.backend_type.as_str(),
                            attribute.sort_order,
                            attribute.is_required,
                            form_id,
                            attribute.identifier,
                            attribute.input_visibility.as_i64(),
                            id
                        ],
                    )
                    .map_err(|err| FormsError::from_unique_violation(err, duplicate(attribute)))?;
                if updated == 0 {
                    return Err(FormsError::not_found("This field no longer exists."));
                }
                Ok(id)
            }
            None => {
                self.conn
                    .execute(
                        &format!(
                            "INSERT INTO {} (attribute_code, frontend_label, frontend_input, backend_type,
                                 sort_order, is_required, form_id, identifier, input_visibility)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                            FORM_RECORD.attribute_table
                        ),
                        params![
                            attribute.attribute_code,
                            attribute.frontend_label,
                            attribute.frontend_input,
                            attribute.backend_type.as_str(),
                            attribute.sort_order,
                            attribute.is_required,
                            form_id,
                            attribute.identifier,
                            attribute.input_visibility.as_i64()
                        ],
                    )
                    .map_err(|err| FormsError::from_unique_violation(err, duplicate(attribute)))?;
                let id = u32::try_from(self.conn.last_insert_rowid())
                    .map_err(|_| FormsError::validation("Field id out of range."))?;
                attribute.id = Some(id);
                Ok(id)
            }
        }
    }

    /// Deletes a field together with every value stored for it.
    pub fn delete(&self, id: u32) -> FormsResult<()> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1", FORM_RECORD.attribute_table),
            params![id],
        )?;
        if deleted == 0 {
            return Err(FormsError::not_found("This field no longer exists."));
        }
        Ok(())
    }
}

fn validate_code(code: &str) -> FormsResult<()> {
    if code.len() > MAX_CODE_LENGTH {
        return Err(FormsError::validation(format!(
            "Field code must not be longer than {MAX_CODE_LENGTH} characters."
        )));
    }
    if !attribute_code_pattern().is_match(code) {
        return Err(FormsError::validation(format!(
            "Field code '{code}' must start with a letter and contain only lowercase letters, digits and underscores."
        )));
    }
    Ok(())
}
