use crate::entity_type::FORM;
use crate::error::{FormsError, FormsResult};
use crate::resource::attribute_collection::{
    AttributeCollectionFactory, AttributeQuery, AttributeSet, AttributeSource,
};
use crate::resource::{load_values, save_values};
use common::model::form::Form;
use common::model::value::{AttributeValue, AttributeValues};
use rusqlite::{params, Connection, OptionalExtension};

const TITLE: &str = "title";

/// Resource of forms. The title is a varchar EAV attribute of the form
/// entity type; identifier and creation time are static columns.
pub struct FormResource<'c> {
    conn: &'c Connection,
}

impl<'c> FormResource<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn attributes(&self) -> FormsResult<AttributeSet> {
        let attributes = AttributeCollectionFactory::new(self.conn, FORM)
            .fetch(&AttributeQuery::default())?;
        Ok(attributes.into_iter().collect())
    }

    pub fn load(&self, id: u32) -> FormsResult<Form> {
        self.find(id)?
            .ok_or_else(|| FormsError::not_found("This form no longer exists."))
    }

    pub fn find(&self, id: u32) -> FormsResult<Option<Form>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT entity_id, identifier, created_at FROM {} WHERE entity_id = ?1",
                    FORM.entity_table
                ),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        match row {
            Some((id, identifier, created_at)) => {
                Ok(Some(self.hydrate(&self.attributes()?, id, identifier, created_at)?))
            }
            None => Ok(None),
        }
    }

    pub fn load_by_identifier(&self, identifier: &str) -> FormsResult<Form> {
        let id: Option<u32> = self
            .conn
            .query_row(
                &format!(
                    "SELECT entity_id FROM {} WHERE identifier = ?1",
                    FORM.entity_table
                ),
                params![identifier],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.load(id),
            None => Err(FormsError::not_found(format!(
                "Form '{identifier}' does not exist."
            ))),
        }
    }

    pub fn list(&self) -> FormsResult<Vec<Form>> {
        let attributes = self.attributes()?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT entity_id, identifier, created_at FROM {} ORDER BY entity_id ASC",
            FORM.entity_table
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<(u32, Option<String>, Option<String>)>, _>>()?;

        rows.into_iter()
            .map(|(id, identifier, created_at)| self.hydrate(&attributes, id, identifier, created_at))
            .collect()
    }

    fn hydrate(
        &self,
        attributes: &AttributeSet,
        id: u32,
        identifier: Option<String>,
        created_at: Option<String>,
    ) -> FormsResult<Form> {
        let values = load_values(self.conn, &FORM, id, attributes)?;
        let title = match values.get(TITLE) {
            Some(AttributeValue::Varchar(title)) => title.clone(),
            _ => String::new(),
        };
        Ok(Form {
            id: Some(id),
            title,
            identifier,
            created_at,
        })
    }

    /// Inserts or updates `form`. A blank identifier is stored as `NULL`.
    pub fn save(&self, form: &mut Form) -> FormsResult<u32> {
        let title = form.title.trim().to_string();
        if title.is_empty() {
            return Err(FormsError::validation("Form title is required."));
        }
        let identifier = form
            .identifier
            .as_deref()
            .map(str::trim)
            .filter(|identifier| !identifier.is_empty())
            .map(str::to_string);
        let duplicate = || {
            format!(
                "A form with identifier '{}' already exists.",
                identifier.as_deref().unwrap_or_default()
            )
        };

        let attributes = self.attributes()?;
        let tx = self.conn.unchecked_transaction()?;
        let id = match form.id {
            Some(id) => {
                let updated = tx
                    .execute(
                        &format!(
                            "UPDATE {} SET identifier = ?1 WHERE entity_id = ?2",
                            FORM.entity_table
                        ),
                        params![identifier, id],
                    )
                    .map_err(|err| FormsError::from_unique_violation(err, duplicate()))?;
                if updated == 0 {
                    return Err(FormsError::not_found("This form no longer exists."));
                }
                id
            }
            None => {
                tx.execute(
                    &format!("INSERT INTO {} (identifier) VALUES (?1)", FORM.entity_table),
                    params![identifier],
                )
                .map_err(|err| FormsError::from_unique_violation(err, duplicate()))?;
                u32::try_from(tx.last_insert_rowid())
                    .map_err(|_| FormsError::validation("Form id out of range."))?
            }
        };

        let mut values = AttributeValues::new();
        values.insert(TITLE.to_string(), AttributeValue::Varchar(title.clone()));
        save_values(&tx, &FORM, id, &attributes, &values)?;
        let created_at = tx.query_row(
            &format!("SELECT created_at FROM {} WHERE entity_id = ?1", FORM.entity_table),
            params![id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        form.id = Some(id);
        form.title = title;
        form.identifier = identifier;
        form.created_at = created_at;
        Ok(id)
    }

    /// Deletes a form. Its fields, records and values follow through the
    /// cascading foreign keys.
    pub fn delete(&self, id: u32) -> FormsResult<()> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {} WHERE entity_id = ?1", FORM.entity_table),
            params![id],
        )?;
        if deleted == 0 {
            return Err(FormsError::not_found("This form no longer exists."));
        }
        Ok(())
    }
}
