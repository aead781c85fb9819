use crate::entity_type::EntityType;
use crate::error::{FormsError, FormsResult};
use common::model::attribute::{Attribute, InputVisibility};
use common::model::value::BackendType;
use rusqlite::{params_from_iter, Connection};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeOrder {
    #[default]
    SortOrder,
    AttributeCode,
    Id,
}

impl AttributeOrder {
    fn column(&self) -> &'static str {
        match self {
            AttributeOrder::SortOrder => "sort_order",
            AttributeOrder::AttributeCode => "attribute_code",
            AttributeOrder::Id => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// What to select from an attribute table. Defaults to every attribute
/// ordered by ascending `sort_order`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeQuery {
    pub order: AttributeOrder,
    pub direction: SortDirection,
    pub form_id: Option<u32>,
}

/// Anything able to answer an [`AttributeQuery`].
pub trait AttributeSource {
    fn fetch(&self, query: &AttributeQuery) -> FormsResult<Vec<Attribute>>;
}

/// Attribute definitions of one entity type.
///
/// The collection does not hold results: every [`load`](Self::load) runs the
/// query again, so it can be iterated any number of times.
pub struct AttributeCollection<'c> {
    conn: &'c Connection,
    entity_type: EntityType,
    query: AttributeQuery,
}

impl<'c> AttributeCollection<'c> {
    pub fn new(conn: &'c Connection, entity_type: EntityType) -> Self {
        Self {
            conn,
            entity_type,
            query: AttributeQuery::default(),
        }
    }

    pub fn set_order(mut self, order: AttributeOrder, direction: SortDirection) -> Self {
        self.query.order = order;
        self.query.direction = direction;
        self
    }

    pub fn add_form_filter(mut self, form_id: u32) -> Self {
        self.query.form_id = Some(form_id);
        self
    }

    fn with_query(mut self, query: &AttributeQuery) -> Self {
        self.query = query.clone();
        self
    }

    pub fn load(&self) -> FormsResult<Vec<Attribute>> {
        let scoped = self.entity_type.form_scoped_attributes;
        if self.query.form_id.is_some() && !scoped {
            return Err(FormsError::validation(format!(
                "Attributes of {} are not scoped to forms.",
                self.entity_type.code
            )));
        }

        let mut sql = String::from(
            "SELECT id, attribute_code, frontend_label, frontend_input, backend_type, sort_order, is_required",
        );
        if scoped {
            sql.push_str(", form_id, identifier, input_visibility");
        }
        sql.push_str(&format!(" FROM {}", self.entity_type.attribute_table));

        let mut bindings = Vec::new();
        if let Some(form_id) = self.query.form_id {
            sql.push_str(" WHERE form_id = ?1");
            bindings.push(form_id);
        }
        let direction = match self.query.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        // id keeps equal sort orders in a stable sequence
        sql.push_str(&format!(
            " ORDER BY {} {}, id ASC",
            self.query.order.column(),
            direction
        ));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(bindings), |row| {
                Ok(AttributeRow {
                    id: row.get(0)?,
                    attribute_code: row.get(1)?,
                    frontend_label: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    frontend_input: row.get(3)?,
                    backend_type: row.get(4)?,
                    sort_order: row.get(5)?,
                    is_required: row.get::<_, i64>(6)? != 0,
                    form_id: if scoped { row.get(7)? } else { None },
                    identifier: if scoped { row.get(8)? } else { None },
                    input_visibility: if scoped { row.get(9)? } else { 1 },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(AttributeRow::into_attribute).collect()
    }
}

struct AttributeRow {
    id: u32,
    attribute_code: String,
    frontend_label: String,
    frontend_input: String,
    backend_type: String,
    sort_order: i32,
    is_required: bool,
    form_id: Option<u32>,
    identifier: Option<String>,
    input_visibility: i64,
}

impl AttributeRow {
    fn into_attribute(self) -> FormsResult<Attribute> {
        let backend_type = BackendType::parse(&self.backend_type).ok_or_else(|| {
            FormsError::validation(format!(
                "Unknown backend type '{}' for attribute '{}'.",
                self.backend_type, self.attribute_code
            ))
        })?;
        Ok(Attribute {
            id: Some(self.id),
            form_id: self.form_id,
            attribute_code: self.attribute_code,
            frontend_label: self.frontend_label,
            frontend_input: self.frontend_input,
            backend_type,
            sort_order: self.sort_order,
            is_required: self.is_required,
            identifier: self.identifier,
            input_visibility: InputVisibility::from_i64(self.input_visibility),
        })
    }
}

/// Creates a fresh [`AttributeCollection`] for every query.
#[derive(Clone, Copy)]
pub struct AttributeCollectionFactory<'c> {
    conn: &'c Connection,
    entity_type: EntityType,
}

impl<'c> AttributeCollectionFactory<'c> {
    pub fn new(conn: &'c Connection, entity_type: EntityType) -> Self {
        Self { conn, entity_type }
    }

    pub fn create(&self) -> AttributeCollection<'c> {
        AttributeCollection::new(self.conn, self.entity_type)
    }
}

impl AttributeSource for AttributeCollectionFactory<'_> {
    fn fetch(&self, query: &AttributeQuery) -> FormsResult<Vec<Attribute>> {
        self.create().with_query(query).load()
    }
}

/// Attribute definitions keyed by code, kept in load order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    attributes: Vec<Attribute>,
    by_code: HashMap<String, usize>,
}

impl AttributeSet {
    pub fn get(&self, attribute_code: &str) -> Option<&Attribute> {
        self.by_code
            .get(attribute_code)
            .map(|&index| &self.attributes[index])
    }

    pub fn by_id(&self, id: u32) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.id == Some(id))
    }

    pub fn contains(&self, attribute_code: &str) -> bool {
        self.by_code.contains_key(attribute_code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|attribute| attribute.attribute_code.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Attribute> {
        self.attributes.clone()
    }
}

impl FromIterator<Attribute> for AttributeSet {
    /// A later attribute with an already seen code replaces the earlier one.
    fn from_iter<I: IntoIterator<Item = Attribute>>(iter: I) -> Self {
        let mut set = AttributeSet::default();
        for attribute in iter {
            match set.by_code.get(&attribute.attribute_code) {
                Some(&index) => set.attributes[index] = attribute,
                None => {
                    set.by_code
                        .insert(attribute.attribute_code.clone(), set.attributes.len());
                    set.attributes.push(attribute);
                }
            }
        }
        set
    }
}
