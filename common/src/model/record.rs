use crate::model::value::{AttributeValue, AttributeValues};
use serde::{Deserialize, Serialize};

/// A submission against a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Option<u32>,
    pub form_id: u32,
    pub created_at: Option<String>,
    pub values: AttributeValues,
}

impl Record {
    pub fn new(form_id: u32) -> Self {
        Self {
            id: None,
            form_id,
            created_at: None,
            values: AttributeValues::new(),
        }
    }

    pub fn set(&mut self, attribute_code: impl Into<String>, value: AttributeValue) -> &mut Self {
        self.values.insert(attribute_code.into(), value);
        self
    }

    pub fn get(&self, attribute_code: &str) -> Option<&AttributeValue> {
        self.values.get(attribute_code)
    }
}
