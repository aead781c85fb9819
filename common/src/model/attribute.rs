use crate::model::value::BackendType;
use serde::{Deserialize, Serialize};

/// Whether a field is rendered on input forms.
///
/// Stored as a smallint. `Hidden` and `Visible` keep the polarity of the
/// legacy boolean `is_enabled` column (0 / 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputVisibility {
    Hidden,
    #[default]
    Visible,
    AdminOnly,
}

impl InputVisibility {
    pub fn as_i64(&self) -> i64 {
        match self {
            InputVisibility::Hidden => 0,
            InputVisibility::Visible => 1,
            InputVisibility::AdminOnly => 2,
        }
    }

    /// Unknown values fall back to `Visible`, the column default.
    pub fn from_i64(raw: i64) -> Self {
        match raw {
            0 => InputVisibility::Hidden,
            2 => InputVisibility::AdminOnly,
            _ => InputVisibility::Visible,
        }
    }
}

/// A form field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: Option<u32>,
    /// Owning form. `None` for attributes of the form entity type itself
    /// and for legacy global record attributes.
    pub form_id: Option<u32>,
    pub attribute_code: String,
    pub frontend_label: String,
    /// Input renderer, e.g. `text`, `textarea`, `image`.
    pub frontend_input: String,
    pub backend_type: BackendType,
    pub sort_order: i32,
    pub is_required: bool,
    pub identifier: Option<String>,
    pub input_visibility: InputVisibility,
}

impl Attribute {
    pub fn new(
        attribute_code: impl Into<String>,
        frontend_label: impl Into<String>,
        backend_type: BackendType,
    ) -> Self {
        Self {
            id: None,
            form_id: None,
            attribute_code: attribute_code.into(),
            frontend_label: frontend_label.into(),
            frontend_input: "text".to_string(),
            backend_type,
            sort_order: 0,
            is_required: false,
            identifier: None,
            input_visibility: InputVisibility::Visible,
        }
    }

    pub fn for_form(mut self, form_id: u32) -> Self {
        self.form_id = Some(form_id);
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_input(mut self, frontend_input: impl Into<String>) -> Self {
        self.frontend_input = frontend_input.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}
