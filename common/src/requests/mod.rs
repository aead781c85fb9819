use crate::model::attribute::InputVisibility;
use crate::model::value::BackendType;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Payload of `POST /admin/forms/save`.
#[derive(Debug, Deserialize)]
pub struct SaveFormRequest {
    pub id: Option<u32>,
    pub title: String,
    pub identifier: Option<String>,
}

/// Payload of `POST /admin/form_field/save/{form_id}`.
#[derive(Debug, Deserialize)]
pub struct SaveAttributeRequest {
    pub id: Option<u32>,
    pub attribute_code: String,
    pub frontend_label: String,
    #[serde(default = "default_frontend_input")]
    pub frontend_input: String,
    pub backend_type: BackendType,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub is_required: bool,
    pub identifier: Option<String>,
    #[serde(default)]
    pub input_visibility: InputVisibility,
}

fn default_frontend_input() -> String {
    "text".to_string()
}

/// Payload of `POST /admin/form_record/save/{form_id}`. Values are keyed by
/// attribute code and converted according to each attribute's backend type.
#[derive(Debug, Deserialize)]
pub struct SaveRecordRequest {
    pub id: Option<u32>,
    #[serde(default)]
    pub values: Map<String, Value>,
}
