//! Table layout of the two EAV entity types owned by the module.

use common::model::value::BackendType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    pub code: &'static str,
    pub entity_table: &'static str,
    pub attribute_table: &'static str,
    pub value_table_prefix: &'static str,
    /// Base directory of uploaded images, relative to the media root.
    pub images_dir_name: &'static str,
    /// Attribute rows carry `form_id`, `identifier` and `input_visibility`.
    pub form_scoped_attributes: bool,
}

impl EntityType {
    pub fn value_table(&self, backend_type: BackendType) -> String {
        format!("{}_{}", self.value_table_prefix, backend_type)
    }
}

pub const FORM: EntityType = EntityType {
    code: "alekseon_custom_form",
    entity_table: "alekseon_custom_form",
    attribute_table: "alekseon_custom_form_attribute",
    value_table_prefix: "alekseon_custom_form_entity",
    images_dir_name: "alekseon_custom_form",
    form_scoped_attributes: false,
};

pub const FORM_RECORD: EntityType = EntityType {
    code: "alekseon_custom_form_record",
    entity_table: "alekseon_custom_form_record",
    attribute_table: "alekseon_custom_form_record_attribute",
    value_table_prefix: "alekseon_custom_form_record_entity",
    images_dir_name: "alekseon_custom_forms",
    form_scoped_attributes: true,
};
