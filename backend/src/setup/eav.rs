use crate::error::MigrationError;
use crate::setup::adapter::{
    ColumnDefault, ColumnDefinition, ColumnType, ForeignKeyAction, IndexType, SchemaSetup,
    TableDefinition,
};
use common::model::value::BackendType;

/// Creates the table set of one EAV entity type: the entity table, the
/// attribute definition table and one value table per [`BackendType`].
pub struct EavSchemaSetup<'s, 'c> {
    setup: &'s mut SchemaSetup<'c>,
}

impl<'s, 'c> EavSchemaSetup<'s, 'c> {
    pub fn new(setup: &'s mut SchemaSetup<'c>) -> Self {
        Self { setup }
    }

    /// Value tables are named `{value_table_prefix}_{backend_type}`.
    /// Tables that already exist are left alone.
    pub fn create_full_eav_structure(
        &mut self,
        attribute_table: &str,
        value_table_prefix: &str,
        entity_table: &str,
    ) -> Result<(), MigrationError> {
        self.setup.create_table(&entity_table_definition(entity_table))?;
        self.setup
            .create_table(&attribute_table_definition(attribute_table))?;
        for backend_type in BackendType::ALL {
            let table = value_table_definition(
                &format!("{value_table_prefix}_{backend_type}"),
                backend_type,
                attribute_table,
                entity_table,
            );
            self.setup.create_table(&table)?;
        }
        Ok(())
    }
}

fn entity_table_definition(name: &str) -> TableDefinition {
    TableDefinition::new(name).column(ColumnDefinition::primary_key("entity_id"))
}

fn attribute_table_definition(name: &str) -> TableDefinition {
    TableDefinition::new(name)
        .column(ColumnDefinition::primary_key("id"))
        .column(
            ColumnDefinition::new("attribute_code", ColumnType::Varchar(255))
                .not_null()
                .default(ColumnDefault::Text(String::new())),
        )
        .column(ColumnDefinition::new("frontend_label", ColumnType::Varchar(255)))
        .column(
            ColumnDefinition::new("frontend_input", ColumnType::Varchar(50))
                .not_null()
                .default(ColumnDefault::Text("text".to_string())),
        )
        .column(ColumnDefinition::new("backend_type", ColumnType::Varchar(8)).not_null())
        .column(
            ColumnDefinition::new("sort_order", ColumnType::Integer)
                .not_null()
                .default(ColumnDefault::Integer(0)),
        )
        .column(
            ColumnDefinition::new("is_required", ColumnType::SmallInt)
                .unsigned()
                .not_null()
                .default(ColumnDefault::Integer(0)),
        )
        .index(&["attribute_code"], IndexType::Unique)
}

fn value_table_definition(
    name: &str,
    backend_type: BackendType,
    attribute_table: &str,
    entity_table: &str,
) -> TableDefinition {
    let value_type = match backend_type {
        BackendType::Varchar => ColumnType::Varchar(255),
        BackendType::Text => ColumnType::Text,
        BackendType::Int => ColumnType::Integer,
        BackendType::Decimal => ColumnType::Decimal {
            precision: 12,
            scale: 4,
        },
        BackendType::Datetime => ColumnType::Datetime,
    };
    TableDefinition::new(name)
        .column(ColumnDefinition::primary_key("value_id"))
        .column(
            ColumnDefinition::new("attribute_id", ColumnType::Integer)
                .unsigned()
                .not_null(),
        )
        .column(
            ColumnDefinition::new("entity_id", ColumnType::Integer)
                .unsigned()
                .not_null(),
        )
        .column(ColumnDefinition::new("value", value_type))
        .index(&["entity_id", "attribute_id"], IndexType::Unique)
        .foreign_key("attribute_id", attribute_table, "id", ForeignKeyAction::Cascade)
        .foreign_key("entity_id", entity_table, "entity_id", ForeignKeyAction::Cascade)
}
