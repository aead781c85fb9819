//! DDL primitives used by the migration steps.
//!
//! SQLite only supports a handful of `ALTER TABLE` forms, so every change it
//! cannot express directly (retyping a column, adding a foreign key, adding a
//! column with a non-constant default) goes through [`SchemaSetup::rebuild_table`]:
//! a shadow table is created from the introspected definition, rows are
//! copied, the old table is dropped and the shadow renamed into place. The
//! table's explicit indexes are restored afterwards.
//!
//! Every public operation checks the current schema first and returns
//! `Ok(false)` when there is nothing to do, so steps can be re-run freely.

use crate::error::MigrationError;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

/// Longest generated index / constraint name before it gets hashed.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

type SetupResult<T> = Result<T, MigrationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    Decimal { precision: u8, scale: u8 },
    Varchar(u16),
    Text,
    Timestamp,
    Datetime,
}

impl ColumnType {
    fn sql(&self, unsigned: bool) -> String {
        let base = match self {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),
            ColumnType::Varchar(length) => format!("VARCHAR({length})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Datetime => "DATETIME".to_string(),
        };
        match self {
            ColumnType::SmallInt | ColumnType::Integer if unsigned => format!("{base} UNSIGNED"),
            _ => base,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Integer(i64),
    Text(String),
    /// Row insert time.
    CurrentTimestamp,
}

impl ColumnDefault {
    fn sql(&self) -> String {
        match self {
            ColumnDefault::Integer(value) => value.to_string(),
            ColumnDefault::Text(value) => quote_literal(value),
            ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

/// Desired shape of a column.
#[derive(Debug, Clone)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub unsigned: bool,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub primary: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            unsigned: false,
            nullable: true,
            default: None,
            primary: false,
        }
    }

    /// `INTEGER PRIMARY KEY`, the rowid alias.
    pub fn primary_key(name: impl Into<String>) -> Self {
        let mut column = Self::new(name, ColumnType::Integer);
        column.primary = true;
        column
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// Whether SQLite accepts this column in `ALTER TABLE ... ADD COLUMN`.
    fn can_add_in_place(&self) -> bool {
        if self.primary {
            return false;
        }
        match &self.default {
            Some(ColumnDefault::CurrentTimestamp) => false,
            Some(_) => true,
            None => self.nullable,
        }
    }

    pub fn to_info(&self) -> ColumnInfo {
        ColumnInfo {
            name: self.name.clone(),
            declared_type: self.column_type.sql(self.unsigned && !self.primary),
            not_null: !self.nullable && !self.primary,
            default_sql: self.default.as_ref().map(ColumnDefault::sql),
            primary_key: self.primary,
        }
    }
}

/// A column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_sql: Option<String>,
    pub primary_key: bool,
}

impl ColumnInfo {
    fn sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.declared_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_sql {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }

    fn same_shape(&self, other: &ColumnInfo) -> bool {
        self.declared_type.eq_ignore_ascii_case(&other.declared_type)
            && self.not_null == other.not_null
            && self.default_sql == other.default_sql
            && self.primary_key == other.primary_key
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    Cascade,
    SetNull,
    Restrict,
    NoAction,
}

impl ForeignKeyAction {
    fn sql(&self) -> &'static str {
        match self {
            ForeignKeyAction::Cascade => "CASCADE",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::NoAction => "NO ACTION",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "CASCADE" => ForeignKeyAction::Cascade,
            "SET NULL" => ForeignKeyAction::SetNull,
            "RESTRICT" => ForeignKeyAction::Restrict,
            _ => ForeignKeyAction::NoAction,
        }
    }
}

/// Single column foreign key, as declared or as reported by
/// `pragma_foreign_key_list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: ForeignKeyAction,
}

impl ForeignKeyInfo {
    pub fn new(
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
        on_delete: ForeignKeyAction,
    ) -> Self {
        Self {
            column: column.into(),
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
            on_delete,
        }
    }

    fn sql(&self, table: &str) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            quote_ident(&foreign_key_name(
                table,
                &self.column,
                &self.ref_table,
                &self.ref_column
            )),
            quote_ident(&self.column),
            quote_ident(&self.ref_table),
            quote_ident(&self.ref_column),
            self.on_delete.sql()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Index,
    Unique,
}

impl IndexType {
    fn prefix(&self) -> &'static str {
        match self {
            IndexType::Index => "IDX",
            IndexType::Unique => "UNQ",
        }
    }
}

/// A table created from scratch by [`SchemaSetup::create_table`].
#[derive(Debug, Clone)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<(Vec<String>, IndexType)>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, columns: &[&str], index_type: IndexType) -> Self {
        self.indexes
            .push((columns.iter().map(|c| c.to_string()).collect(), index_type));
        self
    }

    pub fn foreign_key(
        mut self,
        column: &str,
        ref_table: &str,
        ref_column: &str,
        on_delete: ForeignKeyAction,
    ) -> Self {
        self.foreign_keys
            .push(ForeignKeyInfo::new(column, ref_table, ref_column, on_delete));
        self
    }
}

/// Deterministic index name, e.g. `UNQ_ALEKSEON_CUSTOM_FORM_IDENTIFIER`.
pub fn index_name(table: &str, columns: &[&str], index_type: IndexType) -> String {
    let long = format!("{}_{}", table, columns.join("_")).to_ascii_uppercase();
    shorten(index_type.prefix(), &long)
}

/// Deterministic foreign key name derived from both ends of the relation.
pub fn foreign_key_name(table: &str, column: &str, ref_table: &str, ref_column: &str) -> String {
    let long = format!("{table}_{column}_{ref_table}_{ref_column}").to_ascii_uppercase();
    shorten("FK", &long)
}

fn shorten(prefix: &str, long: &str) -> String {
    let name = format!("{prefix}_{long}");
    if name.len() <= MAX_IDENTIFIER_LENGTH {
        return name;
    }
    let mut hasher = md5::Context::new();
    hasher.consume(long.as_bytes());
    format!("{prefix}_{:X}", hasher.finalize())
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Schema-modification scope of one migration unit.
///
/// Wraps the unit's transaction and counts the structural statements it
/// executes, so callers can tell a no-op run from a real upgrade.
pub struct SchemaSetup<'c> {
    tx: Transaction<'c>,
    changes: usize,
}

impl<'c> SchemaSetup<'c> {
    pub(crate) fn new(tx: Transaction<'c>) -> Self {
        Self { tx, changes: 0 }
    }

    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    /// Number of structural statements executed so far.
    pub fn changes(&self) -> usize {
        self.changes
    }

    pub(crate) fn into_transaction(self) -> Transaction<'c> {
        self.tx
    }

    fn execute_ddl(&mut self, sql: &str) -> SetupResult<()> {
        debug!("ddl: {}", sql);
        self.tx.execute_batch(sql)?;
        self.changes += 1;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> SetupResult<bool> {
        let found = self
            .tx
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn describe_table(&self, table: &str) -> SetupResult<Vec<ColumnInfo>> {
        let mut stmt = self.tx.prepare(
            "SELECT name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map(params![table], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    declared_type: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    default_sql: row.get(3)?,
                    primary_key: row.get::<_, i64>(4)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(MigrationError::MissingTable(table.to_string()));
        }
        Ok(columns)
    }

    pub fn table_column_exists(&self, table: &str, column: &str) -> SetupResult<bool> {
        Ok(self
            .describe_table(table)?
            .iter()
            .any(|info| info.name == column))
    }

    pub fn foreign_keys(&self, table: &str) -> SetupResult<Vec<ForeignKeyInfo>> {
        let mut stmt = self.tx.prepare(
            "SELECT \"from\", \"table\", \"to\", on_delete FROM pragma_foreign_key_list(?1) ORDER BY id",
        )?;
        let keys = stmt
            .query_map(params![table], |row| {
                Ok(ForeignKeyInfo {
                    column: row.get(0)?,
                    ref_table: row.get(1)?,
                    ref_column: row.get(2)?,
                    on_delete: ForeignKeyAction::parse(&row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    pub fn index_exists(&self, name: &str) -> SetupResult<bool> {
        let found = self
            .tx
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn create_table(&mut self, table: &TableDefinition) -> SetupResult<bool> {
        if self.table_exists(&table.name)? {
            return Ok(false);
        }
        let mut definitions: Vec<String> = table
            .columns
            .iter()
            .map(|column| column.to_info().sql())
            .collect();
        definitions.extend(table.foreign_keys.iter().map(|fk| fk.sql(&table.name)));

        let mut sql = format!(
            "CREATE TABLE {} ({});",
            quote_ident(&table.name),
            definitions.join(", ")
        );
        for (columns, index_type) in &table.indexes {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            sql.push_str(&create_index_sql(&table.name, &columns, *index_type));
        }
        self.execute_ddl(&sql)?;
        Ok(true)
    }

    pub fn add_column(&mut self, table: &str, column: &ColumnDefinition) -> SetupResult<bool> {
        let mut columns = self.describe_table(table)?;
        if columns.iter().any(|info| info.name == column.name) {
            return Ok(false);
        }
        if column.can_add_in_place() {
            self.execute_ddl(&format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quote_ident(table),
                column.to_info().sql()
            ))?;
            return Ok(true);
        }

        let mut sources: Vec<Option<String>> =
            columns.iter().map(|info| Some(quote_ident(&info.name))).collect();
        columns.push(column.to_info());
        sources.push(None);
        let foreign_keys = self.foreign_keys(table)?;
        self.rebuild_table(table, &columns, &sources, &foreign_keys)?;
        Ok(true)
    }

    /// Brings an existing column to `column`'s definition, keeping its data.
    pub fn modify_column(&mut self, table: &str, column: &ColumnDefinition) -> SetupResult<bool> {
        let mut columns = self.describe_table(table)?;
        let desired = column.to_info();
        let position = columns
            .iter()
            .position(|info| info.name == column.name)
            .ok_or_else(|| MigrationError::MissingColumn {
                table: table.to_string(),
                column: column.name.clone(),
            })?;
        if columns[position].same_shape(&desired) {
            return Ok(false);
        }

        let sources: Vec<Option<String>> = columns
            .iter()
            .enumerate()
            .map(|(i, info)| {
                let name = quote_ident(&info.name);
                match (&desired.default_sql, i == position && desired.not_null) {
                    (Some(default), true) => Some(format!("COALESCE({name}, {default})")),
                    _ => Some(name),
                }
            })
            .collect();
        columns[position] = desired;
        let foreign_keys = self.foreign_keys(table)?;
        self.rebuild_table(table, &columns, &sources, &foreign_keys)?;
        Ok(true)
    }

    /// Renames `old_name` to `column.name` and retypes it in place.
    ///
    /// Falls back to [`modify_column`](Self::modify_column) when the rename
    /// already happened.
    pub fn change_column(
        &mut self,
        table: &str,
        old_name: &str,
        column: &ColumnDefinition,
    ) -> SetupResult<bool> {
        let old_exists = self.table_column_exists(table, old_name)?;
        if !old_exists || old_name == column.name {
            return self.modify_column(table, column);
        }
        self.execute_ddl(&format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote_ident(table),
            quote_ident(old_name),
            quote_ident(&column.name)
        ))?;
        self.modify_column(table, column)?;
        Ok(true)
    }

    pub fn add_index(
        &mut self,
        table: &str,
        columns: &[&str],
        index_type: IndexType,
    ) -> SetupResult<bool> {
        if self.index_exists(&index_name(table, columns, index_type))? {
            return Ok(false);
        }
        let existing = self.describe_table(table)?;
        for column in columns {
            if !existing.iter().any(|info| info.name == *column) {
                return Err(MigrationError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
        self.execute_ddl(&create_index_sql(table, columns, index_type))?;
        Ok(true)
    }

    /// Adds (or replaces the action of) the foreign key on `column`.
    ///
    /// Existing rows must already satisfy the constraint.
    pub fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        ref_table: &str,
        ref_column: &str,
        on_delete: ForeignKeyAction,
    ) -> SetupResult<bool> {
        let desired = ForeignKeyInfo::new(column, ref_table, ref_column, on_delete);
        let mut foreign_keys = self.foreign_keys(table)?;
        if foreign_keys.contains(&desired) {
            return Ok(false);
        }
        if !self.table_column_exists(ref_table, ref_column)? {
            return Err(MigrationError::MissingColumn {
                table: ref_table.to_string(),
                column: ref_column.to_string(),
            });
        }
        let columns = self.describe_table(table)?;
        if !columns.iter().any(|info| info.name == column) {
            return Err(MigrationError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }

        foreign_keys.retain(|fk| fk.column != column);
        foreign_keys.push(desired);
        let sources: Vec<Option<String>> =
            columns.iter().map(|info| Some(quote_ident(&info.name))).collect();
        self.rebuild_table(table, &columns, &sources, &foreign_keys)?;
        self.check_foreign_keys(Some(table))?;
        Ok(true)
    }

    /// Fails on the first row violating a foreign key, in `table` or in the
    /// whole database.
    pub fn check_foreign_keys(&self, table: Option<&str>) -> SetupResult<()> {
        let sql = match table {
            Some(table) => format!("PRAGMA foreign_key_check({})", quote_ident(table)),
            None => "PRAGMA foreign_key_check".to_string(),
        };
        let violation = self
            .tx
            .query_row(&sql, [], |row| {
                Ok(MigrationError::ForeignKeyViolation {
                    table: row.get(0)?,
                    rowid: row.get(1)?,
                    parent: row.get(2)?,
                })
            })
            .optional()?;
        match violation {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Recreates `table` with `columns` and `foreign_keys`. `sources[i]` is
    /// the expression over the old table copied into `columns[i]`; `None`
    /// leaves the column to its default.
    fn rebuild_table(
        &mut self,
        table: &str,
        columns: &[ColumnInfo],
        sources: &[Option<String>],
        foreign_keys: &[ForeignKeyInfo],
    ) -> SetupResult<()> {
        let indexes: Vec<String> = {
            let mut stmt = self.tx.prepare(
                "SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL ORDER BY name",
            )?;
            let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let shadow = format!("{table}__rebuild");
        let mut definitions: Vec<String> = columns.iter().map(ColumnInfo::sql).collect();
        definitions.extend(foreign_keys.iter().map(|fk| fk.sql(table)));

        let mut sql = format!(
            "CREATE TABLE {} ({});",
            quote_ident(&shadow),
            definitions.join(", ")
        );
        let (targets, selects): (Vec<String>, Vec<String>) = columns
            .iter()
            .zip(sources)
            .filter_map(|(info, source)| {
                source
                    .as_ref()
                    .map(|expr| (quote_ident(&info.name), expr.clone()))
            })
            .unzip();
        if !targets.is_empty() {
            sql.push_str(&format!(
                "INSERT INTO {} ({}) SELECT {} FROM {};",
                quote_ident(&shadow),
                targets.join(", "),
                selects.join(", "),
                quote_ident(table)
            ));
        }
        sql.push_str(&format!(
            "DROP TABLE {};ALTER TABLE {} RENAME TO {};",
            quote_ident(table),
            quote_ident(&shadow),
            quote_ident(table)
        ));
        for index in indexes {
            sql.push_str(&index);
            sql.push(';');
        }
        self.execute_ddl(&sql)
    }
}

fn create_index_sql(table: &str, columns: &[&str], index_type: IndexType) -> String {
    let unique = match index_type {
        IndexType::Unique => "UNIQUE ",
        IndexType::Index => "",
    };
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({});",
        unique,
        quote_ident(&index_name(table, columns, index_type)),
        quote_ident(table),
        quoted.join(", ")
    )
}
