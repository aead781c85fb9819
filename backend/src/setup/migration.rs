//! Version-gated migration runner.
//!
//! The installed schema version of the module lives in `setup_module`. A run
//! reads it once, applies every step whose version is newer, verifies foreign
//! keys and records the newest step version, all inside one transaction. Any
//! failing step rolls the whole run back.

use crate::error::MigrationError;
use crate::setup::adapter::SchemaSetup;
use crate::setup::upgrades;
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use semver::Version;

pub const MODULE_NAME: &str = "Alekseon_CustomFormsBuilder";

pub type StepFn = fn(&mut SchemaSetup<'_>) -> Result<(), MigrationError>;

/// One structural change, tagged with the module version that introduced it.
pub struct MigrationStep {
    pub version: Version,
    pub name: &'static str,
    /// Skip on fresh installs; the step only repairs tables created by an
    /// older release.
    pub existing_installs_only: bool,
    apply: StepFn,
}

impl MigrationStep {
    pub fn new(version: Version, name: &'static str, apply: StepFn) -> Self {
        Self {
            version,
            name,
            existing_installs_only: false,
            apply,
        }
    }

    pub fn existing_installs_only(mut self) -> Self {
        self.existing_installs_only = true;
        self
    }

    fn applies_to(&self, installed: Option<&Version>, force: bool) -> bool {
        match installed {
            None => !self.existing_installs_only,
            Some(_) if force => true,
            Some(installed) => installed < &self.version,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub installed_version: Option<String>,
    pub target_version: Option<String>,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub structural_changes: usize,
}

pub struct Migrator {
    module: &'static str,
    steps: Vec<MigrationStep>,
    force: bool,
}

impl Migrator {
    pub fn new(module: &'static str, steps: Vec<MigrationStep>) -> Self {
        Self {
            module,
            steps,
            force: false,
        }
    }

    /// The module's own step list.
    pub fn custom_forms() -> Self {
        Self::new(MODULE_NAME, upgrades::schema_steps())
    }

    /// Re-run every step regardless of the installed version.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn target_version(&self) -> Option<&Version> {
        self.steps.iter().map(|step| &step.version).max()
    }

    pub fn installed_version(&self, conn: &Connection) -> Result<Option<Version>, MigrationError> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'setup_module'",
                [],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_none() {
            return Ok(None);
        }
        read_installed_version(conn, self.module)
    }

    pub fn apply(&self, conn: &mut Connection) -> Result<MigrationReport, MigrationError> {
        // foreign_keys cannot change inside a transaction, and table rebuilds
        // must not trigger cascades.
        conn.pragma_update(None, "foreign_keys", false)?;
        let result = self.apply_unit(conn);
        let restored = conn.pragma_update(None, "foreign_keys", true);

        match result {
            Ok(report) => {
                restored?;
                Ok(report)
            }
            Err(err) => {
                error!("schema migration of {} failed: {}", self.module, err);
                Err(err)
            }
        }
    }

    fn apply_unit(&self, conn: &mut Connection) -> Result<MigrationReport, MigrationError> {
        // take the write lock before reading the installed version so a
        // concurrent runner waits here and then sees our version
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS setup_module (
                 module VARCHAR(50) PRIMARY KEY,
                 schema_version VARCHAR(50) NOT NULL
             )",
        )?;
        let installed = read_installed_version(&tx, self.module)?;
        let mut setup = SchemaSetup::new(tx);
        let mut report = MigrationReport {
            installed_version: installed.as_ref().map(Version::to_string),
            target_version: self.target_version().map(Version::to_string),
            ..MigrationReport::default()
        };

        for step in &self.steps {
            if !step.applies_to(installed.as_ref(), self.force) {
                debug!("skipping {} {} ({})", self.module, step.version, step.name);
                report.skipped.push(step.version.to_string());
                continue;
            }
            let before = setup.changes();
            (step.apply)(&mut setup).map_err(|source| MigrationError::Step {
                version: step.version.to_string(),
                name: step.name,
                source: Box::new(source),
            })?;
            info!(
                "applied {} {} ({}): {} structural change(s)",
                self.module,
                step.version,
                step.name,
                setup.changes() - before
            );
            report.applied.push(step.version.to_string());
        }

        setup.check_foreign_keys(None)?;
        report.structural_changes = setup.changes();

        if let Some(target) = self.target_version() {
            if installed.as_ref().map_or(true, |installed| installed < target) {
                setup.connection().execute(
                    "INSERT INTO setup_module (module, schema_version) VALUES (?1, ?2)
                     ON CONFLICT(module) DO UPDATE SET schema_version = excluded.schema_version",
                    params![self.module, target.to_string()],
                )?;
            }
        }
        setup.into_transaction().commit()?;
        Ok(report)
    }
}

fn read_installed_version(
    conn: &Connection,
    module: &str,
) -> Result<Option<Version>, MigrationError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT schema_version FROM setup_module WHERE module = ?1",
            params![module],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|version| {
        Version::parse(&version).map_err(|source| MigrationError::InvalidVersion { version, source })
    })
    .transpose()
}
