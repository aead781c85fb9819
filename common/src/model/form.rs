use serde::{Deserialize, Serialize};

/// A form defined by an administrator.
///
/// `title` is stored as an EAV attribute of the form entity type while
/// `identifier` and `created_at` are static columns of the form table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: Option<u32>,
    pub title: String,
    /// Globally unique across forms when present.
    pub identifier: Option<String>,
    /// `YYYY-MM-DD HH:MM:SS`, filled in by the database on insert.
    pub created_at: Option<String>,
}

impl Form {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            identifier: None,
            created_at: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }
}
