//! Data model shared between the custom forms backend and its clients.
//!
//! Forms, their fields (attributes) and the records submitted against them
//! are all dynamically attributed: the set of legal attribute codes of a
//! record is data, not a compile time struct. The types here only describe
//! the shapes; persistence lives in the backend crate.

pub mod model;
pub mod requests;
