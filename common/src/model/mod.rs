pub mod attribute;
pub mod form;
pub mod record;
pub mod value;
