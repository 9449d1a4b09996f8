pub mod id;
pub mod sanitize;
