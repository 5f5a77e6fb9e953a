//! Shared helpers.

pub mod template;

pub use template::{Template, TemplateError};
