//! Templates, colours and style settings with their invariants.

pub mod catalog;
pub mod color;
pub mod error;
pub mod settings;
pub mod template;
