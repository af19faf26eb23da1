//! Conversion, styling and export services.

pub mod clipboard;
pub mod convert;
pub mod error;
pub mod export;
pub mod markup;
pub mod render;
pub mod stats;
pub mod style;
