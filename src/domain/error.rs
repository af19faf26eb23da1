use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("markdown is required")]
    MissingMarkdown,
    #[error("template `{id}` not found")]
    UnknownTemplate { id: String },
    #[error("invalid `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("template catalog is invalid: {message}")]
    Catalog { message: String },
}

impl DomainError {
    pub fn unknown_template(id: impl Into<String>) -> Self {
        Self::UnknownTemplate { id: id.into() }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
        }
    }
}
