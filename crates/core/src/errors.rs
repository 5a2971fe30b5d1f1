use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("input failure: {0}")]
    Input(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Stable machine-readable class used in CLI payloads.
    pub fn error_class(&self) -> &'static str {
        match self {
            Self::Domain(_) | Self::Input(_) => "invalid_input",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "config_validation",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn snapshot_errors_are_classified_as_invalid_input() {
        let error = ApplicationError::from(DomainError::InvalidSnapshot(
            "cart line `l-1` has zero quantity".to_owned(),
        ));

        assert_eq!(error.error_class(), "invalid_input");
        assert_eq!(error.to_string(), "invalid snapshot: cart line `l-1` has zero quantity");
    }

    #[test]
    fn persistence_and_configuration_keep_distinct_classes() {
        assert_eq!(
            ApplicationError::Persistence("settings file is locked".to_owned()).error_class(),
            "persistence"
        );
        assert_eq!(
            ApplicationError::Configuration("rotation period is zero".to_owned()).error_class(),
            "config_validation"
        );
    }
}
