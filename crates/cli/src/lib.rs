//! `healthops` pipeline library: stage orchestration, registry acquisition,
//! run reporting. The binary in `main.rs` is a thin clap front end over it.

pub mod exit_codes;
pub mod fetch;
pub mod pipeline;
pub mod report;

use std::fmt;

use healthops_config::ConfigError;
use healthops_recon::ReconError;

use exit_codes::{
    EXIT_CONFIG, EXIT_ERROR, EXIT_IO, EXIT_REGISTRY_UNAVAILABLE, EXIT_REGISTRY_UNUSABLE,
    EXIT_USAGE,
};

/// Error carried up to `main`, printed as `error:` / `hint:` lines, and
/// mapped to the process exit code.
#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn general(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn registry_unavailable(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_REGISTRY_UNAVAILABLE,
            message: msg.into(),
            hint: Some("check network access or set registry.path to a local registry CSV".into()),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self { code: EXIT_CONFIG, message: err.to_string(), hint: None }
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::MissingRegistryColumn { .. } => {
                Some("expected a REGISTRO_OPERADORA or REG_ANS column".to_string())
            }
            ReconError::EmptyRegistry => None,
        };
        Self { code: EXIT_REGISTRY_UNUSABLE, message: err.to_string(), hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_code() {
        let err: CliError = ConfigError::Validation("bad".into()).into();
        assert_eq!(err.code, EXIT_CONFIG);
        assert!(err.message.contains("bad"));
    }

    #[test]
    fn registry_errors_map_to_unusable_code() {
        let err: CliError = ReconError::MissingRegistryColumn {
            field: "key",
            headers: vec!["CNPJ".into()],
        }
        .into();
        assert_eq!(err.code, EXIT_REGISTRY_UNUSABLE);
        assert!(err.hint.is_some());
    }
}
