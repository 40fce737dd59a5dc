// Configuration loading

pub mod error;
pub mod pipeline;

pub use error::ConfigError;
pub use pipeline::{
    InputConfig, NormalizeConfig, OutputConfig, PipelineConfig, RegistryConfig,
};
