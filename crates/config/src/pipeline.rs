use std::fs;
use std::path::{Path, PathBuf};

use healthops_recon::PositivityPolicy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_REGISTRY_URL: &str =
    "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Everything one pipeline run needs. Every field has a default, so an empty
/// document is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub registry: RegistryConfig,
    pub normalize: NormalizeConfig,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Root of the raw disclosure tree.
    pub corpus_dir: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { corpus_dir: PathBuf::from("downloads_ans") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
    /// Stage A archive holding the consolidated expense dataset.
    pub consolidated_archive: String,
    pub detailed_file: String,
    pub aggregate_file: String,
    /// Stage B archive holding the detailed and aggregate datasets.
    pub delivery_archive: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            consolidated_archive: "consolidado_despesas.zip".into(),
            detailed_file: "relatorio_final_validado.csv".into(),
            aggregate_file: "despesas_agregadas.csv".into(),
            delivery_archive: "consolidado_validado.zip".into(),
        }
    }
}

impl OutputConfig {
    pub fn consolidated_archive_path(&self) -> PathBuf {
        self.dir.join(&self.consolidated_archive)
    }

    /// Name of the dataset inside the consolidated archive, and of the
    /// staging file written next to it.
    pub fn consolidated_entry(&self) -> String {
        let stem = Path::new(&self.consolidated_archive)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "consolidado_despesas".into());
        format!("{stem}.csv")
    }

    pub fn staging_path(&self) -> PathBuf {
        self.dir.join(self.consolidated_entry())
    }

    pub fn detailed_path(&self) -> PathBuf {
        self.dir.join(&self.detailed_file)
    }

    pub fn aggregate_path(&self) -> PathBuf {
        self.dir.join(&self.aggregate_file)
    }

    pub fn delivery_archive_path(&self) -> PathBuf {
        self.dir.join(&self.delivery_archive)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Directory-style web index listing the registry dataset.
    pub url: String,
    /// Where downloaded registry files are kept between runs.
    pub cache_dir: PathBuf,
    /// Local registry file. When set the network is never touched.
    pub path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.into(),
            cache_dir: PathBuf::from("csv"),
            path: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeConfig {
    pub positivity: PositivityPolicy,
}

// ---------------------------------------------------------------------------
// Load + Validate
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// `<config_dir>/healthops/pipeline.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("healthops")
            .join("pipeline.toml")
    }

    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_toml(&contents)?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Explicit path if given, else the default location if it exists, else
    /// built-in defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let default = Self::default_path();
        if default.is_file() {
            Self::load(&default)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let out = &self.output;
        for (field, name) in [
            ("output.consolidated_archive", &out.consolidated_archive),
            ("output.detailed_file", &out.detailed_file),
            ("output.aggregate_file", &out.aggregate_file),
            ("output.delivery_archive", &out.delivery_archive),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{field} must not be empty")));
            }
            if name.contains('/') || name.contains('\\') {
                return Err(ConfigError::Validation(format!(
                    "{field} must be a file name, got '{name}'"
                )));
            }
        }

        if out.detailed_file == out.aggregate_file {
            return Err(ConfigError::Validation(
                "output.detailed_file and output.aggregate_file must differ".into(),
            ));
        }
        if out.consolidated_archive == out.delivery_archive {
            return Err(ConfigError::Validation(
                "output.consolidated_archive and output.delivery_archive must differ".into(),
            ));
        }

        if self.registry.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "registry.timeout_secs must be at least 1".into(),
            ));
        }
        let url = self.registry.url.to_ascii_lowercase();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "registry.url must be http(s), got '{}'",
                self.registry.url
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[input]
corpus_dir = "raw/ans"

[output]
dir = "out"
detailed_file = "detalhado.csv"
aggregate_file = "agregado.csv"

[registry]
url = "http://localhost:8080/operadoras/"
cache_dir = "cache"
timeout_secs = 5

[normalize]
positivity = "flag_suspicious"
"#;

    #[test]
    fn empty_document_is_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.input.corpus_dir, PathBuf::from("downloads_ans"));
        assert_eq!(config.normalize.positivity, PositivityPolicy::StrictDrop);
        assert_eq!(config.registry.timeout_secs, 15);
        assert!(config.registry.path.is_none());
    }

    #[test]
    fn full_document_parses() {
        let config = PipelineConfig::from_toml(FULL).unwrap();
        assert_eq!(config.input.corpus_dir, PathBuf::from("raw/ans"));
        assert_eq!(config.output.detailed_path(), PathBuf::from("out/detalhado.csv"));
        // untouched fields keep defaults
        assert_eq!(config.output.delivery_archive, "consolidado_validado.zip");
        assert_eq!(config.registry.cache_dir, PathBuf::from("cache"));
        assert_eq!(config.normalize.positivity, PositivityPolicy::FlagSuspicious);
    }

    #[test]
    fn derived_paths() {
        let out = OutputConfig::default();
        assert_eq!(out.consolidated_entry(), "consolidado_despesas.csv");
        assert_eq!(out.staging_path(), PathBuf::from("data/consolidado_despesas.csv"));
        assert_eq!(
            out.consolidated_archive_path(),
            PathBuf::from("data/consolidado_despesas.zip")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = PipelineConfig::from_toml("[input]\ncorpus = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn bad_policy_is_parse_error() {
        let err = PipelineConfig::from_toml("[normalize]\npositivity = \"lenient\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_failures() {
        let cases = [
            "[output]\ndetailed_file = \"\"\n",
            "[output]\naggregate_file = \"sub/agg.csv\"\n",
            "[output]\ndetailed_file = \"a.csv\"\naggregate_file = \"a.csv\"\n",
            "[output]\ndelivery_archive = \"consolidado_despesas.zip\"\n",
            "[registry]\ntimeout_secs = 0\n",
            "[registry]\nurl = \"ftp://example.org/\"\n",
        ];
        for case in cases {
            let err = PipelineConfig::from_toml(case).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{case}: {err}");
        }
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn resolve_prefers_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, FULL).unwrap();
        let config = PipelineConfig::resolve(Some(&path)).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("out"));
    }
}
