use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thrift_codegen::TypeScriptConfig;

/// Configuration structure for thriftc.toml
/// The file is OPTIONAL - every setting has a default and CLI flags override it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThriftcConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub typescript: TypeScriptSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "./generated".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeScriptSettings {
    /// Module imported as `thrift` by generated files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thrift_import: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub indent: Option<usize>,
}

impl ThriftcConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ThriftcConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load config, returning None if file doesn't exist
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output.dir.trim().is_empty() {
            anyhow::bail!("[output] dir cannot be empty");
        }
        if let Some(module) = &self.typescript.thrift_import {
            if module.trim().is_empty() {
                anyhow::bail!("[typescript] thrift_import cannot be empty");
            }
        }
        Ok(())
    }

    pub fn output_dir(&self, override_dir: Option<PathBuf>) -> PathBuf {
        override_dir.unwrap_or_else(|| PathBuf::from(&self.output.dir))
    }

    pub fn typescript_config(&self) -> TypeScriptConfig {
        let mut config = TypeScriptConfig::default();
        if let Some(module) = &self.typescript.thrift_import {
            config = config.with_thrift_import(module.clone());
        }
        if let Some(indent) = self.typescript.indent {
            config = config.with_indent(indent);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sections() {
        let config: ThriftcConfig = toml::from_str("").unwrap();
        assert_eq!(config.output_dir(None), PathBuf::from("./generated"));
        assert_eq!(
            config.typescript_config().thrift_import,
            "@creditkarma/thrift-server-core"
        );
    }

    #[test]
    fn test_sections_and_override() {
        let config: ThriftcConfig = toml::from_str(
            r#"
            [output]
            dir = "src/gen"

            [typescript]
            thrift_import = "thrift"
            indent = 2
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.output_dir(None), PathBuf::from("src/gen"));
        assert_eq!(config.output_dir(Some("out".into())), PathBuf::from("out"));
        let ts = config.typescript_config();
        assert_eq!(ts.thrift_import, "thrift");
        assert_eq!(ts.indent, 2);
    }

    #[test]
    fn test_empty_output_dir_is_rejected() {
        let config: ThriftcConfig = toml::from_str("[output]\ndir = \"\"").unwrap();
        assert!(config.validate().is_err());
    }
}
