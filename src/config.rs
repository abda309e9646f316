//! 配置模块：声明式描述算子流水线。
//!
//! # Pipeline Configuration
//!
//! A [`PipelineConfig`] lists operators in the order they run, plus the assembler
//! and serializer settings shared by every operator. It is read from YAML or JSON:
//!
//! ```yaml
//! assembler:
//!   snapshot_mode: copy_on_write
//! serializer:
//!   id_prefix: "part-"
//! operators:
//!   - filter:
//!       include_parts: ["text", "tool-*"]
//!       exclude_events: ["reasoning-delta"]
//!   - buffer:
//!       parts: ["tool-*"]
//! ```
//!
//! Type patterns are exact (`text`) or end in a single `*` (`tool-*`).
//! [`PipelineConfig::from_env`] reads the file named by `UI_PART_STREAM_CONFIG`.

use crate::assemble::SnapshotMode;
use crate::pipeline::{PartPattern, PipelineError};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Environment variable holding the path of a pipeline config file.
pub const CONFIG_ENV: &str = "UI_PART_STREAM_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub assembler: AssemblerConfig,
    pub serializer: SerializerConfig,
    /// Each entry is a single-key map (`- filter: {...}`) in YAML as well as JSON.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub operators: Vec<OperatorConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    pub snapshot_mode: SnapshotMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializerConfig {
    /// Prefix for ids generated when a transform produces more parts than it consumed.
    pub id_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorConfig {
    Filter(FilterConfig),
    /// Re-emit matching parts only once they are complete.
    Buffer(BufferConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterConfig {
    pub include_parts: Vec<String>,
    pub exclude_parts: Vec<String>,
    pub include_events: Vec<String>,
    pub exclude_events: Vec<String>,
}

impl FilterConfig {
    fn guards(&self) -> [(&'static str, &[String]); 4] {
        [
            ("include_parts", self.include_parts.as_slice()),
            ("exclude_parts", self.exclude_parts.as_slice()),
            ("include_events", self.include_events.as_slice()),
            ("exclude_events", self.exclude_events.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BufferConfig {
    pub parts: Vec<String>,
}

fn check_patterns(path: &str, patterns: &[String]) -> std::result::Result<(), PipelineError> {
    for (i, pattern) in patterns.iter().enumerate() {
        PartPattern::parse(pattern)
            .map_err(|e| PipelineError::Configuration(format!("{}[{}]: {}", path, i, e)))?;
    }
    Ok(())
}

impl PipelineConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid pipeline config: {}", e),
                ErrorContext::new()
                    .with_details("YAML")
                    .with_source("config_loader"),
            )
        })?;
        config.checked()
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid pipeline config: {}", e),
                ErrorContext::new()
                    .with_details("JSON")
                    .with_source("config_loader"),
            )
        })?;
        config.checked()
    }

    /// Load from a file; `.json` files are read as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading pipeline config");
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        parsed.map_err(|e| match e {
            Error::Configuration { message, context } => Error::Configuration {
                message,
                context: context.with_field_path(path.display().to_string()),
            },
            other => other,
        })
    }

    /// Load the file named by [`CONFIG_ENV`]; `Ok(None)` when it is not set.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(path.trim()).map(Some),
            _ => Ok(None),
        }
    }

    /// Check guards and patterns without building anything.
    pub fn validate(&self) -> std::result::Result<(), PipelineError> {
        for (i, op) in self.operators.iter().enumerate() {
            match op {
                OperatorConfig::Filter(filter) => {
                    let guards = filter.guards();
                    if guards.iter().all(|(_, patterns)| patterns.is_empty()) {
                        return Err(PipelineError::Configuration(format!(
                            "operators[{}].filter must name at least one of include_parts, exclude_parts, include_events, exclude_events",
                            i
                        )));
                    }
                    for (name, patterns) in guards {
                        check_patterns(&format!("operators[{}].filter.{}", i, name), patterns)?;
                    }
                }
                OperatorConfig::Buffer(buffer) => {
                    if buffer.parts.is_empty() {
                        return Err(PipelineError::Configuration(format!(
                            "operators[{}].buffer.parts must not be empty",
                            i
                        )));
                    }
                    check_patterns(&format!("operators[{}].buffer.parts", i), &buffer.parts)?;
                }
            }
        }
        Ok(())
    }

    fn checked(self) -> Result<Self> {
        self.validate().map_err(|e| {
            Error::validation_with_context(
                e.to_string(),
                ErrorContext::new().with_source("pipeline_config"),
            )
        })?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
assembler:
  snapshot_mode: copy_on_write
serializer:
  id_prefix: "part-"
operators:
  - filter:
      include_parts: ["text", "tool-*"]
      exclude_events: ["reasoning-delta"]
  - buffer:
      parts: ["tool-*"]
"#;

    #[test]
    fn test_yaml_config() {
        let config = PipelineConfig::from_yaml_str(EXAMPLE).unwrap();
        assert_eq!(config.assembler.snapshot_mode, SnapshotMode::CopyOnWrite);
        assert_eq!(config.serializer.id_prefix.as_deref(), Some("part-"));
        assert_eq!(config.operators.len(), 2);
        assert_eq!(
            config.operators[0],
            OperatorConfig::Filter(FilterConfig {
                include_parts: vec!["text".into(), "tool-*".into()],
                exclude_events: vec!["reasoning-delta".into()],
                ..Default::default()
            })
        );
        assert_eq!(
            config.operators[1],
            OperatorConfig::Buffer(BufferConfig {
                parts: vec!["tool-*".into()]
            })
        );
    }

    #[test]
    fn test_yaml_operators_are_single_key_maps() {
        let config = PipelineConfig::from_yaml_str(EXAMPLE).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("- filter:"));
        assert!(yaml.contains("- buffer:"));
        assert!(!yaml.contains('!'));
        assert_eq!(PipelineConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_json_config_and_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"operators":[{"filter":{"exclude_parts":["reasoning"]}}]}"#,
        )
        .unwrap();
        assert_eq!(config.assembler.snapshot_mode, SnapshotMode::InPlace);
        assert!(config.serializer.id_prefix.is_none());
        assert_eq!(config.operators.len(), 1);

        let empty = PipelineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(empty, PipelineConfig::default());
    }

    #[test]
    fn test_filter_without_guard_is_rejected() {
        let err = PipelineConfig::from_yaml_str("operators:\n  - filter: {}\n").unwrap_err();
        match err {
            Error::Validation { message, context } => {
                assert!(message.contains("operators[0].filter"));
                assert_eq!(context.source.as_deref(), Some("pipeline_config"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_bad_patterns_are_rejected() {
        let err = PipelineConfig::from_yaml_str(
            "operators:\n  - buffer:\n      parts: [\"to*ol\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(err.to_string().contains("operators[0].buffer.parts[0]"));

        let err = PipelineConfig::from_yaml_str("operators:\n  - buffer:\n      parts: []\n")
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_unknown_fields_are_configuration_errors() {
        let err = PipelineConfig::from_yaml_str(
            "operators:\n  - filter:\n      include_part: [\"text\"]\n",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_load_from_file_by_extension() {
        let dir = std::env::temp_dir();
        let stem = format!("ui-part-stream-{}", uuid::Uuid::new_v4().simple());

        let yaml_path = dir.join(format!("{}.yaml", stem));
        std::fs::write(&yaml_path, EXAMPLE).unwrap();
        let config = PipelineConfig::load(&yaml_path).unwrap();
        assert_eq!(config.operators.len(), 2);

        let json_path = dir.join(format!("{}.json", stem));
        std::fs::write(&json_path, "{\"operators\": [{\"buffer\": {}}]}").unwrap();
        let err = PipelineConfig::load(&json_path).unwrap_err();
        match err {
            Error::Configuration { context, .. } => {
                assert_eq!(
                    context.field_path.as_deref(),
                    Some(json_path.display().to_string().as_str())
                );
            }
            other => panic!("unexpected error: {}", other),
        }

        let missing = PipelineConfig::load(dir.join(format!("{}-missing.yaml", stem)));
        assert!(matches!(missing, Err(Error::Io(_))));

        let _ = std::fs::remove_file(yaml_path);
        let _ = std::fs::remove_file(json_path);
    }
}
