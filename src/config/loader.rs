use crate::config::schema::{QueryConfig, ValidationError};
use crate::dom::{Document, DocumentError};
use crate::query::errors::QueryError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
    StyleSheet {
        source: DocumentError,
    },
    Binding {
        selector: String,
        source: QueryError,
    },
}

impl ConfigError {
    fn with_path(self, path: &Path) -> Self {
        let path = path.to_path_buf();
        match self {
            ConfigError::Toml { path: None, source } => ConfigError::Toml {
                path: Some(path),
                source,
            },
            ConfigError::Validation { path: None, source } => ConfigError::Validation {
                path: Some(path),
                source,
            },
            other => other,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(
                    f,
                    "failed to read query config from {}: {}",
                    path.display(),
                    source
                )
            }
            ConfigError::Toml { path, source } => match path {
                Some(path) => write!(
                    f,
                    "failed to parse query config TOML ({}): {}",
                    path.display(),
                    source
                ),
                None => write!(f, "failed to parse query config TOML: {}", source),
            },
            ConfigError::Validation { path, source } => match path {
                Some(path) => write!(f, "invalid query config ({}): {}", path.display(), source),
                None => write!(f, "invalid query config: {}", source),
            },
            ConfigError::StyleSheet { source } => {
                write!(f, "failed to apply user style sheet: {}", source)
            }
            ConfigError::Binding { selector, source } => {
                write!(f, "failed to bind events for '{}': {}", selector, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
            ConfigError::StyleSheet { source } => Some(source),
            ConfigError::Binding { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<QueryConfig, ConfigError> {
    let config: QueryConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: None, source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: None, source })?;
    Ok(config)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<QueryConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = load_from_str(&contents).map_err(|error| error.with_path(path))?;
    config.base_dir = path.parent().map(Path::to_path_buf);
    Ok(config)
}

/// What [`QueryConfig::apply`] changed on a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub user_stylesheet: bool,
    pub tagged_elements: usize,
}

impl QueryConfig {
    /// Load the user style sheet and tag configured event listeners.
    ///
    /// `engine.user_agent_styles` is a parse-time option; pass
    /// [`QueryConfig::document_options`] when building the document.
    pub fn apply(&self, document: &mut Document) -> Result<ApplyReport, ConfigError> {
        let mut report = ApplyReport::default();

        if let Some(path) = self.user_stylesheet_path() {
            document
                .load_user_stylesheet(&path)
                .map_err(|source| ConfigError::StyleSheet { source })?;
            report.user_stylesheet = true;
        }

        for binding in &self.events {
            let names: Vec<&str> = binding
                .names
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .collect();
            report.tagged_elements += document
                .tag_events(&binding.selector, &names)
                .map_err(|source| ConfigError::Binding {
                    selector: binding.selector.clone(),
                    source,
                })?;
        }

        info!(
            user_stylesheet = report.user_stylesheet,
            tagged = report.tagged_elements,
            "applied query config"
        );
        Ok(report)
    }

    pub fn document_options(&self) -> crate::dom::DocumentOptions {
        crate::dom::DocumentOptions {
            user_agent_styles: self.engine.user_agent_styles,
            ..crate::dom::DocumentOptions::default()
        }
    }
}
