use crate::compile::compile;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct QueryConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub events: Vec<EventBinding>,
    /// Directory relative paths resolve against; set when loaded from a file.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_true")]
    pub user_agent_styles: bool,
    #[serde(default)]
    pub user_stylesheet: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            user_agent_styles: true,
            user_stylesheet: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct EventBinding {
    pub selector: String,
    #[serde(default)]
    pub names: Vec<String>,
}

impl QueryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if let Some(sheet) = &self.engine.user_stylesheet {
            if sheet.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    binding: None,
                    field: "engine.user_stylesheet",
                });
            }
        }

        for (index, binding) in self.events.iter().enumerate() {
            if binding.selector.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    binding: Some(index),
                    field: "selector",
                });
            } else if let Err(error) = compile(&binding.selector) {
                issues.push(ValidationIssue::InvalidSelector {
                    binding: index,
                    message: error.to_string(),
                });
            }

            if binding.names.iter().all(|name| name.trim().is_empty()) {
                issues.push(ValidationIssue::MissingField {
                    binding: Some(index),
                    field: "names",
                });
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    /// Resolved path of the user style sheet, if configured.
    pub fn user_stylesheet_path(&self) -> Option<PathBuf> {
        let sheet = self.engine.user_stylesheet.as_deref()?;
        let path = Path::new(sheet);
        Some(match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    MissingField {
        binding: Option<usize>,
        field: &'static str,
    },
    InvalidSelector {
        binding: usize,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { binding, field } => match binding {
                Some(index) => write!(f, "event binding #{index} missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::InvalidSelector { binding, message } => {
                write!(f, "event binding #{binding} has an invalid selector: {message}")
            }
        }
    }
}
