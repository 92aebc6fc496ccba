//! Kubeconfig context management.
//!
//! Context switches mutate kubeconfig on disk, not anything in this process;
//! the current context is always queried from kubectl on demand.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::ContextError;
use crate::validator::KUBECTL;

/// Actions accepted by the context tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextAction {
    /// Show the current context.
    Get,
    /// List all contexts.
    List,
    /// Switch context.
    Use,
}

impl ContextAction {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Use => "use",
        }
    }
}

impl fmt::Display for ContextAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextAction {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "get" => Ok(Self::Get),
            "list" => Ok(Self::List),
            "use" => Ok(Self::Use),
            other => Err(ContextError::InvalidAction(other.to_string())),
        }
    }
}

/// Raw context tool arguments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextArgs {
    /// `get`, `list` or `use`; defaults to `get`.
    #[serde(default)]
    pub action: Option<String>,
    /// Target for `use`.
    #[serde(default)]
    pub context_name: Option<String>,
}

/// A fully-formed context operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextCommand {
    /// `kubectl config current-context`
    Current,
    /// `kubectl config get-contexts`
    List,
    /// `kubectl config use-context <name>`
    Use(String),
}

impl ContextCommand {
    /// Build a command from tool arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::InvalidAction`] for unknown actions,
    /// [`ContextError::MissingContextName`] when `use` has no (or an empty)
    /// target and [`ContextError::InvalidContextName`] when the target starts
    /// with `-`.
    pub fn from_args(args: &ContextArgs) -> Result<Self, ContextError> {
        let action = args.action.as_deref().unwrap_or("get").parse()?;
        match action {
            ContextAction::Get => Ok(Self::Current),
            ContextAction::List => Ok(Self::List),
            ContextAction::Use => match args.context_name.as_deref() {
                // kubectl would read a leading dash as a flag, not a context.
                Some(name) if name.starts_with('-') => {
                    Err(ContextError::InvalidContextName(name.to_string()))
                }
                Some(name) if !name.is_empty() => Ok(Self::Use(name.to_string())),
                _ => Err(ContextError::MissingContextName),
            },
        }
    }

    /// The action this command performs.
    pub fn action(&self) -> ContextAction {
        match self {
            Self::Current => ContextAction::Get,
            Self::List => ContextAction::List,
            Self::Use(_) => ContextAction::Use,
        }
    }

    /// Full token list, binary name first.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = vec![KUBECTL.to_string(), "config".to_string()];
        match self {
            Self::Current => tokens.push("current-context".to_string()),
            Self::List => tokens.push("get-contexts".to_string()),
            Self::Use(name) => {
                tokens.push("use-context".to_string());
                tokens.push(name.clone());
            }
        }
        tokens
    }
}
