use crate::CoreError;
use std::fmt;
use tracing::info;

/// Where a bootstrap run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    ResolvingArch,
    Fetching,
    Installing,
    Normalizing,
    Composing,
    Launching,
    Success,
    Failed,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::ResolvingArch => "resolving-arch",
            Stage::Fetching => "fetching",
            Stage::Installing => "installing",
            Stage::Normalizing => "normalizing",
            Stage::Composing => "composing",
            Stage::Launching => "launching",
            Stage::Success => "success",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Success | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transitions only move forward. A reused workspace jumps from
/// `ResolvingArch` straight to `Normalizing`; a prepare-only run ends
/// after `Composing`. Every non-terminal stage may fail.
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (Stage::Init, Stage::ResolvingArch)
            | (Stage::ResolvingArch, Stage::Fetching | Stage::Normalizing)
            | (Stage::Fetching, Stage::Installing)
            | (Stage::Installing, Stage::Normalizing)
            | (Stage::Normalizing, Stage::Composing)
            | (Stage::Composing, Stage::Launching | Stage::Success)
            | (Stage::Launching, Stage::Success)
    ) || (to == Stage::Failed && !from.is_terminal());

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// The stages one run went through.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    current: Stage,
    history: Vec<Stage>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            current: Stage::Init,
            history: vec![Stage::Init],
        }
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    pub fn advance(&mut self, to: Stage) -> Result<(), CoreError> {
        validate_transition(self.current, to)?;
        info!("stage: {} -> {to}", self.current);
        self.current = to;
        self.history.push(to);
        Ok(())
    }

    /// Move to `Failed`, returning the stage the failure happened in.
    pub fn fail(&mut self) -> Stage {
        let at = self.current;
        if validate_transition(at, Stage::Failed).is_ok() {
            self.current = Stage::Failed;
            self.history.push(Stage::Failed);
        }
        at
    }
}
