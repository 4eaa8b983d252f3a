//! Non-fatal diagnostics and the success/failure outcome that carries them.
//!
//! Every step of package resolution reports through [`Outcome`]: a value
//! when one was produced, plus the diagnostics accumulated so far. Steps
//! never abort each other; their diagnostics concatenate in step order.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// A recoverable anomaly met while processing an archive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    /// Attach a structured payload
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Either a value with the diagnostics gathered while producing it, or
/// only the diagnostics explaining why there is no value.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success { value: T, diagnostics: Vec<Diagnostic> },
    Failure { diagnostics: Vec<Diagnostic> },
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success {
            value,
            diagnostics: Vec::new(),
        }
    }

    pub fn success_with(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Outcome::Success { value, diagnostics }
    }

    pub fn failure(diagnostic: Diagnostic) -> Self {
        Outcome::Failure {
            diagnostics: vec![diagnostic],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success { value, .. } => Some(value),
            Outcome::Failure { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Outcome::Success { diagnostics, .. } | Outcome::Failure { diagnostics } => diagnostics,
        }
    }

    /// Diagnostic messages only, mostly useful in assertions and logs
    pub fn messages(&self) -> Vec<&str> {
        self.diagnostics().iter().map(|d| d.message.as_str()).collect()
    }

    pub fn into_value(self) -> Option<T> {
        self.into_parts().0
    }

    pub fn into_parts(self) -> (Option<T>, Vec<Diagnostic>) {
        match self {
            Outcome::Success { value, diagnostics } => (Some(value), diagnostics),
            Outcome::Failure { diagnostics } => (None, diagnostics),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success { value, diagnostics } => Outcome::Success {
                value: f(value),
                diagnostics,
            },
            Outcome::Failure { diagnostics } => Outcome::Failure { diagnostics },
        }
    }

    /// Put the diagnostics of an earlier step in front of this step's own.
    pub fn prepend_diagnostics(self, mut earlier: Vec<Diagnostic>) -> Self {
        match self {
            Outcome::Success { value, diagnostics } => {
                earlier.extend(diagnostics);
                Outcome::Success {
                    value,
                    diagnostics: earlier,
                }
            }
            Outcome::Failure { diagnostics } => {
                earlier.extend(diagnostics);
                Outcome::Failure {
                    diagnostics: earlier,
                }
            }
        }
    }
}
