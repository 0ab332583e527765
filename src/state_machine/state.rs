//! Operation state types

use serde::{Deserialize, Serialize};
use std::fmt;

/// An orchestrated network operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Chat,
    Upload { file_name: String },
    Export,
    SwitchPatient { patient_id: String },
    ResetContext,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Chat => "chat",
            Operation::Upload { .. } => "upload",
            Operation::Export => "export",
            Operation::SwitchPatient { .. } => "switch_patient",
            Operation::ResetContext => "reset_context",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload { file_name } => write!(f, "upload of {file_name}"),
            Operation::SwitchPatient { patient_id } => write!(f, "switch to patient {patient_id}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Single-flight state of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationState {
    /// Ready to start an operation
    #[default]
    Idle,

    /// One operation in flight; every other start is rejected
    Busy { operation: Operation },
}

impl OperationState {
    pub fn busy(operation: Operation) -> Self {
        OperationState::Busy { operation }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, OperationState::Busy { .. })
    }

    pub fn operation(&self) -> Option<&Operation> {
        match self {
            OperationState::Busy { operation } => Some(operation),
            OperationState::Idle => None,
        }
    }
}
