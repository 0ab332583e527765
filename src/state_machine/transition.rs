//! Pure state transition function
//!
//! Every operation follows `Idle -> Busy -> Idle`. Starting anything while
//! busy is rejected before any effect is produced, and every settlement
//! returns to `Idle`, whatever its outcome.

use super::event::ExportFailure;
use super::{Effect, Event, Operation, OperationState};
use crate::backend::{BackendError, UploadResult};
use crate::session::Session;
use thiserror::Error;

pub const STATUS_GENERATING: &str = "generating…";
pub const STATUS_DONE: &str = "done";
pub const STATUS_NETWORK_ERROR: &str = "network error";
pub const STATUS_PROCESSING_DOCUMENT: &str = "processing document…";
pub const STATUS_DOCUMENT_PROCESSED: &str = "document processed";
pub const STATUS_EXPORTING: &str = "exporting…";
pub const STATUS_EXPORTED: &str = "exported";
pub const STATUS_SWITCHING_PATIENT: &str = "switching patient…";
pub const STATUS_RESETTING_CONTEXT: &str = "resetting context…";

/// Reply shown when the assistant could not be reached at all
pub const CHAT_FAILURE_TEXT: &str = "Sorry, I could not connect to the assistant.";
pub const EXPORT_PROGRESS_TEXT: &str = "Exporting the last reply…";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: OperationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: OperationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    /// No-op: same state, no effects
    pub fn unchanged(state: &OperationState) -> Self {
        Self::new(state.clone())
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }

    pub fn is_noop(&self) -> bool {
        self.effects.is_empty()
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Session is busy with {operation}, wait for it to finish")]
    Busy { operation: Operation },
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Reads the session, never writes it. The runtime installs `new_state`
/// and then applies the effects in order.
#[allow(clippy::too_many_lines)] // One arm per operation phase
pub fn transition(session: &Session, event: Event) -> Result<TransitionResult, TransitionError> {
    let state = session.operation();

    match (state, event) {
        // Single flight: nothing starts while an operation is in flight
        (OperationState::Busy { operation }, event) if !event.is_settlement() => {
            Err(TransitionError::Busy {
                operation: operation.clone(),
            })
        }

        // ============================================================
        // Chat
        // ============================================================
        (OperationState::Idle, Event::SendMessage { text }) => {
            if text.trim().is_empty() {
                return Ok(TransitionResult::unchanged(state));
            }
            Ok(TransitionResult::new(OperationState::busy(Operation::Chat))
                .with_effect(Effect::user_message(text.clone()))
                .with_effect(Effect::ShowPlaceholder)
                .with_effect(Effect::status(STATUS_GENERATING))
                .with_effect(Effect::RequestChat { message: text }))
        }

        (
            OperationState::Busy {
                operation: operation @ Operation::Chat,
            },
            Event::ChatSettled { result },
        ) => Ok(settle_chat(operation, result)),

        // ============================================================
        // Document upload
        // ============================================================
        (OperationState::Idle, Event::UploadDocument { file }) => {
            let operation = Operation::Upload {
                file_name: file.name.clone(),
            };
            Ok(TransitionResult::new(OperationState::busy(operation))
                .with_effect(Effect::user_message(format!("uploading {}", file.name)))
                .with_effect(Effect::status(STATUS_PROCESSING_DOCUMENT))
                .with_effect(Effect::RequestUpload { file }))
        }

        (
            OperationState::Busy {
                operation: operation @ Operation::Upload { file_name },
            },
            Event::UploadSettled { result },
        ) => Ok(settle_upload(operation, file_name, result)),

        // ============================================================
        // Export
        // ============================================================
        (OperationState::Idle, Event::ExportLastReply) => {
            // No reply yet still exports, with empty content
            let text = session.last_assistant_reply().unwrap_or_default().to_string();
            Ok(TransitionResult::new(OperationState::busy(Operation::Export))
                .with_effect(Effect::assistant_message(EXPORT_PROGRESS_TEXT))
                .with_effect(Effect::status(STATUS_EXPORTING))
                .with_effect(Effect::RequestExport { text }))
        }

        (
            OperationState::Busy {
                operation: operation @ Operation::Export,
            },
            Event::ExportSettled { result },
        ) => Ok(settle_export(operation, result)),

        // ============================================================
        // Patient switching and reset
        // ============================================================
        (OperationState::Idle, Event::SwitchPatient { patient_id }) => {
            let patient_id = patient_id.trim();
            if patient_id.is_empty() {
                return Ok(TransitionResult::unchanged(state));
            }
            let operation = Operation::SwitchPatient {
                patient_id: patient_id.to_string(),
            };
            Ok(TransitionResult::new(OperationState::busy(operation))
                .with_effect(Effect::user_message(format!("switch to patient {patient_id}")))
                .with_effect(Effect::status(STATUS_SWITCHING_PATIENT))
                .with_effect(Effect::RequestSwitchPatient {
                    patient_id: patient_id.to_string(),
                }))
        }

        (
            OperationState::Busy {
                operation: operation @ Operation::SwitchPatient { patient_id },
            },
            Event::SwitchPatientSettled { result },
        ) => Ok(match result {
            Ok(confirmation) => TransitionResult::new(OperationState::Idle).with_effects([
                Effect::BindContext {
                    record_id: patient_id.clone(),
                },
                Effect::assistant_message(confirmation),
                Effect::status(STATUS_DONE),
                Effect::settled(operation.clone(), true),
            ]),
            Err(e) => TransitionResult::new(OperationState::Idle).with_effects([
                Effect::assistant_message(format!(
                    "Could not switch to patient {patient_id}: {}",
                    e.message
                )),
                Effect::status(error_status(&e)),
                Effect::settled(operation.clone(), false),
            ]),
        }),

        (OperationState::Idle, Event::ResetContext) => {
            Ok(TransitionResult::new(OperationState::busy(Operation::ResetContext))
                .with_effect(Effect::status(STATUS_RESETTING_CONTEXT))
                .with_effect(Effect::RequestResetContext))
        }

        (
            OperationState::Busy {
                operation: operation @ Operation::ResetContext,
            },
            Event::ResetContextSettled { result },
        ) => Ok(match result {
            Ok(confirmation) => TransitionResult::new(OperationState::Idle).with_effects([
                Effect::ClearContext,
                Effect::assistant_message(confirmation),
                Effect::status(STATUS_DONE),
                Effect::settled(operation.clone(), true),
            ]),
            Err(e) => TransitionResult::new(OperationState::Idle).with_effects([
                Effect::assistant_message(format!(
                    "Could not reset patient context: {}",
                    e.message
                )),
                Effect::status(error_status(&e)),
                Effect::settled(operation.clone(), false),
            ]),
        }),

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn settle_chat(operation: &Operation, result: Result<String, BackendError>) -> TransitionResult {
    let idle = TransitionResult::new(OperationState::Idle);
    match result {
        Ok(reply) => idle.with_effects([
            Effect::ResolvePlaceholder {
                content: reply.clone(),
            },
            Effect::RememberReply { text: reply },
            Effect::status(STATUS_DONE),
            Effect::settled(operation.clone(), true),
        ]),
        Err(e) if e.is_transport() => idle.with_effects([
            Effect::ResolvePlaceholder {
                content: CHAT_FAILURE_TEXT.to_string(),
            },
            Effect::status(STATUS_NETWORK_ERROR),
            Effect::settled(operation.clone(), false),
        ]),
        Err(e) => idle.with_effects([
            Effect::ResolvePlaceholder {
                content: format!("Error: {}", e.message),
            },
            Effect::status(error_status(&e)),
            Effect::settled(operation.clone(), false),
        ]),
    }
}

fn settle_upload(
    operation: &Operation,
    file_name: &str,
    result: Result<UploadResult, BackendError>,
) -> TransitionResult {
    let idle = TransitionResult::new(OperationState::Idle);
    match result {
        Ok(upload) => {
            let idle = idle
                .with_effect(Effect::assistant_message(upload.summary_text))
                .with_effect(Effect::assistant_message(upload.analysis_text));
            let idle = match upload.bound_record_id {
                Some(record_id) => idle
                    .with_effect(Effect::assistant_message(format!(
                        "Patient context set to {record_id}. You can now ask about this patient."
                    )))
                    .with_effect(Effect::BindContext { record_id }),
                None => idle.with_effect(Effect::ClearContext),
            };
            idle.with_effect(Effect::status(STATUS_DOCUMENT_PROCESSED))
                .with_effect(Effect::settled(operation.clone(), true))
        }
        Err(e) => {
            let message = if e.is_transport() {
                format!("Network error while processing document \"{file_name}\": {}", e.message)
            } else {
                format!("Error processing document \"{file_name}\": {}", e.message)
            };
            idle.with_effects([
                Effect::assistant_message(message),
                Effect::ClearContext,
                Effect::status(error_status(&e)),
                Effect::settled(operation.clone(), false),
            ])
        }
    }
}

fn settle_export(
    operation: &Operation,
    result: Result<crate::download::SavedDownload, ExportFailure>,
) -> TransitionResult {
    let idle = TransitionResult::new(OperationState::Idle);
    match result {
        Ok(saved) => idle.with_effects([
            Effect::assistant_message(format!("Reply exported as {}.", saved.file_name)),
            Effect::status(STATUS_EXPORTED),
            Effect::settled(operation.clone(), true),
        ]),
        Err(failure) => {
            let status = match &failure {
                ExportFailure::Backend(e) => error_status(e),
                ExportFailure::Download(e) => format!("error: {e}"),
            };
            idle.with_effects([
                Effect::assistant_message(format!("Error exporting reply: {failure}")),
                Effect::status(status),
                Effect::settled(operation.clone(), false),
            ])
        }
    }
}

fn error_status(e: &BackendError) -> String {
    if e.is_transport() {
        STATUS_NETWORK_ERROR.to_string()
    } else {
        format!("error: {}", e.message)
    }
}
