//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::transition::*;
use super::*;
use crate::backend::{BackendError, DocumentFile, UploadResult};
use crate::download::SavedDownload;
use crate::session::{Sender, Session};
use proptest::prelude::*;
use std::path::PathBuf;

// ============================================================================
// Test Helpers
// ============================================================================

/// Apply the state-only effects of a transition, the way the runtime would
fn apply(session: &mut Session, result: TransitionResult) {
    session.operation = result.new_state;
    for effect in result.effects {
        match effect {
            Effect::AppendMessage { sender, content } => {
                session.log.append(sender, content);
            }
            Effect::ShowPlaceholder => {
                session.log.show_placeholder();
            }
            Effect::ResolvePlaceholder { content } => {
                session.log.resolve_placeholder(Sender::Assistant, content);
            }
            Effect::BindContext { record_id } => session.context.bind(record_id),
            Effect::ClearContext => session.context.clear(),
            Effect::SetStatus { status } => session.status.set(status),
            Effect::RememberReply { text } => session.last_assistant_reply = Some(text),
            _ => {}
        }
    }
}

/// Settlement for whatever operation is in flight
fn settlement_for(operation: &Operation, outcome: &Outcome) -> Event {
    let error = match outcome {
        Outcome::Success => None,
        Outcome::Rejected(msg) => Some(BackendError::rejected(500, msg.clone())),
        Outcome::Transport => Some(BackendError::transport("connection refused")),
    };

    match operation {
        Operation::Chat => Event::ChatSettled {
            result: error.map_or_else(|| Ok("reply".to_string()), Err),
        },
        Operation::Upload { .. } => Event::UploadSettled {
            result: error.map_or_else(
                || {
                    Ok(UploadResult {
                        summary_text: "summary".to_string(),
                        analysis_text: "analysis".to_string(),
                        bound_record_id: Some("42".to_string()),
                    })
                },
                Err,
            ),
        },
        Operation::Export => Event::ExportSettled {
            result: match error {
                None => Ok(SavedDownload {
                    file_name: "report.pdf".to_string(),
                    location: PathBuf::from("/tmp/report.pdf"),
                }),
                Some(e) => Err(e.into()),
            },
        },
        Operation::SwitchPatient { .. } => Event::SwitchPatientSettled {
            result: error.map_or_else(|| Ok("switched".to_string()), Err),
        },
        Operation::ResetContext => Event::ResetContextSettled {
            result: error.map_or_else(|| Ok("reset".to_string()), Err),
        },
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Outcome {
    Success,
    Rejected(String),
    Transport,
}

#[derive(Debug, Clone)]
enum Action {
    Start(Event),
    Settle(Outcome),
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Success),
        "[a-zA-Z ]{1,30}".prop_map(Outcome::Rejected),
        Just(Outcome::Transport),
    ]
}

fn arb_start_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ?]{0,40}".prop_map(|text| Event::SendMessage { text }),
        ("[a-z]{1,10}\\.(pdf|txt|png)", proptest::collection::vec(any::<u8>(), 0..16))
            .prop_map(|(name, bytes)| Event::UploadDocument {
                file: DocumentFile::new(name, bytes),
            }),
        Just(Event::ExportLastReply),
        "[0-9 ]{0,4}".prop_map(|patient_id| Event::SwitchPatient { patient_id }),
        Just(Event::ResetContext),
    ]
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Chat),
        "[a-z]{1,10}\\.pdf".prop_map(|file_name| Operation::Upload { file_name }),
        Just(Operation::Export),
        "[0-9]{1,4}".prop_map(|patient_id| Operation::SwitchPatient { patient_id }),
        Just(Operation::ResetContext),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        arb_start_event().prop_map(Action::Start),
        arb_outcome().prop_map(Action::Settle),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Nothing starts while an operation is in flight
    #[test]
    fn prop_busy_rejects_every_start(operation in arb_operation(), event in arb_start_event()) {
        let mut session = Session::new();
        session.operation = OperationState::busy(operation.clone());

        let result = transition(&session, event);
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy { operation });
    }

    /// Every settlement releases busy and reports exactly once, last
    #[test]
    fn prop_settlement_always_releases_busy(operation in arb_operation(), outcome in arb_outcome()) {
        let mut session = Session::new();
        session.operation = OperationState::busy(operation.clone());

        let success = matches!(outcome, Outcome::Success);
        let result = transition(&session, settlement_for(&operation, &outcome)).unwrap();

        prop_assert_eq!(&result.new_state, &OperationState::Idle);
        let notifications = result
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::NotifySettled { .. }))
            .count();
        prop_assert_eq!(notifications, 1);
        prop_assert_eq!(result.effects.last(), Some(&Effect::settled(operation, success)));
        prop_assert!(!result.effects.iter().any(Effect::is_request));
    }

    /// Starting from idle either skips or issues exactly one request
    #[test]
    fn prop_start_issues_at_most_one_request(event in arb_start_event()) {
        let result = transition(&Session::new(), event).unwrap();

        let requests = result.effects.iter().filter(|e| e.is_request()).count();
        if result.is_noop() {
            prop_assert_eq!(&result.new_state, &OperationState::Idle);
        } else {
            prop_assert_eq!(requests, 1);
            prop_assert!(result.new_state.is_busy());
        }
    }

    /// A chat adds exactly one assistant entry, by resolving its placeholder
    #[test]
    fn prop_chat_yields_one_assistant_entry(text in "[a-z]{1,20}", outcome in arb_outcome()) {
        let mut session = Session::new();
        let started = transition(&session, Event::SendMessage { text }).unwrap();
        apply(&mut session, started);
        prop_assert!(session.log.has_placeholder());

        let settled = transition(&session, settlement_for(&Operation::Chat, &outcome)).unwrap();
        apply(&mut session, settled);

        let snapshot = session.snapshot();
        prop_assert_eq!(snapshot.from_sender(Sender::Assistant).count(), 1);
        prop_assert_eq!(snapshot.from_sender(Sender::User).count(), 1);
        prop_assert!(!session.log.has_placeholder());
    }

    /// Arbitrary interleavings keep the log ordered and the placeholder
    /// tied to an in-flight chat
    #[test]
    fn prop_interleavings_keep_invariants(actions in proptest::collection::vec(arb_action(), 1..40)) {
        let mut session = Session::new();

        for action in actions {
            match action {
                Action::Start(event) => {
                    let was_busy = session.is_busy();
                    match transition(&session, event) {
                        Ok(result) => {
                            prop_assert!(!was_busy);
                            apply(&mut session, result);
                        }
                        Err(TransitionError::Busy { .. }) => prop_assert!(was_busy),
                        Err(e) => prop_assert!(false, "unexpected error: {e}"),
                    }
                }
                Action::Settle(outcome) => {
                    let Some(operation) = session.operation().operation().cloned() else {
                        continue;
                    };
                    let result = transition(&session, settlement_for(&operation, &outcome)).unwrap();
                    apply(&mut session, result);
                    prop_assert!(!session.is_busy());
                }
            }

            let messages = session.log.all();
            prop_assert!(messages.windows(2).all(|w| w[0].created_at < w[1].created_at));
            let placeholders = messages.iter().filter(|m| m.sender == Sender::Placeholder).count();
            prop_assert!(placeholders <= 1);
            let chatting = session.operation() == &OperationState::busy(Operation::Chat);
            prop_assert_eq!(session.log.has_placeholder(), chatting);
        }
    }

    /// The bound record only changes through settlements
    #[test]
    fn prop_context_unchanged_by_starts(event in arb_start_event(), bound in proptest::option::of("[0-9]{1,4}")) {
        let mut session = Session::new();
        if let Some(id) = &bound {
            session.context.bind(id.clone());
        }

        let result = transition(&session, event).unwrap();
        let touched = result
            .effects
            .iter()
            .any(|e| matches!(e, Effect::BindContext { .. } | Effect::ClearContext));
        prop_assert!(!touched, "start event changed the bound record");
    }
}
