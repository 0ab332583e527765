//! Session runtime executor

use super::settlement::{interrupted, SettlementGuard};
use super::{Dispatch, Request, SessionEvent};

use crate::backend::{Backend, ChatRequest, ExportRequest};
use crate::download::DownloadSink;
use crate::session::{LogChange, Sender, Session};
use crate::state_machine::event::ExportFailure;
use crate::state_machine::{transition, Effect, Event, OperationState, TransitionError, TransitionResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Owns the session and applies transitions to it, one request at a time
pub(super) struct SessionRuntime {
    session: Session,
    backend: Arc<dyn Backend>,
    downloads: Arc<dyn DownloadSink>,
    request_rx: mpsc::UnboundedReceiver<Request>,
    /// Weak so that dropping every handle stops the loop
    request_tx: mpsc::WeakUnboundedSender<Request>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
}

impl SessionRuntime {
    pub(super) fn new(
        session: Session,
        backend: Arc<dyn Backend>,
        downloads: Arc<dyn DownloadSink>,
        request_rx: mpsc::UnboundedReceiver<Request>,
        request_tx: mpsc::WeakUnboundedSender<Request>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session,
            backend,
            downloads,
            request_rx,
            request_tx,
            broadcast_tx,
        }
    }

    pub(super) async fn run(mut self) {
        tracing::info!(messages = self.session.log().len(), "Starting session runtime");

        while let Some(request) = self.request_rx.recv().await {
            match request {
                Request::Dispatch { event, reply } => {
                    let result = self.dispatch(event);
                    let _ = reply.send(result);
                }
                Request::Settle { event } => self.settle(event),
                Request::Snapshot { reply } => {
                    let _ = reply.send(self.session.snapshot());
                }
            }
        }

        tracing::info!("Session runtime stopped");
    }

    fn dispatch(&mut self, event: Event) -> Result<Dispatch, TransitionError> {
        let result = transition(&self.session, event).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected operation");
        })?;

        if result.is_noop() {
            tracing::debug!("Blank input, nothing to do");
            return Ok(Dispatch::Skipped);
        }

        let started = result.new_state.operation().cloned();
        self.apply(result);
        Ok(started.map_or(Dispatch::Skipped, |operation| Dispatch::Started { operation }))
    }

    fn settle(&mut self, event: Event) {
        match transition(&self.session, event) {
            Ok(result) => self.apply(result),
            // Settlements only come from our own guards, so this is a bug
            Err(e) => tracing::error!(error = %e, "Dropping settlement"),
        }
    }

    fn apply(&mut self, result: TransitionResult) {
        let previous = std::mem::replace(&mut self.session.operation, result.new_state);

        if let (OperationState::Idle, OperationState::Busy { operation }) =
            (&previous, &self.session.operation)
        {
            tracing::info!(operation = %operation, "Operation started");
            self.publish(SessionEvent::OperationStarted {
                operation: operation.clone(),
            });
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage { sender, content } => {
                let change = self.session.log.append(sender, content);
                self.publish_log_change(change);
            }

            Effect::ShowPlaceholder => {
                let change = self.session.log.show_placeholder();
                self.publish_log_change(change);
            }

            Effect::ResolvePlaceholder { content } => {
                let change = self.session.log.resolve_placeholder(Sender::Assistant, content);
                self.publish_log_change(change);
            }

            Effect::BindContext { record_id } => {
                if self.session.context.current() != Some(record_id.as_str()) {
                    self.session.context.bind(record_id.clone());
                    self.publish(SessionEvent::ContextChanged {
                        bound_record_id: Some(record_id),
                    });
                }
            }

            Effect::ClearContext => {
                if self.session.context.current().is_some() {
                    self.session.context.clear();
                    self.publish(SessionEvent::ContextChanged {
                        bound_record_id: None,
                    });
                }
            }

            Effect::SetStatus { status } => {
                self.session.status.set(status.clone());
                self.publish(SessionEvent::StatusChanged { status });
            }

            Effect::RememberReply { text } => {
                self.session.last_assistant_reply = Some(text);
            }

            Effect::RequestChat { message } => {
                let request = ChatRequest {
                    message,
                    chat_history: self.session.log.transcript(),
                    current_patient_id: self.session.context.current().map(str::to_string),
                };
                let backend = Arc::clone(&self.backend);
                self.spawn_request(
                    Event::ChatSettled {
                        result: Err(interrupted()),
                    },
                    async move {
                        Event::ChatSettled {
                            result: backend.chat(&request).await,
                        }
                    },
                );
            }

            Effect::RequestUpload { file } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_request(
                    Event::UploadSettled {
                        result: Err(interrupted()),
                    },
                    async move {
                        Event::UploadSettled {
                            result: backend.upload(&file).await,
                        }
                    },
                );
            }

            Effect::RequestExport { text } => {
                let backend = Arc::clone(&self.backend);
                let downloads = Arc::clone(&self.downloads);
                self.spawn_request(
                    Event::ExportSettled {
                        result: Err(interrupted().into()),
                    },
                    async move {
                        let request = ExportRequest { text_content: text };
                        let result = match backend.export(&request).await {
                            Ok(document) => downloads.save(&document).await.map_err(ExportFailure::from),
                            Err(e) => Err(e.into()),
                        };
                        Event::ExportSettled { result }
                    },
                );
            }

            Effect::RequestSwitchPatient { patient_id } => {
                let backend = Arc::clone(&self.backend);
                self.spawn_request(
                    Event::SwitchPatientSettled {
                        result: Err(interrupted()),
                    },
                    async move {
                        Event::SwitchPatientSettled {
                            result: backend.switch_patient(&patient_id).await,
                        }
                    },
                );
            }

            Effect::RequestResetContext => {
                let backend = Arc::clone(&self.backend);
                self.spawn_request(
                    Event::ResetContextSettled {
                        result: Err(interrupted()),
                    },
                    async move {
                        Event::ResetContextSettled {
                            result: backend.reset_context().await,
                        }
                    },
                );
            }

            Effect::NotifySettled { operation, success } => {
                if success {
                    tracing::info!(operation = %operation, "Operation settled");
                } else {
                    tracing::warn!(
                        operation = %operation,
                        status = ?self.session.status().current(),
                        "Operation failed"
                    );
                }
                self.publish(SessionEvent::OperationSettled { operation, success });
            }
        }
    }

    /// Run `call` in the background; its output (or `fallback`) comes back as a settlement
    fn spawn_request<F>(&mut self, fallback: Event, call: F)
    where
        F: Future<Output = Event> + Send + 'static,
    {
        let Some(tx) = self.request_tx.upgrade() else {
            // Nobody is left to hear the result; release busy right away
            tracing::warn!("Session has no handles left, settling request as interrupted");
            self.settle(fallback);
            return;
        };

        let guard = SettlementGuard::new(tx, fallback);
        tokio::spawn(async move {
            let event = call.await;
            guard.settle(event);
        });
    }

    fn publish_log_change(&self, change: LogChange) {
        let event = match change {
            LogChange::Inserted { index } => self.session.log.get(index).map(|message| {
                SessionEvent::MessageInserted {
                    index,
                    message: message.clone(),
                }
            }),
            LogChange::Replaced { index } => self.session.log.get(index).map(|message| {
                SessionEvent::MessageReplaced {
                    index,
                    message: message.clone(),
                }
            }),
            LogChange::Unchanged => None,
        };
        if let Some(event) = event {
            self.publish(event);
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }
}
