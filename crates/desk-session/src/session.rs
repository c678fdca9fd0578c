//! Conversation lifecycle for one chat tester session

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use desk_api::{AgentId, ConversationId, SupportBackend, TurnReply};

use crate::{
    error::{Error, Result},
    events::SessionEvent,
    exit::{ExitChoice, ExitDecision},
    status::{CloseReason, SessionStatus},
    turn::Turn,
};

/// A user turn recorded locally and waiting on the backend.
///
/// Tagged with the session generation it was issued under so a reply that
/// arrives after a reset can be recognised and dropped, and with the call it
/// belongs to so it can be completed at most once.
#[derive(Debug)]
pub struct PendingTurn {
    generation: u64,
    call: u64,
    agent_id: AgentId,
    conversation_id: Option<ConversationId>,
    text: String,
}

impl PendingTurn {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// `None` when this turn opens a new conversation
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A resolve request waiting on the backend
#[derive(Debug)]
pub struct PendingResolve {
    generation: u64,
    call: u64,
    conversation_id: ConversationId,
}

impl PendingResolve {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

/// What a completed turn did to the session
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The agent turn appended to the transcript
    pub reply: Turn,
    /// Status after the reply was applied
    pub status: SessionStatus,
}

impl TurnOutcome {
    pub fn escalated(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Closed {
                reason: CloseReason::Escalated
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    Resolved,
    /// Nothing was open; the backend was not called
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched,
    /// The operator refused to drop the open conversation
    Declined,
}

/// Point-in-time copy of the session, for rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub agent_id: Option<AgentId>,
    pub status: SessionStatus,
    pub turns: Vec<Turn>,
    pub generation: u64,
    pub busy: bool,
}

impl SessionSnapshot {
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.status.conversation_id()
    }
}

#[derive(Default)]
struct SessionState {
    agent_id: Option<AgentId>,
    status: SessionStatus,
    turns: Vec<Turn>,
    generation: u64,
    /// Last call number handed out
    calls: u64,
    /// Call number of the backend request currently running, if any
    in_flight: Option<u64>,
}

impl SessionState {
    fn check_current(&self, issued: u64) -> Result<()> {
        if self.generation == issued {
            Ok(())
        } else {
            Err(Error::StaleResponse {
                issued,
                current: self.generation,
            })
        }
    }

    /// Mark a new backend call as running and return its number
    fn start_call(&mut self) -> u64 {
        self.calls += 1;
        self.in_flight = Some(self.calls);
        self.calls
    }

    /// Accept a completion only for the current generation and only for the
    /// call that is still running
    fn check_in_flight(&self, issued: u64, call: u64) -> Result<()> {
        self.check_current(issued)?;
        if self.in_flight == Some(call) {
            Ok(())
        } else {
            Err(Error::NotInFlight { call })
        }
    }

    /// Start a new generation: empty transcript, idle, nothing in flight
    fn reset(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.turns.clear();
        self.status = SessionStatus::Idle;
    }
}

/// One chat tester session against a single selected agent.
///
/// Cloning is cheap and every clone drives the same session. Methods take
/// `&self` and never hold the internal lock across an `.await`, so a front end
/// may switch agents while a turn is still waiting on the backend.
#[derive(Clone)]
pub struct ConversationSession {
    state: Arc<Mutex<SessionState>>,
    backend: Arc<dyn SupportBackend>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl ConversationSession {
    /// Create a session with no agent selected
    pub fn new(backend: Arc<dyn SupportBackend>) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(Mutex::new(SessionState::default())),
            backend,
            event_tx,
        }
    }

    /// Create a session with `agent_id` already selected
    pub fn with_agent(backend: Arc<dyn SupportBackend>, agent_id: impl Into<AgentId>) -> Self {
        let session = Self::new(backend);
        session.state.lock().agent_id = Some(agent_id.into());
        session
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn backend(&self) -> Arc<dyn SupportBackend> {
        Arc::clone(&self.backend)
    }

    pub fn agent_id(&self) -> Option<AgentId> {
        self.state.lock().agent_id.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status.clone()
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.state.lock().status.conversation_id().cloned()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.state.lock().turns.clone()
    }

    pub fn turn_count(&self) -> usize {
        self.state.lock().turns.len()
    }

    /// Whether a turn or resolve is waiting on the backend
    pub fn is_busy(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            agent_id: state.agent_id.clone(),
            status: state.status.clone(),
            turns: state.turns.clone(),
            generation: state.generation,
            busy: state.in_flight.is_some(),
        }
    }

    fn emit(&self, events: impl IntoIterator<Item = SessionEvent>) {
        for event in events {
            let _ = self.event_tx.send(event);
        }
    }

    fn discard(&self, error: &Error) {
        match *error {
            Error::StaleResponse { issued, current } => {
                tracing::debug!(issued, current, "discarding reply for a reset session");
                self.emit([SessionEvent::ResponseDiscarded { issued, current }]);
            }
            Error::NotInFlight { call } => {
                tracing::debug!(call, "discarding reply for a call that already completed");
            }
            _ => {}
        }
    }

    // ---- Turns ----

    /// Send one operator message and apply the agent's reply.
    ///
    /// The user turn is appended before the request goes out and stays in the
    /// transcript whatever happens next. A failed request appends an inline
    /// error turn and leaves the status alone; nothing is retried.
    pub async fn submit_turn(&self, text: &str) -> Result<TurnOutcome> {
        let pending = self.begin_turn(text)?;
        let result = self
            .backend
            .send_turn(
                &pending.agent_id,
                &pending.text,
                pending.conversation_id.as_ref(),
            )
            .await;
        self.complete_turn(pending, result)
    }

    /// First half of [`submit_turn`](Self::submit_turn): validate, record the
    /// user turn and mark the session busy.
    pub fn begin_turn(&self, text: &str) -> Result<PendingTurn> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut state = self.state.lock();
        let agent_id = state.agent_id.clone().ok_or(Error::NoAgentSelected)?;
        if let SessionStatus::Closed { reason } = state.status {
            return Err(Error::Closed(reason));
        }
        if state.in_flight.is_some() {
            return Err(Error::Busy);
        }

        let turn = Turn::user(text);
        state.turns.push(turn.clone());
        let call = state.start_call();
        let pending = PendingTurn {
            generation: state.generation,
            call,
            agent_id,
            conversation_id: state.status.conversation_id().cloned(),
            text: text.to_string(),
        };
        drop(state);

        tracing::debug!(
            agent = %pending.agent_id,
            conversation = ?pending.conversation_id,
            generation = pending.generation,
            "sending turn"
        );
        self.emit([
            SessionEvent::TurnAppended { turn },
            SessionEvent::BusyChanged { busy: true },
        ]);
        Ok(pending)
    }

    /// Second half of [`submit_turn`](Self::submit_turn): apply the backend's
    /// answer, unless the session was reset while it was in flight.
    pub fn complete_turn(
        &self,
        pending: PendingTurn,
        result: desk_api::Result<TurnReply>,
    ) -> Result<TurnOutcome> {
        let mut state = self.state.lock();
        if let Err(e) = state.check_in_flight(pending.generation, pending.call) {
            drop(state);
            self.discard(&e);
            return Err(e);
        }
        state.in_flight = None;
        let mut events = vec![SessionEvent::BusyChanged { busy: false }];

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let turn = Turn::unreachable();
                state.turns.push(turn.clone());
                drop(state);
                tracing::warn!(agent = %pending.agent_id, "chat turn failed: {}", e);
                events.push(SessionEvent::TurnAppended { turn });
                events.push(SessionEvent::Error {
                    message: e.to_string(),
                });
                self.emit(events);
                return Err(Error::Backend(e));
            }
        };

        let turn = Turn::agent(&reply);
        state.turns.push(turn.clone());
        events.push(SessionEvent::TurnAppended { turn: turn.clone() });

        let previous = state.status.clone();
        let next = if reply.escalated {
            SessionStatus::Closed {
                reason: CloseReason::Escalated,
            }
        } else if let Some(conversation_id) = reply.conversation_id {
            SessionStatus::Open { conversation_id }
        } else {
            previous.clone()
        };
        if next != previous {
            state.status = next.clone();
            events.push(SessionEvent::StatusChanged {
                from: previous.clone(),
                to: next.clone(),
            });
        }
        drop(state);

        match (&previous, &next) {
            (_, SessionStatus::Closed { .. }) => {
                tracing::info!(
                    conversation = ?previous.conversation_id(),
                    intent = %reply.intent,
                    "conversation escalated"
                );
            }
            (SessionStatus::Open { conversation_id: old }, SessionStatus::Open { conversation_id: new })
                if old != new =>
            {
                tracing::info!(%old, %new, "backend reassigned conversation");
            }
            (SessionStatus::Idle, SessionStatus::Open { conversation_id }) => {
                tracing::info!(%conversation_id, "conversation opened");
            }
            _ => {}
        }

        self.emit(events);
        Ok(TurnOutcome {
            reply: turn,
            status: next,
        })
    }

    // ---- Resolution ----

    /// Mark the open conversation resolved on the backend and close it.
    ///
    /// Does nothing (and calls nothing) unless the session is open. A failed
    /// resolve leaves the session open so the operator can try again.
    pub async fn resolve(&self) -> Result<ResolveOutcome> {
        let Some(pending) = self.begin_resolve()? else {
            tracing::debug!("resolve ignored: no open conversation");
            return Ok(ResolveOutcome::NotOpen);
        };
        let result = self
            .backend
            .resolve_conversation(&pending.conversation_id)
            .await;
        self.complete_resolve(pending, result)
    }

    /// First half of [`resolve`](Self::resolve). `None` when nothing is open.
    pub fn begin_resolve(&self) -> Result<Option<PendingResolve>> {
        let mut state = self.state.lock();
        let Some(conversation_id) = state.status.conversation_id().cloned() else {
            return Ok(None);
        };
        if state.in_flight.is_some() {
            return Err(Error::Busy);
        }
        let call = state.start_call();
        let pending = PendingResolve {
            generation: state.generation,
            call,
            conversation_id,
        };
        drop(state);

        tracing::debug!(conversation = %pending.conversation_id, "resolving conversation");
        self.emit([SessionEvent::BusyChanged { busy: true }]);
        Ok(Some(pending))
    }

    /// Second half of [`resolve`](Self::resolve)
    pub fn complete_resolve(
        &self,
        pending: PendingResolve,
        result: desk_api::Result<()>,
    ) -> Result<ResolveOutcome> {
        let mut state = self.state.lock();
        if let Err(e) = state.check_in_flight(pending.generation, pending.call) {
            drop(state);
            self.discard(&e);
            return Err(e);
        }
        state.in_flight = None;
        let mut events = vec![SessionEvent::BusyChanged { busy: false }];

        if let Err(e) = result {
            drop(state);
            tracing::warn!(conversation = %pending.conversation_id, "resolve failed: {}", e);
            events.push(SessionEvent::Error {
                message: e.to_string(),
            });
            self.emit(events);
            return Err(Error::Backend(e));
        }

        let previous = std::mem::replace(
            &mut state.status,
            SessionStatus::Closed {
                reason: CloseReason::Resolved,
            },
        );
        let note = Turn::resolved_note();
        state.turns.push(note.clone());
        drop(state);

        tracing::info!(conversation = %pending.conversation_id, "conversation resolved");
        events.push(SessionEvent::StatusChanged {
            from: previous,
            to: SessionStatus::Closed {
                reason: CloseReason::Resolved,
            },
        });
        events.push(SessionEvent::TurnAppended { turn: note });
        self.emit(events);
        Ok(ResolveOutcome::Resolved)
    }

    // ---- Resets ----

    /// Select another agent, dropping the current transcript.
    ///
    /// When a conversation is open, `confirm` is asked first and a `false`
    /// leaves the session exactly as it was. A confirmed switch abandons the
    /// open conversation without resolving it on the backend. Replies still in
    /// flight for the old generation are discarded when they arrive.
    pub fn switch_agent<F>(&self, agent_id: impl Into<AgentId>, mut confirm: F) -> SwitchOutcome
    where
        F: FnMut(&ConversationId) -> bool,
    {
        let agent_id = agent_id.into();
        let mut confirmed: Option<ConversationId> = None;

        let mut state = loop {
            let state = self.state.lock();
            let Some(open) = state.status.conversation_id().cloned() else {
                break state;
            };
            if confirmed.as_ref() == Some(&open) {
                break state;
            }
            // Ask without holding the lock; re-check afterwards in case a reply
            // opened or reassigned the conversation meanwhile.
            drop(state);
            if !confirm(&open) {
                tracing::info!(conversation = %open, "agent switch declined");
                return SwitchOutcome::Declined;
            }
            confirmed = Some(open);
        };

        let abandoned = state.status.conversation_id().cloned();
        let was_busy = state.in_flight.is_some();
        let previous = state.status.clone();
        state.reset();
        state.agent_id = Some(agent_id.clone());
        let generation = state.generation;
        drop(state);

        if let Some(ref conversation) = abandoned {
            tracing::warn!(%conversation, "abandoning open conversation without resolving it");
        }
        tracing::info!(agent = %agent_id, generation, "switched agent");

        let mut events = vec![SessionEvent::AgentSwitched {
            agent_id,
            abandoned,
        }];
        if previous != SessionStatus::Idle {
            events.push(SessionEvent::StatusChanged {
                from: previous,
                to: SessionStatus::Idle,
            });
        }
        if was_busy {
            events.push(SessionEvent::BusyChanged { busy: false });
        }
        self.emit(events);
        SwitchOutcome::Switched
    }

    /// Clear a closed conversation so the operator can ask something new
    pub fn start_new_query(&self) -> Result<()> {
        let mut state = self.state.lock();
        let SessionStatus::Closed { .. } = state.status else {
            return Err(Error::InvalidState {
                operation: "start a new query",
                status: state.status.label(),
            });
        };
        let previous = state.status.clone();
        state.reset();
        let generation = state.generation;
        drop(state);

        tracing::debug!(generation, "new query");
        self.emit([
            SessionEvent::Restarted { generation },
            SessionEvent::StatusChanged {
                from: previous,
                to: SessionStatus::Idle,
            },
        ]);
        Ok(())
    }

    // ---- Exit guard ----

    /// Ask whether the application may navigate away or unload.
    ///
    /// Blocked exactly when a conversation is open.
    pub fn intercept_exit(&self) -> ExitDecision {
        if self.state.lock().status.is_open() {
            ExitDecision::Blocked
        } else {
            ExitDecision::Allowed
        }
    }

    /// Apply the operator's answer to a blocked exit.
    ///
    /// `ResolveAndLeave` always allows the exit, even when resolving fails;
    /// the backend stays the source of truth for the conversation's status.
    pub async fn settle_exit(&self, choice: ExitChoice) -> ExitDecision {
        match choice {
            ExitChoice::Stay => ExitDecision::Blocked,
            ExitChoice::ResolveAndLeave => {
                if let Err(e) = self.resolve().await {
                    tracing::warn!("could not resolve before leaving, leaving anyway: {}", e);
                }
                ExitDecision::Allowed
            }
        }
    }
}
