//! desk-session: Conversation lifecycle for the support chat tester
//!
//! This crate tracks one operator's session against a selected support agent:
//! the local transcript, whether a backend conversation is open, and the
//! guard that keeps an open conversation from being left by accident.

pub mod error;
pub mod events;
pub mod exit;
pub mod session;
pub mod status;
pub mod turn;

pub use error::{Error, Result};
pub use events::SessionEvent;
pub use exit::{ExitChoice, ExitDecision};
pub use session::{
    ConversationSession, PendingResolve, PendingTurn, ResolveOutcome, SessionSnapshot,
    SwitchOutcome, TurnOutcome,
};
pub use status::{CloseReason, SessionStatus};
pub use turn::{Role, Transcript, Turn, TurnMetadata};
