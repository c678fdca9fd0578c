//! Exit guard outcomes

/// Whether the surrounding application may leave the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDecision {
    Allowed,
    /// A conversation is open; the operator has to choose an [`ExitChoice`]
    Blocked,
}

impl ExitDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ExitDecision::Blocked)
    }
}

/// The two ways out of a blocked exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitChoice {
    /// Cancel the exit and keep the conversation open
    Stay,
    /// Resolve the conversation, then leave even if resolving fails
    ResolveAndLeave,
}
