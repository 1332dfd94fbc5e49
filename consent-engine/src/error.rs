//! Typed errors returned by [`NegotiationSession::run`].
//!
//! Stale or foreign results are not errors; they come back as
//! [`Disposition::Stale`] from the relay methods.
//!
//! [`NegotiationSession::run`]: crate::NegotiationSession::run
//! [`Disposition::Stale`]: crate::Disposition::Stale

use thiserror::Error;

use crate::token::RequestToken;

/// Top-level error for starting a negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Reentrancy(#[from] ReentrancyError),
}

/// The request cannot run as configured. Raised before any host interaction;
/// the session is left untouched and can be reused with a fixed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// `on_granted` and/or `on_denied` were never registered.
    #[error("required outcome handlers are not registered: {}", .0.join(", "))]
    MissingHandlers(Vec<&'static str>),

    /// The request carries a prompt spec but the session has no prompt
    /// collaborator to show it.
    #[error("a pre-request prompt was requested but no prompt is attached to the session")]
    PromptUnavailable,
}

/// `run` was called on a session that cannot start another negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReentrancyError {
    #[error("negotiation {0} is still outstanding on this session")]
    Outstanding(RequestToken),

    #[error("session is closed; start a new session to negotiate again")]
    Closed,
}
