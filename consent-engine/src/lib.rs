//! consent-engine: single-shot capability negotiation.
//!
//! A caller declares the capabilities it needs, registers one handler per
//! terminal outcome, and hands both to a [`NegotiationSession`]. The session
//! asks the host which capabilities are missing, optionally shows a
//! justification prompt, issues the host's asynchronous request, classifies
//! the relayed result as granted, denied or permanently denied, and fires
//! exactly one handler before releasing all of them.
//!
//! # Architecture
//!
//! - [`capability`] - Capability identifiers, queries, outcomes and the verdict reduction
//! - [`dispatcher`] - [`OutcomeDispatcher`], the single-shot handler holder
//! - [`engine`] - [`NegotiationSession`], the state machine driving one negotiation
//! - [`host`] - Contracts consumed from the host (status, gateway, settings, platform gate)
//! - [`prompt`] - Pre-request prompt contract and its single-use ticket
//! - [`token`] - Correlation tokens
//! - [`error`] - Typed errors raised by `run`
//!
//! # Example
//!
//! ```ignore
//! use consent_engine::{
//!     CapabilityQuery, NegotiationRequest, NegotiationSession, OutcomeDispatcher,
//! };
//!
//! let mut session = NegotiationSession::new(status_source, gateway);
//! let dispatcher = OutcomeDispatcher::new()
//!     .on_granted(|_| start_tracking())
//!     .on_denied(|result| show_denied(result.reported()))
//!     .on_permanently_denied(|_| offer_settings());
//! session.run(NegotiationRequest::new(
//!     CapabilityQuery::single("location.coarse"),
//!     dispatcher,
//! ))?;
//!
//! // Later, from the host's own result callback:
//! session.handle_result(token, &capabilities, &granted_flags);
//! ```

pub mod capability;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod host;
pub mod prompt;
pub mod token;

// Re-export the main public types at the crate root for convenience
pub use capability::{
    Capability, CapabilityOutcome, CapabilityQuery, CapabilityReport, NegotiationResult,
};
pub use dispatcher::{HandlerSlot, OutcomeDispatcher, OutcomeHandler};
pub use engine::{Disposition, NegotiationRequest, NegotiationSession, RunOutcome, SessionPhase};
pub use error::{ConfigurationError, NegotiationError, ReentrancyError};
pub use host::{CapabilityStatusSource, PlatformGate, RequestGateway, SettingsLauncher};
pub use prompt::{PreRequestPrompt, PromptDecision, PromptSpec, PromptTicket};
pub use token::RequestToken;
