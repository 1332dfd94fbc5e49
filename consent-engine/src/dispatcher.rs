//! Terminal outcome handlers for one negotiation.
//!
//! An [`OutcomeDispatcher`] is built once, moved into a session with the
//! request, and consumed when the session dispatches. Handlers are `FnOnce`,
//! so none of them can run twice, and all of them are dropped together with
//! the dispatcher the moment the verdict has been delivered.

use std::fmt;

use crate::capability::{CapabilityOutcome, NegotiationResult};

/// Callback invoked with the final result of a negotiation.
pub type OutcomeHandler = Box<dyn FnOnce(&NegotiationResult)>;

/// Which handler actually received the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerSlot {
    Granted,
    Denied,
    PermanentlyDenied,
    /// Verdict was `PermanentlyDenied` but no dedicated handler was
    /// registered, so the denied handler ran instead.
    DeniedFallback,
}

/// Holds at most one handler per terminal outcome kind.
///
/// `on_granted` and `on_denied` are required; `on_permanently_denied` is
/// optional and falls back to `on_denied`.
#[derive(Default)]
pub struct OutcomeDispatcher {
    on_granted: Option<OutcomeHandler>,
    on_denied: Option<OutcomeHandler>,
    on_permanently_denied: Option<OutcomeHandler>,
}

impl OutcomeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_granted(mut self, handler: impl FnOnce(&NegotiationResult) + 'static) -> Self {
        self.on_granted = Some(Box::new(handler));
        self
    }

    pub fn on_denied(mut self, handler: impl FnOnce(&NegotiationResult) + 'static) -> Self {
        self.on_denied = Some(Box::new(handler));
        self
    }

    pub fn on_permanently_denied(
        mut self,
        handler: impl FnOnce(&NegotiationResult) + 'static,
    ) -> Self {
        self.on_permanently_denied = Some(Box::new(handler));
        self
    }

    /// True when both required handlers are registered.
    pub fn is_complete(&self) -> bool {
        self.on_granted.is_some() && self.on_denied.is_some()
    }

    /// Names of the required handlers that are still missing.
    pub fn missing_handlers(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.on_granted.is_none() {
            missing.push("on_granted");
        }
        if self.on_denied.is_none() {
            missing.push("on_denied");
        }
        missing
    }

    pub fn has_permanent_denial_handler(&self) -> bool {
        self.on_permanently_denied.is_some()
    }

    /// Deliver `result` to the matching handler, consuming the dispatcher.
    ///
    /// Returns `None` only if the matching handler is absent, which a
    /// session never allows because it validates with [`is_complete`]
    /// before any host interaction.
    ///
    /// [`is_complete`]: Self::is_complete
    pub(crate) fn dispatch(self, result: &NegotiationResult) -> Option<HandlerSlot> {
        let Self {
            on_granted,
            on_denied,
            on_permanently_denied,
        } = self;

        let (handler, slot) = match result.verdict() {
            CapabilityOutcome::Granted => (on_granted, HandlerSlot::Granted),
            CapabilityOutcome::Denied => (on_denied, HandlerSlot::Denied),
            CapabilityOutcome::PermanentlyDenied => match on_permanently_denied {
                Some(handler) => (Some(handler), HandlerSlot::PermanentlyDenied),
                None => (on_denied, HandlerSlot::DeniedFallback),
            },
        };

        let handler = handler?;
        handler(result);
        Some(slot)
    }
}

impl fmt::Debug for OutcomeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeDispatcher")
            .field("on_granted", &self.on_granted.is_some())
            .field("on_denied", &self.on_denied.is_some())
            .field(
                "on_permanently_denied",
                &self.on_permanently_denied.is_some(),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
