//! Pre-request justification prompt contract.
//!
//! The engine never renders a prompt. It hands a [`PromptSpec`] and a
//! single-use [`PromptTicket`] to the host's [`PreRequestPrompt`]; the host
//! later turns the ticket into a [`PromptDecision`] and relays it back with
//! [`NegotiationSession::handle_prompt_decision`].
//!
//! [`NegotiationSession::handle_prompt_decision`]: crate::NegotiationSession::handle_prompt_decision

use serde::{Deserialize, Serialize};

use crate::capability::Capability;
use crate::token::RequestToken;

/// Content of the justification prompt shown before the real request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSpec {
    pub title: String,
    pub message: String,
    /// Label of the button that continues to the host's request.
    pub accept_label: String,
    /// Label of the button that abandons the request, if the prompt offers one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_label: Option<String>,
}

impl PromptSpec {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        accept_label: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            accept_label: accept_label.into(),
            decline_label: None,
        }
    }

    pub fn with_decline_label(mut self, label: impl Into<String>) -> Self {
        self.decline_label = Some(label.into());
        self
    }
}

/// Host-side prompt collaborator.
///
/// `show` is called at most once per session. The implementation must
/// eventually resolve the ticket with [`PromptTicket::accept`] or
/// [`PromptTicket::decline`] and relay the decision to the session, or the
/// host must cancel the session.
pub trait PreRequestPrompt {
    fn show(&mut self, spec: &PromptSpec, capabilities: &[Capability], ticket: PromptTicket);
}

/// Single-use handle for answering one prompt.
///
/// Both resolving methods consume the ticket, so one ticket yields exactly
/// one decision.
#[derive(Debug)]
#[must_use = "a prompt ticket must be resolved with accept() or decline()"]
pub struct PromptTicket {
    token: RequestToken,
}

impl PromptTicket {
    pub(crate) fn new(token: RequestToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn accept(self) -> PromptDecision {
        PromptDecision {
            token: self.token,
            accepted: true,
        }
    }

    pub fn decline(self) -> PromptDecision {
        PromptDecision {
            token: self.token,
            accepted: false,
        }
    }
}

/// The user's answer to a prompt, addressed to the session that showed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptDecision {
    token: RequestToken,
    accepted: bool,
}

impl PromptDecision {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }
}
