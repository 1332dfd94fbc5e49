//! Contracts the engine consumes from the host runtime.
//!
//! All methods are called from the session's single control thread and
//! must not call back into the session.

use crate::capability::Capability;
use crate::token::RequestToken;

/// Reports the host's current view of a capability.
pub trait CapabilityStatusSource {
    fn is_granted(&self, capability: &Capability) -> bool;

    /// Whether a justification could still meaningfully be shown.
    ///
    /// Hosts answer `false` both before the capability was ever requested
    /// and after the user refused it permanently. The session only asks
    /// after a request cycle completed, where `false` reads as permanent.
    fn can_show_rationale(&self, capability: &Capability) -> bool;

    /// Externally persisted knowledge that `capability` was already refused
    /// permanently. Used before a request, to skip the justification prompt.
    fn is_known_permanently_denied(&self, _capability: &Capability) -> bool {
        false
    }
}

/// Issues the host's asynchronous authorization request.
pub trait RequestGateway {
    /// Fire-and-forget. The host delivers the result later through
    /// [`NegotiationSession::handle_result`] with the same `token`.
    ///
    /// [`NegotiationSession::handle_result`]: crate::NegotiationSession::handle_result
    fn request_async(&mut self, token: RequestToken, capabilities: &[Capability]);
}

/// Opens the host's own settings screen, where permanently denied
/// capabilities can still be granted.
pub trait SettingsLauncher {
    fn open_settings(&mut self);
}

/// Whether this runtime requires explicit authorization at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformGate {
    supports_authorization: bool,
}

impl PlatformGate {
    /// Runtime with explicit authorization.
    pub const REQUIRED: PlatformGate = PlatformGate {
        supports_authorization: true,
    };
    /// Runtime that grants everything implicitly.
    pub const IMPLICIT: PlatformGate = PlatformGate {
        supports_authorization: false,
    };

    pub fn new(supports_authorization: bool) -> Self {
        Self {
            supports_authorization,
        }
    }

    pub fn supports_authorization(self) -> bool {
        self.supports_authorization
    }
}

impl Default for PlatformGate {
    fn default() -> Self {
        Self::REQUIRED
    }
}

impl From<bool> for PlatformGate {
    fn from(supports_authorization: bool) -> Self {
        Self::new(supports_authorization)
    }
}
