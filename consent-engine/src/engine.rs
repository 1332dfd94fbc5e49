//! The negotiation session: one query, one dispatcher, one terminal outcome.
//!
//! A [`NegotiationSession`] moves through
//! `Idle -> (Prompting ->) Awaiting -> Closed`, or straight from `Idle` to
//! `Closed` when nothing needs to be requested. The pending negotiation
//! (query, missing capabilities, dispatcher) lives inside the state enum, so
//! leaving the `Prompting`/`Awaiting` states moves it out and drops it. Once
//! closed, the session holds no caller callbacks and every relay call is a
//! no-op.

use std::fmt;
use std::mem;

use crate::capability::{
    Capability, CapabilityOutcome, CapabilityQuery, CapabilityReport, NegotiationResult,
};
use crate::dispatcher::OutcomeDispatcher;
use crate::error::{ConfigurationError, NegotiationError, ReentrancyError};
use crate::host::{CapabilityStatusSource, PlatformGate, RequestGateway, SettingsLauncher};
use crate::prompt::{PreRequestPrompt, PromptDecision, PromptSpec, PromptTicket};
use crate::token::RequestToken;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Immutable configuration of one negotiation, moved into
/// [`NegotiationSession::run`].
#[derive(Debug)]
pub struct NegotiationRequest {
    query: CapabilityQuery,
    dispatcher: OutcomeDispatcher,
    gate: PlatformGate,
    prompt: Option<PromptSpec>,
}

impl NegotiationRequest {
    /// Request `query` with the default gate ([`PlatformGate::REQUIRED`]) and
    /// no justification prompt.
    pub fn new(query: impl Into<CapabilityQuery>, dispatcher: OutcomeDispatcher) -> Self {
        Self {
            query: query.into(),
            dispatcher,
            gate: PlatformGate::default(),
            prompt: None,
        }
    }

    pub fn with_gate(self, gate: impl Into<PlatformGate>) -> Self {
        Self {
            gate: gate.into(),
            ..self
        }
    }

    /// Show `spec` before the host's request, unless a missing capability is
    /// already known to be permanently denied.
    pub fn with_prompt(self, spec: PromptSpec) -> Self {
        Self {
            prompt: Some(spec),
            ..self
        }
    }

    pub fn query(&self) -> &CapabilityQuery {
        &self.query
    }

    pub fn gate(&self) -> PlatformGate {
        self.gate
    }

    pub fn prompt_spec(&self) -> Option<&PromptSpec> {
        self.prompt.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Observable states and results
// ---------------------------------------------------------------------------

/// Where a session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    /// Justification prompt shown, waiting for a [`PromptDecision`].
    Prompting,
    /// Host request issued, waiting for [`NegotiationSession::handle_result`].
    Awaiting,
    Closed,
}

/// What [`NegotiationSession::run`] did before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A verdict was dispatched synchronously and the session is closed.
    Completed(CapabilityOutcome),
    /// The prompt is showing; relay the decision for this token.
    Prompting(RequestToken),
    /// The host request is in flight; relay the result for this token.
    Requested(RequestToken),
}

/// What a relayed host event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The verdict was dispatched and the session is closed.
    Dispatched(CapabilityOutcome),
    /// An accepted prompt led to the host request for this token.
    Requested(RequestToken),
    /// Closed session, unknown token, or wrong phase. Nothing happened.
    Stale,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Pending {
    token: RequestToken,
    query: CapabilityQuery,
    missing: Vec<Capability>,
    dispatcher: OutcomeDispatcher,
}

enum SessionState {
    Idle,
    Prompting(Pending),
    Awaiting(Pending),
    Closed,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Prompting(_) => SessionPhase::Prompting,
            SessionState::Awaiting(_) => SessionPhase::Awaiting,
            SessionState::Closed => SessionPhase::Closed,
        }
    }

    fn token(&self) -> Option<RequestToken> {
        match self {
            SessionState::Prompting(pending) | SessionState::Awaiting(pending) => {
                Some(pending.token)
            }
            SessionState::Idle | SessionState::Closed => None,
        }
    }
}

/// Single-shot negotiation against one host.
///
/// The session is driven from the host's event loop: [`run`] starts the
/// negotiation, the host relays its asynchronous answers through
/// [`handle_prompt_decision`] and [`handle_result`], and calls [`cancel`]
/// when its own lifecycle ends first.
///
/// [`run`]: Self::run
/// [`handle_prompt_decision`]: Self::handle_prompt_decision
/// [`handle_result`]: Self::handle_result
/// [`cancel`]: Self::cancel
pub struct NegotiationSession<S, G> {
    status: S,
    gateway: G,
    prompt: Option<Box<dyn PreRequestPrompt>>,
    settings: Option<Box<dyn SettingsLauncher>>,
    state: SessionState,
}

impl<S, G> NegotiationSession<S, G>
where
    S: CapabilityStatusSource,
    G: RequestGateway,
{
    pub fn new(status: S, gateway: G) -> Self {
        Self {
            status,
            gateway,
            prompt: None,
            settings: None,
            state: SessionState::Idle,
        }
    }

    /// Attach the collaborator that shows justification prompts.
    pub fn with_prompt(mut self, prompt: impl PreRequestPrompt + 'static) -> Self {
        self.prompt = Some(Box::new(prompt));
        self
    }

    /// Attach the collaborator behind [`start_host_settings_screen`].
    ///
    /// [`start_host_settings_screen`]: Self::start_host_settings_screen
    pub fn with_settings_launcher(mut self, launcher: impl SettingsLauncher + 'static) -> Self {
        self.settings = Some(Box::new(launcher));
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Token of the outstanding prompt or request, if any.
    pub fn pending_token(&self) -> Option<RequestToken> {
        self.state.token()
    }

    pub fn status(&self) -> &S {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut S {
        &mut self.status
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    /// Start the negotiation described by `request`.
    ///
    /// Configuration is validated before anything else; a
    /// [`ConfigurationError`] leaves the session idle. A session that already
    /// ran (or is running) rejects further runs with a [`ReentrancyError`].
    pub fn run(&mut self, request: NegotiationRequest) -> Result<RunOutcome, NegotiationError> {
        let NegotiationRequest {
            query,
            dispatcher,
            gate,
            prompt,
        } = request;

        if !dispatcher.is_complete() {
            return Err(ConfigurationError::MissingHandlers(dispatcher.missing_handlers()).into());
        }
        if prompt.is_some() && self.prompt.is_none() {
            return Err(ConfigurationError::PromptUnavailable.into());
        }
        match &self.state {
            SessionState::Idle => {}
            SessionState::Closed => return Err(ReentrancyError::Closed.into()),
            SessionState::Prompting(pending) | SessionState::Awaiting(pending) => {
                return Err(ReentrancyError::Outstanding(pending.token).into());
            }
        }

        let token = RequestToken::next();

        if !gate.supports_authorization() {
            log::debug!(
                "Negotiation {token}: platform grants implicitly, {} capabilities granted",
                query.len()
            );
            return Ok(self.complete_granted(token, &query, dispatcher));
        }

        let missing = self.missing_capabilities(&query);
        if missing.is_empty() {
            log::debug!(
                "Negotiation {token}: all {} capabilities already granted",
                query.len()
            );
            return Ok(self.complete_granted(token, &query, dispatcher));
        }

        let pending = Pending {
            token,
            query,
            missing,
            dispatcher,
        };

        if let Some(spec) = prompt {
            let refused = pending
                .missing
                .iter()
                .find(|capability| self.status.is_known_permanently_denied(capability))
                .cloned();
            match (refused, self.prompt.as_mut()) {
                (Some(capability), _) => {
                    log::debug!(
                        "Negotiation {token}: skipping prompt, {capability} is already permanently denied"
                    );
                }
                (None, Some(prompt_ui)) => {
                    log::info!(
                        "Negotiation {token}: showing prompt '{}' for {}",
                        spec.title,
                        join(&pending.missing)
                    );
                    prompt_ui.show(&spec, &pending.missing, PromptTicket::new(token));
                    self.state = SessionState::Prompting(pending);
                    return Ok(RunOutcome::Prompting(token));
                }
                (None, None) => {}
            }
        }

        self.issue_request(pending);
        Ok(RunOutcome::Requested(token))
    }

    /// Relay the user's answer to the justification prompt.
    ///
    /// Acceptance issues the host request. Declining dispatches `Denied` for
    /// the whole batch without contacting the gateway.
    pub fn handle_prompt_decision(&mut self, decision: PromptDecision) -> Disposition {
        let pending = match mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Prompting(pending) if pending.token == decision.token() => pending,
            other => {
                log::debug!(
                    "Negotiation: dropping prompt decision for {} (phase={:?})",
                    decision.token(),
                    other.phase()
                );
                self.state = other;
                return Disposition::Stale;
            }
        };

        if decision.accepted() {
            let token = pending.token;
            self.issue_request(pending);
            return Disposition::Requested(token);
        }

        log::info!("Negotiation {}: prompt declined", pending.token);
        let outcomes = pending
            .query
            .distinct()
            .into_iter()
            .map(|capability| CapabilityReport {
                capability: capability.clone(),
                outcome: if pending.missing.contains(capability) {
                    CapabilityOutcome::Denied
                } else {
                    CapabilityOutcome::Granted
                },
            })
            .collect();
        let result = NegotiationResult::from_outcomes(outcomes);
        Disposition::Dispatched(deliver(pending.token, pending.dispatcher, &result))
    }

    /// Relay the host's answer to the request identified by `token`.
    ///
    /// `capabilities` and `granted` are parallel slices as reported by the
    /// host. A requested capability missing from the report, or without a
    /// flag, counts as not granted. Non-granted capabilities are classified
    /// with [`CapabilityStatusSource::can_show_rationale`].
    pub fn handle_result(
        &mut self,
        token: RequestToken,
        capabilities: &[Capability],
        granted: &[bool],
    ) -> Disposition {
        let pending = match mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Awaiting(pending) if pending.token == token => pending,
            other => {
                log::debug!(
                    "Negotiation: dropping stale result for {token} (phase={:?})",
                    other.phase()
                );
                self.state = other;
                return Disposition::Stale;
            }
        };

        let outcomes = pending
            .query
            .distinct()
            .into_iter()
            .map(|capability| {
                let outcome = if !pending.missing.contains(capability)
                    || reported_granted(capability, capabilities, granted)
                {
                    CapabilityOutcome::Granted
                } else if self.status.can_show_rationale(capability) {
                    CapabilityOutcome::Denied
                } else {
                    CapabilityOutcome::PermanentlyDenied
                };
                CapabilityReport {
                    capability: capability.clone(),
                    outcome,
                }
            })
            .collect();
        let result = NegotiationResult::from_outcomes(outcomes);
        Disposition::Dispatched(deliver(pending.token, pending.dispatcher, &result))
    }

    /// Close the session immediately and release the caller's handlers.
    ///
    /// Whatever is outstanding is abandoned; later relays for its token are
    /// dropped as stale.
    pub fn cancel(&mut self) {
        match mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Prompting(pending) | SessionState::Awaiting(pending) => {
                log::info!(
                    "Negotiation {}: cancelled by host, handlers released",
                    pending.token
                );
            }
            SessionState::Idle => log::debug!("Negotiation: idle session cancelled"),
            SessionState::Closed => {}
        }
    }

    /// Ask the host to open its settings screen, where permanently denied
    /// capabilities can be granted. Valid in any phase.
    pub fn start_host_settings_screen(&mut self) {
        match self.settings.as_mut() {
            Some(launcher) => launcher.open_settings(),
            None => log::warn!("Negotiation: no settings launcher attached, ignoring request"),
        }
    }

    fn missing_capabilities(&self, query: &CapabilityQuery) -> Vec<Capability> {
        query
            .distinct()
            .into_iter()
            .filter(|capability| !self.status.is_granted(capability))
            .cloned()
            .collect()
    }

    fn issue_request(&mut self, pending: Pending) {
        log::info!(
            "Negotiation {}: requesting {}",
            pending.token,
            join(&pending.missing)
        );
        self.gateway.request_async(pending.token, &pending.missing);
        self.state = SessionState::Awaiting(pending);
    }

    fn complete_granted(
        &mut self,
        token: RequestToken,
        query: &CapabilityQuery,
        dispatcher: OutcomeDispatcher,
    ) -> RunOutcome {
        self.state = SessionState::Closed;
        let result = NegotiationResult::all_granted(query);
        RunOutcome::Completed(deliver(token, dispatcher, &result))
    }
}

impl<S, G> fmt::Debug for NegotiationSession<S, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NegotiationSession")
            .field("phase", &self.state.phase())
            .field("pending_token", &self.state.token())
            .field("has_prompt", &self.prompt.is_some())
            .field("has_settings_launcher", &self.settings.is_some())
            .finish()
    }
}

impl<S, G> Drop for NegotiationSession<S, G> {
    fn drop(&mut self) {
        if let Some(token) = self.state.token() {
            log::debug!(
                "Negotiation {token}: session dropped while outstanding, nothing dispatched"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run the matching handler; the dispatcher and every handler it held are
/// dropped before this returns.
fn deliver(
    token: RequestToken,
    dispatcher: OutcomeDispatcher,
    result: &NegotiationResult,
) -> CapabilityOutcome {
    let verdict = result.verdict();
    match dispatcher.dispatch(result) {
        Some(slot) => log::info!("Negotiation {token}: verdict={verdict} handler={slot:?}"),
        None => log::error!("Negotiation {token}: no handler registered for verdict={verdict}"),
    }
    verdict
}

fn reported_granted(
    capability: &Capability,
    capabilities: &[Capability],
    granted: &[bool],
) -> bool {
    capabilities
        .iter()
        .zip(granted)
        .any(|(reported, &flag)| reported == capability && flag)
}

fn join(capabilities: &[Capability]) -> String {
    capabilities
        .iter()
        .map(Capability::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;

    #[derive(Default)]
    struct FakeStatus {
        granted: HashSet<Capability>,
        rationale: HashSet<Capability>,
        refused: HashSet<Capability>,
        rationale_checks: Cell<usize>,
    }

    impl FakeStatus {
        fn granting(capabilities: &[&str]) -> Self {
            Self {
                granted: capabilities.iter().map(|c| Capability::from(*c)).collect(),
                ..Self::default()
            }
        }
    }

    impl CapabilityStatusSource for FakeStatus {
        fn is_granted(&self, capability: &Capability) -> bool {
            self.granted.contains(capability)
        }

        fn can_show_rationale(&self, capability: &Capability) -> bool {
            self.rationale_checks.set(self.rationale_checks.get() + 1);
            self.rationale.contains(capability)
        }

        fn is_known_permanently_denied(&self, capability: &Capability) -> bool {
            self.refused.contains(capability)
        }
    }

    #[derive(Default)]
    struct FakeGateway {
        requests: Vec<(RequestToken, Vec<Capability>)>,
    }

    impl RequestGateway for FakeGateway {
        fn request_async(&mut self, token: RequestToken, capabilities: &[Capability]) {
            self.requests.push((token, capabilities.to_vec()));
        }
    }

    type Shown = Rc<RefCell<Vec<(String, Vec<Capability>, PromptTicket)>>>;

    struct FakePrompt {
        shown: Shown,
    }

    impl PreRequestPrompt for FakePrompt {
        fn show(&mut self, spec: &PromptSpec, capabilities: &[Capability], ticket: PromptTicket) {
            self.shown
                .borrow_mut()
                .push((spec.title.clone(), capabilities.to_vec(), ticket));
        }
    }

    type Fired = Rc<RefCell<Vec<(&'static str, NegotiationResult)>>>;

    fn dispatcher(fired: &Fired) -> OutcomeDispatcher {
        let on_granted = Rc::clone(fired);
        let on_denied = Rc::clone(fired);
        let on_permanent = Rc::clone(fired);
        OutcomeDispatcher::new()
            .on_granted(move |r| on_granted.borrow_mut().push(("granted", r.clone())))
            .on_denied(move |r| on_denied.borrow_mut().push(("denied", r.clone())))
            .on_permanently_denied(move |r| {
                on_permanent.borrow_mut().push(("permanent", r.clone()))
            })
    }

    fn spec() -> PromptSpec {
        PromptSpec::new("Camera", "Needed to scan codes", "Continue")
    }

    fn caps(ids: &[&str]) -> Vec<Capability> {
        ids.iter().map(|c| Capability::from(*c)).collect()
    }

    #[test]
    fn test_missing_handlers_fail_before_host_interaction() {
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
        let request = NegotiationRequest::new(
            CapabilityQuery::single("camera"),
            OutcomeDispatcher::new().on_granted(|_| {}),
        );
        let err = session.run(request).unwrap_err();
        assert_eq!(
            err,
            NegotiationError::Configuration(ConfigurationError::MissingHandlers(vec!["on_denied"]))
        );
        assert!(session.gateway().requests.is_empty());
        assert_eq!(session.phase(), SessionPhase::Idle);

        // The session is still usable once the request is fixed.
        let fired = Fired::default();
        let outcome = session
            .run(NegotiationRequest::new(
                CapabilityQuery::single("camera"),
                dispatcher(&fired),
            ))
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Requested(_)));
    }

    #[test]
    fn test_prompt_spec_without_prompt_collaborator_is_a_configuration_error() {
        let fired = Fired::default();
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
        let err = session
            .run(
                NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired))
                    .with_prompt(spec()),
            )
            .unwrap_err();
        assert_eq!(
            err,
            NegotiationError::Configuration(ConfigurationError::PromptUnavailable)
        );
        assert_eq!(session.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_second_run_while_outstanding_is_rejected() {
        let fired = Fired::default();
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
        let RunOutcome::Requested(token) = session
            .run(NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired)))
            .unwrap()
        else {
            panic!("expected an outstanding request");
        };

        let err = session
            .run(NegotiationRequest::new(CapabilityQuery::single("mic"), dispatcher(&fired)))
            .unwrap_err();
        assert_eq!(err, NegotiationError::Reentrancy(ReentrancyError::Outstanding(token)));
        assert_eq!(session.gateway().requests.len(), 1);
        assert_eq!(session.pending_token(), Some(token));
    }

    #[test]
    fn test_run_on_closed_session_is_rejected() {
        let fired = Fired::default();
        let mut session =
            NegotiationSession::new(FakeStatus::granting(&["camera"]), FakeGateway::default());
        session
            .run(NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired)))
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed);

        let err = session
            .run(NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired)))
            .unwrap_err();
        assert_eq!(err, NegotiationError::Reentrancy(ReentrancyError::Closed));
        assert_eq!(fired.borrow().len(), 1);
    }

    #[test]
    fn test_configuration_error_wins_over_reentrancy() {
        let fired = Fired::default();
        let mut session =
            NegotiationSession::new(FakeStatus::granting(&["camera"]), FakeGateway::default());
        session
            .run(NegotiationRequest::new(
                CapabilityQuery::single("camera"),
                dispatcher(&fired),
            ))
            .unwrap();
        assert_eq!(session.phase(), SessionPhase::Closed);

        let err = session
            .run(NegotiationRequest::new(
                CapabilityQuery::single("camera"),
                OutcomeDispatcher::new().on_denied(|_| {}),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            NegotiationError::Configuration(ConfigurationError::MissingHandlers(vec!["on_granted"]))
        );
        assert_eq!(session.phase(), SessionPhase::Closed);
    }

    #[test]
    fn test_empty_query_is_trivially_granted() {
        let fired = Fired::default();
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
        let outcome = session
            .run(NegotiationRequest::new(CapabilityQuery::default(), dispatcher(&fired)))
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed(CapabilityOutcome::Granted));
        assert!(session.gateway().requests.is_empty());
        assert_eq!(fired.borrow()[0].0, "granted");
    }

    #[test]
    fn test_only_missing_capabilities_are_requested_once() {
        let fired = Fired::default();
        let mut session =
            NegotiationSession::new(FakeStatus::granting(&["mic"]), FakeGateway::default());
        session
            .run(NegotiationRequest::new(
                CapabilityQuery::new(["camera", "mic", "camera", "location"]),
                dispatcher(&fired),
            ))
            .unwrap();
        let (_, requested) = &session.gateway().requests[0];
        assert_eq!(requested, &caps(&["camera", "location"]));
    }

    #[test]
    fn test_prompt_accept_issues_request() {
        let shown = Shown::default();
        let fired = Fired::default();
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default())
            .with_prompt(FakePrompt {
                shown: Rc::clone(&shown),
            });

        let outcome = session
            .run(
                NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired))
                    .with_prompt(spec()),
            )
            .unwrap();
        let RunOutcome::Prompting(token) = outcome else {
            panic!("expected prompt, got {outcome:?}");
        };
        assert_eq!(session.phase(), SessionPhase::Prompting);
        assert!(session.gateway().requests.is_empty());

        let (title, prompted, ticket) = shown.borrow_mut().pop().unwrap();
        assert_eq!(title, "Camera");
        assert_eq!(prompted, caps(&["camera"]));

        assert_eq!(
            session.handle_prompt_decision(ticket.accept()),
            Disposition::Requested(token)
        );
        assert_eq!(session.phase(), SessionPhase::Awaiting);
        assert_eq!(session.gateway().requests, vec![(token, caps(&["camera"]))]);
        assert!(fired.borrow().is_empty());
    }

    #[test]
    fn test_prompt_decline_denies_without_request() {
        let shown = Shown::default();
        let fired = Fired::default();
        let mut session =
            NegotiationSession::new(FakeStatus::granting(&["mic"]), FakeGateway::default())
                .with_prompt(FakePrompt {
                    shown: Rc::clone(&shown),
                });
        session
            .run(
                NegotiationRequest::new(CapabilityQuery::new(["camera", "mic"]), dispatcher(&fired))
                    .with_prompt(spec()),
            )
            .unwrap();

        let (_, _, ticket) = shown.borrow_mut().pop().unwrap();
        assert_eq!(
            session.handle_prompt_decision(ticket.decline()),
            Disposition::Dispatched(CapabilityOutcome::Denied)
        );
        assert!(session.gateway().requests.is_empty());
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(session.status().rationale_checks.get(), 0);

        let fired = fired.borrow();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].0, "denied");
        assert_eq!(
            fired[0].1.outcome_of(&Capability::from("mic")),
            Some(CapabilityOutcome::Granted)
        );
    }

    #[test]
    fn test_prompt_skipped_when_history_says_permanently_denied() {
        let shown = Shown::default();
        let fired = Fired::default();
        let status = FakeStatus {
            refused: caps(&["camera"]).into_iter().collect(),
            ..FakeStatus::default()
        };
        let mut session =
            NegotiationSession::new(status, FakeGateway::default()).with_prompt(FakePrompt {
                shown: Rc::clone(&shown),
            });
        let outcome = session
            .run(
                NegotiationRequest::new(CapabilityQuery::new(["camera", "mic"]), dispatcher(&fired))
                    .with_prompt(spec()),
            )
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Requested(_)));
        assert!(shown.borrow().is_empty());
        assert_eq!(session.gateway().requests.len(), 1);
    }

    #[test]
    fn test_decision_for_other_token_is_stale() {
        let shown = Shown::default();
        let fired = Fired::default();
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default())
            .with_prompt(FakePrompt {
                shown: Rc::clone(&shown),
            });
        session
            .run(
                NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired))
                    .with_prompt(spec()),
            )
            .unwrap();

        let foreign = PromptTicket::new(RequestToken::from_raw(u64::MAX)).decline();
        assert_eq!(session.handle_prompt_decision(foreign), Disposition::Stale);
        assert_eq!(session.phase(), SessionPhase::Prompting);
        assert!(fired.borrow().is_empty());
    }

    #[test]
    fn test_result_while_prompting_is_stale() {
        let shown = Shown::default();
        let fired = Fired::default();
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default())
            .with_prompt(FakePrompt {
                shown: Rc::clone(&shown),
            });
        let RunOutcome::Prompting(token) = session
            .run(
                NegotiationRequest::new(CapabilityQuery::single("camera"), dispatcher(&fired))
                    .with_prompt(spec()),
            )
            .unwrap()
        else {
            panic!("expected prompt");
        };

        assert_eq!(
            session.handle_result(token, &caps(&["camera"]), &[true]),
            Disposition::Stale
        );
        assert_eq!(session.phase(), SessionPhase::Prompting);
    }

    #[test]
    fn test_short_flag_array_counts_as_denied() {
        let fired = Fired::default();
        let status = FakeStatus {
            rationale: caps(&["mic"]).into_iter().collect(),
            ..FakeStatus::default()
        };
        let mut session = NegotiationSession::new(status, FakeGateway::default());
        let RunOutcome::Requested(token) = session
            .run(NegotiationRequest::new(
                CapabilityQuery::new(["camera", "mic"]),
                dispatcher(&fired),
            ))
            .unwrap()
        else {
            panic!("expected request");
        };

        // Interrupted host request: capability list reported, flags missing.
        let disposition = session.handle_result(token, &caps(&["camera", "mic"]), &[true]);
        assert_eq!(disposition, Disposition::Dispatched(CapabilityOutcome::Denied));
        let fired = fired.borrow();
        assert_eq!(fired[0].1.reported().map(Capability::as_str), Some("mic"));
    }

    #[test]
    fn test_mixed_batch_reduces_to_permanent_denial() {
        let fired = Fired::default();
        let status = FakeStatus {
            rationale: caps(&["camera"]).into_iter().collect(),
            ..FakeStatus::default()
        };
        let mut session = NegotiationSession::new(status, FakeGateway::default());
        let RunOutcome::Requested(token) = session
            .run(NegotiationRequest::new(
                CapabilityQuery::new(["camera", "location", "mic"]),
                dispatcher(&fired),
            ))
            .unwrap()
        else {
            panic!("expected request");
        };

        let disposition = session.handle_result(
            token,
            &caps(&["camera", "location", "mic"]),
            &[false, false, true],
        );
        assert_eq!(
            disposition,
            Disposition::Dispatched(CapabilityOutcome::PermanentlyDenied)
        );
        // Rationale is only consulted for the two refused capabilities.
        assert_eq!(session.status().rationale_checks.get(), 2);

        let fired = fired.borrow();
        assert_eq!(fired[0].0, "permanent");
        assert_eq!(fired[0].1.reported().map(Capability::as_str), Some("location"));
        assert_eq!(
            fired[0].1.outcome_of(&Capability::from("camera")),
            Some(CapabilityOutcome::Denied)
        );
    }

    #[test]
    fn test_cancel_releases_handlers_immediately() {
        let captured = Rc::new(());
        let in_granted = Rc::clone(&captured);
        let in_denied = Rc::clone(&captured);
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
        session
            .run(NegotiationRequest::new(
                CapabilityQuery::single("camera"),
                OutcomeDispatcher::new()
                    .on_granted(move |_| drop(in_granted))
                    .on_denied(move |_| drop(in_denied)),
            ))
            .unwrap();
        assert_eq!(Rc::strong_count(&captured), 3);

        session.cancel();
        assert_eq!(Rc::strong_count(&captured), 1);
        assert_eq!(session.phase(), SessionPhase::Closed);
        assert_eq!(session.pending_token(), None);
    }

    #[test]
    fn test_dropping_outstanding_session_never_dispatches() {
        let fired = Fired::default();
        {
            let mut session =
                NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
            session
                .run(NegotiationRequest::new(
                    CapabilityQuery::single("camera"),
                    dispatcher(&fired),
                ))
                .unwrap();
        }
        assert!(fired.borrow().is_empty());
        assert_eq!(Rc::strong_count(&fired), 1);
    }

    #[test]
    fn test_settings_screen_forwards_to_launcher() {
        struct Launcher(Rc<Cell<usize>>);
        impl SettingsLauncher for Launcher {
            fn open_settings(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let opened = Rc::new(Cell::new(0));
        let mut session = NegotiationSession::new(FakeStatus::default(), FakeGateway::default())
            .with_settings_launcher(Launcher(Rc::clone(&opened)));
        session.start_host_settings_screen();
        session.cancel();
        session.start_host_settings_screen();
        assert_eq!(opened.get(), 2);

        // Without a launcher it is a no-op.
        let mut bare = NegotiationSession::new(FakeStatus::default(), FakeGateway::default());
        bare.start_host_settings_screen();
    }
}
