use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use cc_core::Clock;
use cc_core::model::UserId;

/// A signed-in session as issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// What a caller knows about an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub path: String,
    pub access_token: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            access_token: None,
        }
    }

    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

/// Resolves the session, if any, behind a request.
pub trait SessionGate: Send + Sync {
    fn resolve_session(&self, ctx: &RequestContext) -> Option<Session>;
}

/// Holds the session of the signed-in user for the lifetime of the process.
///
/// Filled on sign-in and emptied on sign-out. A request that presents its own
/// token only resolves when the token matches the held session.
#[derive(Clone, Default)]
pub struct SessionSlot {
    clock: Clock,
    current: Arc<RwLock<Option<Session>>>,
}

impl SessionSlot {
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            current: Arc::new(RwLock::new(None)),
        }
    }

    // Writers replace the whole value, so a poisoned lock still holds a
    // valid session.
    pub fn set(&self, session: Session) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(session);
    }

    pub fn clear(&self) -> Option<Session> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    #[must_use]
    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionGate for SessionSlot {
    fn resolve_session(&self, ctx: &RequestContext) -> Option<Session> {
        let session = self.current()?;
        if session.is_expired(self.clock.now()) {
            return None;
        }
        match &ctx.access_token {
            Some(token) if *token != session.access_token => None,
            _ => Some(session),
        }
    }
}

/// Always resolves to one fixed local user; used with the local database.
#[derive(Debug, Clone)]
pub struct StaticGate {
    session: Session,
}

impl StaticGate {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            session: Session {
                user_id,
                access_token: String::new(),
                expires_at: None,
            },
        }
    }
}

impl SessionGate for StaticGate {
    fn resolve_session(&self, _ctx: &RequestContext) -> Option<Session> {
        Some(self.session.clone())
    }
}

/// Gate that never resolves. Useful for exercising unauthenticated paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignedOut;

impl SessionGate for SignedOut {
    fn resolve_session(&self, _ctx: &RequestContext) -> Option<Session> {
        None
    }
}

pub const SIGN_IN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/app";
const PROTECTED_PREFIXES: &[&str] = &["/app", "/cards"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Redirect(&'static str),
}

fn is_protected(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Decide whether a view may be shown.
///
/// Protected views without a session go to sign-in; the sign-in view with a
/// session goes to the app.
#[must_use]
pub fn guard_route(path: &str, has_session: bool) -> RouteDecision {
    if is_protected(path) && !has_session {
        return RouteDecision::Redirect(SIGN_IN_PATH);
    }
    if path == SIGN_IN_PATH && has_session {
        return RouteDecision::Redirect(HOME_PATH);
    }
    RouteDecision::Proceed
}

/// Run the gate for `ctx` and apply [`guard_route`] to its path.
#[must_use]
pub fn guard_request(gate: &dyn SessionGate, ctx: &RequestContext) -> RouteDecision {
    let has_session = gate.resolve_session(ctx).is_some();
    guard_route(&ctx.path, has_session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cc_core::time::fixed_now;
    use chrono::Duration;

    fn session(expires_in: Option<i64>) -> Session {
        Session {
            user_id: UserId::from_u128(1),
            access_token: "token-a".into(),
            expires_at: expires_in.map(|secs| fixed_now() + Duration::seconds(secs)),
        }
    }

    #[test]
    fn protected_paths_redirect_to_sign_in_without_session() {
        assert_eq!(guard_route("/app", false), RouteDecision::Redirect("/login"));
        assert_eq!(
            guard_route("/app/cards", false),
            RouteDecision::Redirect("/login")
        );
        assert_eq!(guard_route("/cards", false), RouteDecision::Redirect("/login"));
        assert_eq!(guard_route("/app", true), RouteDecision::Proceed);
    }

    #[test]
    fn sign_in_redirects_home_with_session() {
        assert_eq!(guard_route("/login", true), RouteDecision::Redirect("/app"));
        assert_eq!(guard_route("/login", false), RouteDecision::Proceed);
    }

    #[test]
    fn unrelated_paths_proceed() {
        assert_eq!(guard_route("/", false), RouteDecision::Proceed);
        assert_eq!(guard_route("/application", false), RouteDecision::Proceed);
    }

    #[test]
    fn slot_resolves_until_cleared() {
        let slot = SessionSlot::new(Clock::fixed(fixed_now()));
        let ctx = RequestContext::for_path("/app");
        assert!(slot.resolve_session(&ctx).is_none());

        slot.set(session(Some(60)));
        assert_eq!(slot.resolve_session(&ctx).unwrap().user_id, UserId::from_u128(1));

        slot.clear();
        assert!(slot.resolve_session(&ctx).is_none());
    }

    #[test]
    fn slot_ignores_expired_sessions() {
        let slot = SessionSlot::new(Clock::fixed(fixed_now()));
        slot.set(session(Some(0)));
        assert!(slot.resolve_session(&RequestContext::default()).is_none());
    }

    #[test]
    fn slot_rejects_mismatched_request_token() {
        let slot = SessionSlot::new(Clock::fixed(fixed_now()));
        slot.set(session(None));
        let stale = RequestContext::for_path("/app").with_access_token("token-b");
        assert!(slot.resolve_session(&stale).is_none());
        let fresh = RequestContext::for_path("/app").with_access_token("token-a");
        assert!(slot.resolve_session(&fresh).is_some());
    }

    #[test]
    fn slot_keeps_working_after_a_panicking_writer() {
        let slot = SessionSlot::new(Clock::fixed(fixed_now()));
        slot.set(session(None));

        let shared = slot.clone();
        let crashed = std::thread::spawn(move || {
            let _guard = shared.current.write().unwrap();
            panic!("writer crashed while holding the session lock");
        })
        .join();
        assert!(crashed.is_err());
        assert!(slot.current.is_poisoned());

        assert_eq!(slot.current().unwrap().access_token, "token-a");
        let mut renewed = session(None);
        renewed.access_token = "token-b".into();
        slot.set(renewed);
        assert_eq!(slot.current().unwrap().access_token, "token-b");

        assert!(slot.clear().is_some());
        assert!(slot.current().is_none());
    }

    #[test]
    fn guard_request_uses_gate() {
        let ctx = RequestContext::for_path("/cards");
        assert_eq!(
            guard_request(&SignedOut, &ctx),
            RouteDecision::Redirect("/login")
        );
        assert_eq!(
            guard_request(&StaticGate::new(UserId::from_u128(2)), &ctx),
            RouteDecision::Proceed
        );
    }
}
