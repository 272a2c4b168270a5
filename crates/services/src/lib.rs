#![forbid(unsafe_code)]

pub mod app_services;
pub mod browse;
pub mod catalog;
pub mod completion;
pub mod error;
pub mod identity;
pub mod selection;
pub mod session_gate;

pub use cc_core::Clock;

pub use app_services::AppServices;
pub use browse::{CardDeck, CategoryPicker, DeckCard, DeckProgress, PendingToggle};
pub use catalog::CatalogService;
pub use completion::CompletionTracker;
pub use error::{AppServicesError, IdentityError, ServiceError};
pub use identity::{AuthService, IdentityProvider, SupabaseAuth};
pub use selection::{QuestionSelectionService, shuffle};
pub use session_gate::{
    RequestContext, RouteDecision, Session, SessionGate, SessionSlot, SignedOut, StaticGate,
    guard_request, guard_route,
};
