pub mod linked;
pub mod oauth;
pub mod session;
pub mod tabs;

pub use linked::{Cookie, CookieSource, LinkedAccount, LINKED_DISPLAY_NAME, X_WEB_BEARER_TOKEN};
pub use oauth::{AuthEvent, LoginAttempt, LoginOutcome, MonitorState, OAuthCoordinator, LOGIN_STARTED_MESSAGE};
pub use session::DelegatedSession;
pub use tabs::{TabEvent, TabEventHub, TabHost, TabId, TabSubscription};
