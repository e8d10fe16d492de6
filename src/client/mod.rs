//! Browser-side session plumbing: the observable authentication state
//! machine and the HTTP client that hydrates it.

mod api;
mod controller;

pub use api::{AuthClient, ClientError};
pub use controller::{Navigation, SessionController, SessionPhase};
