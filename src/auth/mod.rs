//! Authentication module
//!
//! Supplies bearer tokens for the BigQuery REST API.
//!
//! Credentials resolve from the environment to a static access token or a
//! service-account key (JWT exchange). With neither set, requests go out
//! unauthenticated, which is what local emulators expect.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken, ServiceAccountKey, BIGQUERY_SCOPE};
