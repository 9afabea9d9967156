//! Clients for the hosted backend: identity (`/auth/v1`), the watchlist
//! table (`/rest/v1`) and avatar object storage (`/storage/v1`).

pub mod auth;
pub mod client;
pub mod error;
pub mod storage;
pub mod types;

pub use auth::AuthClient;
pub use client::BackendClient;
pub use error::BackendError;
