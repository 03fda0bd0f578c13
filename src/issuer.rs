//! Token issuers consulted by the cache when no valid credential is available.
//!
//! [`TokenIssuer`] is the only upstream dependency of [`TokenCache`](crate::cache::TokenCache).
//! The crate ships [`ClientCredentialsIssuer`], which speaks the OAuth 2.0 client-credentials
//! grant over HTTP; tests and embedders can supply their own implementation.

mod client_credentials;

pub use client_credentials::*;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Boxed future returned by [`TokenIssuer::acquire`].
pub type IssuerFuture<'a> = Pin<Box<dyn Future<Output = Result<IssuedToken>> + 'a + Send>>;

/// Fresh access token returned by an issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
	/// Opaque bearer token.
	pub value: TokenSecret,
	/// Lifetime reported by the issuer, counted from the moment the token was received.
	pub ttl: Duration,
}
impl IssuedToken {
	/// Creates a token from its raw value and lifetime.
	pub fn new(value: impl Into<String>, ttl: Duration) -> Self {
		Self { value: TokenSecret::new(value), ttl }
	}
}

/// Upstream source of access tokens.
///
/// Each call performs exactly one acquisition attempt and never retries; the cache guarantees
/// that at most one call is outstanding at a time.
pub trait TokenIssuer
where
	Self: 'static + Send + Sync,
{
	/// Obtains a new access token.
	fn acquire(&self) -> IssuerFuture<'_>;
}
