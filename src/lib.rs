//! Single-flight client-credentials token cache plus a thin Data Management pass-through client
//! for hub browser backends.
//!
//! The crate is built around [`cache::TokenCache`]: any number of concurrent callers share one
//! cached access token, and while the token is missing or expired they share one in-flight
//! acquisition against the upstream token endpoint. [`data::DataClient`] uses the cache to
//! attach bearer tokens to hub/project/folder/item/version lookups, and [`config::Settings`]
//! wires everything together from environment variables or a deserialized document.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
#[cfg(feature = "reqwest")] pub mod data;
pub mod error;
pub mod http;
pub mod issuer;
pub mod oauth;
pub mod obs;
pub mod provider;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ProviderId, ScopeSet},
		cache::TokenCache,
		clock::ManualClock,
		data::DataClient,
		http::ReqwestHttpClient,
		issuer::ClientCredentialsIssuer,
		oauth::ReqwestTransportErrorMapper,
		provider::{ClientAuthMethod, DefaultProviderStrategy, ProviderDescriptor},
	};

	/// Issuer type alias used by reqwest-backed integration tests.
	pub type ReqwestTestIssuer =
		ClientCredentialsIssuer<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_client() -> ReqwestClient {
		ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.")
	}

	/// Wraps [`test_reqwest_client`] in the token transport.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		ReqwestHttpClient::with_client(test_reqwest_client())
	}

	/// Builds a descriptor whose token endpoint and data API live on the provided mock base URL.
	pub fn test_descriptor(base: &str) -> ProviderDescriptor {
		let base = Url::parse(base).expect("Mock base URL should parse successfully.");
		let provider_id =
			ProviderId::new("mock-aps").expect("Failed to build mock provider identifier.");

		ProviderDescriptor::builder(provider_id)
			.base_url(&base)
			.expect("Failed to derive descriptor endpoints from the mock base URL.")
			.preferred_client_auth_method(ClientAuthMethod::ClientSecretPost)
			.build()
			.expect("Mock descriptor should build successfully.")
	}

	/// Constructs a client-credentials issuer backed by the reqwest transport used across
	/// integration tests.
	pub fn build_reqwest_test_issuer(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		scope: ScopeSet,
	) -> ReqwestTestIssuer {
		ClientCredentialsIssuer::with_http_client(
			descriptor,
			Arc::new(DefaultProviderStrategy),
			client_id,
			client_secret,
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Test issuer should accept non-empty client credentials.")
		.with_scope(scope)
	}

	/// Wraps a test issuer in a [`TokenCache`] driven by a [`ManualClock`].
	pub fn build_reqwest_test_cache(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		scope: ScopeSet,
	) -> (TokenCache, ManualClock) {
		let clock = ManualClock::default();
		let issuer = build_reqwest_test_issuer(descriptor, client_id, client_secret, scope);
		let cache = TokenCache::new(Arc::new(issuer)).with_clock(Arc::new(clock.clone()));

		(cache, clock)
	}

	/// Builds a [`DataClient`] whose token requests and data calls both go through
	/// [`test_reqwest_client`].
	pub fn build_reqwest_test_data_client(
		descriptor: ProviderDescriptor,
		client_id: &str,
		client_secret: &str,
		scope: ScopeSet,
	) -> (DataClient, ManualClock) {
		let (cache, clock) =
			build_reqwest_test_cache(descriptor.clone(), client_id, client_secret, scope);

		(DataClient::new(cache, &descriptor, test_reqwest_client()), clock)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
