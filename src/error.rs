//! Crate-level error types shared by the cache, issuers, and the Data Management client.

// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; fails before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token acquisition failed; every caller that joined the attempt sees the same failure.
	#[error(transparent)]
	Acquisition(#[from] AcquisitionError),
	/// Data Management API returned an error or an unreadable document.
	#[error(transparent)]
	DataApi(#[from] DataApiError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Requested scopes exceed what the client is allowed to obtain.
	#[error("Token lacks the required scopes: {reason}.")]
	InsufficientScope {
		/// Provider- or crate-supplied reason string.
		reason: String,
		/// HTTP status returned by the token endpoint, when available.
		status: Option<u16>,
		/// Token endpoint error body when it was valid JSON.
		details: Option<Value>,
	},
	/// Provider rejected the grant.
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or crate-supplied reason string.
		reason: String,
		/// HTTP status returned by the token endpoint, when available.
		status: Option<u16>,
		/// Token endpoint error body when it was valid JSON.
		details: Option<Value>,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or crate-supplied reason string.
		reason: String,
		/// HTTP status returned by the token endpoint, when available.
		status: Option<u16>,
		/// Token endpoint error body when it was valid JSON.
		details: Option<Value>,
	},
	/// The issuer panicked while acquiring a token; the attempt was abandoned.
	#[error("Token issuer panicked: {message}.")]
	IssuerPanicked {
		/// Panic payload rendered as text.
		message: String,
	},
}
impl Error {
	/// HTTP status reported by the upstream service that caused this error, if any.
	///
	/// Routers use it to mirror upstream failures; callers fall back to 500 when it is absent.
	pub fn upstream_status(&self) -> Option<u16> {
		match self {
			Self::Acquisition(err) => err.inner().upstream_status(),
			Self::DataApi(DataApiError::Status { status, .. }) => Some(*status),
			Self::Transient(TransientError::TokenEndpoint { status, .. })
			| Self::Transient(TransientError::TokenResponseParse { status, .. })
			| Self::InsufficientScope { status, .. }
			| Self::InvalidGrant { status, .. }
			| Self::InvalidClient { status, .. } => *status,
			_ => None,
		}
	}

	/// Upstream JSON error body behind this error, from either the token endpoint or the Data
	/// Management API.
	pub fn details(&self) -> Option<&Value> {
		match self {
			Self::Acquisition(err) => err.inner().details(),
			Self::DataApi(err) => err.details(),
			Self::Transient(TransientError::TokenEndpoint { details, .. })
			| Self::InsufficientScope { details, .. }
			| Self::InvalidGrant { details, .. }
			| Self::InvalidClient { details, .. } => details.as_ref(),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// A configured URL cannot be parsed or joined.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Client identifier or secret is absent.
	#[error("Client identifier and client secret must both be configured.")]
	MissingClientCredentials,
	/// A setting holds a value that cannot be interpreted.
	#[error("Setting `{key}` has an invalid value: {value}.")]
	InvalidSetting {
		/// Setting name (environment variable or field).
		key: &'static str,
		/// Offending raw value.
		value: String,
	},
	/// Request scopes cannot be normalized.
	#[error("Requested scopes are invalid.")]
	InvalidScope(#[from] crate::auth::ScopeValidationError),
	/// Resource identifier failed validation.
	#[error("Resource identifier is invalid.")]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Shared failure of a single token acquisition attempt.
///
/// Every caller that joined the attempt receives a clone pointing at the same underlying
/// [`Error`], available through [`inner`](Self::inner) or [`StdError::source`].
#[derive(Clone, Debug, ThisError)]
#[error("Token acquisition failed: {0}")]
pub struct AcquisitionError(#[source] Arc<Error>);
impl AcquisitionError {
	/// Wraps the issuer's failure so it can be shared between joined callers.
	pub fn new(error: Error) -> Self {
		Self(Arc::new(error))
	}

	/// Returns the underlying failure reported by the issuer.
	pub fn inner(&self) -> &Error {
		&self.0
	}

	/// Returns `true` when both values come from the same acquisition attempt.
	pub fn same_attempt(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Upstream error body when it was valid JSON.
		details: Option<Value>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling an upstream endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Data Management API failures.
#[derive(Debug, ThisError)]
pub enum DataApiError {
	/// Upstream answered with a non-success status.
	#[error("Data API call `{operation}` failed with HTTP {status}: {message}.")]
	Status {
		/// Logical operation label (e.g. `hubs`, `folder_contents`).
		operation: &'static str,
		/// HTTP status returned upstream.
		status: u16,
		/// Short description of the failure.
		message: String,
		/// Upstream error body when it was valid JSON.
		details: Option<Value>,
	},
	/// Upstream answered with a body that is not a JSON document.
	#[error("Data API call `{operation}` returned malformed JSON.")]
	Parse {
		/// Logical operation label.
		operation: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
	},
}
impl DataApiError {
	/// Upstream error body, when one was captured.
	pub fn details(&self) -> Option<&Value> {
		match self {
			Self::Status { details, .. } => details.as_ref(),
			Self::Parse { .. } => None,
		}
	}
}
