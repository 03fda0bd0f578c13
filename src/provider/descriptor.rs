//! Provider descriptor data structures shared by the issuer and the Data Management client.
//!
//! The module exposes validated metadata and supporting builder utilities so a provider can be
//! described in a transport-agnostic way.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// Path of the two-legged token endpoint relative to the provider base URL.
pub const TOKEN_ENDPOINT_PATH: &str = "authentication/v2/token";

/// Client authentication modes for token endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
}
impl FromStr for ClientAuthMethod {
	type Err = ProviderDescriptorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"client_secret_basic" => Ok(Self::ClientSecretBasic),
			"client_secret_post" => Ok(Self::ClientSecretPost),
			other => Err(ProviderDescriptorError::UnknownClientAuthMethod { value: other.into() }),
		}
	}
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Token endpoint used for client-credentials exchanges.
	pub token: Url,
	/// Base URL of the Data Management API; always ends with `/`.
	pub data_api: Url,
}

/// Immutable provider descriptor consumed by the issuer and the data client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Preferred client authentication mechanism.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}
}
