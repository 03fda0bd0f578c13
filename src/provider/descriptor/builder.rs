// std
use std::net::IpAddr;
// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderEndpoints, ProviderQuirks,
		TOKEN_ENDPOINT_PATH,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Data API base URL is mandatory.
	#[error("Missing data API endpoint.")]
	MissingDataEndpoint,
	/// Base URL cannot carry the derived endpoints.
	#[error("Base URL cannot be used to derive endpoints: {url}.")]
	InvalidBaseUrl {
		/// Base URL that failed validation.
		url: String,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
	/// Client authentication label is not recognized.
	#[error("Unknown client authentication method: {value}.")]
	UnknownClientAuthMethod {
		/// Raw label that failed to parse.
		value: String,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ProviderId,
	/// Token endpoint used for client-credentials exchanges.
	pub token_endpoint: Option<Url>,
	/// Base URL of the Data Management API.
	pub data_endpoint: Option<Url>,
	/// Preferred client authentication method for the token endpoint.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			token_endpoint: None,
			data_endpoint: None,
			preferred_client_auth_method: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Derives both endpoints from a single base URL.
	///
	/// The token endpoint becomes `{base}/authentication/v2/token` and the Data Management API
	/// is rooted at `{base}/`.
	pub fn base_url(mut self, base: &Url) -> Result<Self, ProviderDescriptorError> {
		let base = with_trailing_slash(base)?;
		let token = base
			.join(TOKEN_ENDPOINT_PATH)
			.map_err(|_| ProviderDescriptorError::InvalidBaseUrl { url: base.to_string() })?;

		self.token_endpoint = Some(token);
		self.data_endpoint = Some(base);

		Ok(self)
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the Data Management base URL.
	pub fn data_endpoint(mut self, url: Url) -> Self {
		self.data_endpoint = Some(url);

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let data_api = self.data_endpoint.ok_or(ProviderDescriptorError::MissingDataEndpoint)?;
		let data_api = with_trailing_slash(&data_api)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { token, data_api },
			preferred_client_auth_method: self.preferred_client_auth_method,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("data", &self.endpoints.data_api)?;
		validate_scope_delimiter(self.quirks.scope_delimiter)?;

		Ok(())
	}
}

fn with_trailing_slash(url: &Url) -> Result<Url, ProviderDescriptorError> {
	if url.cannot_be_a_base() {
		return Err(ProviderDescriptorError::InvalidBaseUrl { url: url.to_string() });
	}
	if url.path().ends_with('/') {
		return Ok(url.clone());
	}

	let mut normalized = url.clone();
	let path = format!("{}/", url.path());

	normalized.set_path(&path);

	Ok(normalized)
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ =>
			Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host_str() {
		Some("localhost") => true,
		Some(host) => host
			.trim_start_matches('[')
			.trim_end_matches(']')
			.parse::<IpAddr>()
			.map(|ip| ip.is_loopback())
			.unwrap_or(false),
		None => false,
	}
}

fn validate_scope_delimiter(delimiter: char) -> Result<(), ProviderDescriptorError> {
	if delimiter.is_control() {
		Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn id() -> ProviderId {
		ProviderId::new("aps").expect("Provider identifier fixture should be valid.")
	}

	#[test]
	fn base_url_derives_token_and_data_endpoints() {
		let base = Url::parse("https://developer.api.autodesk.com")
			.expect("Base URL fixture should parse.");
		let descriptor = ProviderDescriptor::builder(id())
			.base_url(&base)
			.expect("Base URL should be accepted.")
			.build()
			.expect("Descriptor should build from a base URL.");

		assert_eq!(
			descriptor.endpoints.token.as_str(),
			"https://developer.api.autodesk.com/authentication/v2/token"
		);
		assert_eq!(descriptor.endpoints.data_api.as_str(), "https://developer.api.autodesk.com/");
	}

	#[test]
	fn base_url_keeps_path_prefixes() {
		let base = Url::parse("https://gateway.example.com/aps").expect("Base URL should parse.");
		let descriptor = ProviderDescriptor::builder(id())
			.base_url(&base)
			.expect("Prefixed base URL should be accepted.")
			.build()
			.expect("Descriptor should build from a prefixed base URL.");

		assert_eq!(
			descriptor.endpoints.token.as_str(),
			"https://gateway.example.com/aps/authentication/v2/token"
		);
		assert_eq!(descriptor.endpoints.data_api.as_str(), "https://gateway.example.com/aps/");
	}

	#[test]
	fn loopback_http_is_allowed_but_remote_http_is_not() {
		let local = Url::parse("http://127.0.0.1:8080").expect("Loopback URL should parse.");

		ProviderDescriptor::builder(id())
			.base_url(&local)
			.expect("Loopback base URL should be accepted.")
			.build()
			.expect("Loopback HTTP endpoints should validate.");

		let remote = Url::parse("http://example.com").expect("Remote URL should parse.");
		let err = ProviderDescriptor::builder(id())
			.base_url(&remote)
			.expect("Remote base URL should derive endpoints.")
			.build()
			.expect_err("Remote HTTP endpoints must be rejected.");

		assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));
	}

	#[test]
	fn missing_endpoints_are_reported() {
		let err = ProviderDescriptor::builder(id())
			.build()
			.expect_err("Descriptor without endpoints must be rejected.");

		assert_eq!(err, ProviderDescriptorError::MissingTokenEndpoint);

		let err = ProviderDescriptor::builder(id())
			.token_endpoint(Url::parse("https://example.com/token").expect("URL should parse."))
			.build()
			.expect_err("Descriptor without data endpoint must be rejected.");

		assert_eq!(err, ProviderDescriptorError::MissingDataEndpoint);
	}
}
