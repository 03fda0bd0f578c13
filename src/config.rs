//! Application settings and component wiring.
//!
//! [`Settings`] can be deserialized from any serde format (missing fields take their defaults) or
//! read from `APS_*` environment variables with [`Settings::from_env`]. [`Settings::build`] turns
//! them into a ready-to-use issuer, cache, and Data Management client.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
};
#[cfg(feature = "reqwest")]
use crate::{
	auth::ProviderId,
	cache::TokenCache,
	data::DataClient,
	http::ReqwestHttpClient,
	issuer::ReqwestClientCredentialsIssuer,
	oauth::ReqwestTransportErrorMapper,
	provider::{DefaultProviderStrategy, ProviderDescriptor},
};

/// Public Autodesk Platform Services host.
pub const DEFAULT_BASE_URL: &str = "https://developer.api.autodesk.com";

/// Settings for the token cache and the Data Management client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	/// OAuth client identifier (`APS_CLIENT_ID`).
	pub client_id: String,
	/// OAuth client secret (`APS_CLIENT_SECRET`); read but never written back out.
	#[serde(skip_serializing)]
	pub client_secret: TokenSecret,
	/// Base URL deriving the token endpoint and the Data Management root (`APS_BASE_URL`).
	pub base_url: String,
	/// Scopes requested on every acquisition (`APS_SCOPES`, whitespace separated).
	pub scopes: ScopeSet,
	/// Early-expiry buffer in seconds (`APS_TOKEN_SAFETY_MARGIN_SECS`).
	pub token_safety_margin_secs: u64,
	/// Upstream request timeout in seconds (`APS_REQUEST_TIMEOUT_SECS`).
	pub request_timeout_secs: u64,
	/// Lifetime assumed when the token endpoint omits `expires_in` (`APS_DEFAULT_TOKEN_TTL_SECS`).
	pub default_token_ttl_secs: u64,
}
impl Settings {
	/// Reads settings from the process environment.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads settings through an arbitrary key lookup; unset or blank keys keep their defaults.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
		let mut settings = Self::default();

		if let Some(value) = lookup("APS_CLIENT_ID") {
			settings.client_id = value.trim().to_owned();
		}
		if let Some(value) = lookup("APS_CLIENT_SECRET") {
			settings.client_secret = TokenSecret::new(value.trim());
		}
		if let Some(value) = lookup("APS_BASE_URL") {
			settings.base_url = value.trim().to_owned();
		}
		if let Some(value) = lookup("APS_SCOPES") {
			settings.scopes = value
				.parse()
				.map_err(|_| ConfigError::InvalidSetting { key: "APS_SCOPES", value })?;
		}
		if let Some(value) = lookup("APS_TOKEN_SAFETY_MARGIN_SECS") {
			settings.token_safety_margin_secs = parse_secs("APS_TOKEN_SAFETY_MARGIN_SECS", value)?;
		}
		if let Some(value) = lookup("APS_REQUEST_TIMEOUT_SECS") {
			settings.request_timeout_secs = parse_secs("APS_REQUEST_TIMEOUT_SECS", value)?;
		}
		if let Some(value) = lookup("APS_DEFAULT_TOKEN_TTL_SECS") {
			settings.default_token_ttl_secs = parse_secs("APS_DEFAULT_TOKEN_TTL_SECS", value)?;
		}

		Ok(settings)
	}

	/// Parses [`base_url`](Self::base_url).
	pub fn base_url(&self) -> Result<Url> {
		Url::parse(self.base_url.trim()).map_err(|_| {
			ConfigError::InvalidSetting { key: "APS_BASE_URL", value: self.base_url.clone() }.into()
		})
	}

	/// Safety margin as a [`Duration`].
	pub fn token_safety_margin(&self) -> Result<Duration> {
		secs_to_duration("APS_TOKEN_SAFETY_MARGIN_SECS", self.token_safety_margin_secs)
	}

	/// Default token lifetime as a [`Duration`]; must be positive.
	pub fn default_token_ttl(&self) -> Result<Duration> {
		positive("APS_DEFAULT_TOKEN_TTL_SECS", self.default_token_ttl_secs)?;

		secs_to_duration("APS_DEFAULT_TOKEN_TTL_SECS", self.default_token_ttl_secs)
	}

	/// Upstream request timeout; must be positive.
	pub fn request_timeout(&self) -> Result<std::time::Duration> {
		positive("APS_REQUEST_TIMEOUT_SECS", self.request_timeout_secs)?;

		Ok(std::time::Duration::from_secs(self.request_timeout_secs))
	}

	/// Assembles the issuer, the shared cache, and the Data Management client.
	///
	/// Both HTTP clients give up after [`request_timeout`](Self::request_timeout). Fails before
	/// any network call when the credentials are missing or a setting is invalid.
	#[cfg(feature = "reqwest")]
	pub fn build(&self) -> Result<Components> {
		let timeout = self.request_timeout()?;
		let data_http =
			ReqwestClient::builder().timeout(timeout).build().map_err(ConfigError::from)?;

		self.build_with_clients(ReqwestHttpClient::with_timeout(timeout)?, data_http)
	}

	/// Like [`build`](Self::build), with caller-supplied HTTP clients.
	///
	/// `token_http` should not follow redirects; neither client gets the configured timeout
	/// applied.
	#[cfg(feature = "reqwest")]
	pub fn build_with_clients(
		&self,
		token_http: ReqwestHttpClient,
		data_http: ReqwestClient,
	) -> Result<Components> {
		let base = self.base_url()?;
		let provider_id = ProviderId::new("aps").map_err(ConfigError::from)?;
		let descriptor = ProviderDescriptor::builder(provider_id)
			.base_url(&base)
			.and_then(|builder| builder.build())
			.map_err(ConfigError::from)?;
		let issuer = ReqwestClientCredentialsIssuer::with_http_client(
			descriptor.clone(),
			Arc::new(DefaultProviderStrategy),
			self.client_id.as_str(),
			self.client_secret.expose(),
			token_http,
			Arc::new(ReqwestTransportErrorMapper),
		)?
		.with_scope(self.scopes.clone())
		.with_default_ttl(self.default_token_ttl()?);
		let issuer = Arc::new(issuer);
		let cache =
			TokenCache::new(issuer.clone()).with_safety_margin(self.token_safety_margin()?);
		let data = DataClient::new(cache.clone(), &descriptor, data_http);

		#[cfg(feature = "tracing")]
		tracing::info!(
			token_endpoint = %descriptor.endpoints.token,
			scopes = %self.scopes,
			"Token cache configured."
		);

		Ok(Components { descriptor, issuer, cache, data })
	}
}
impl Default for Settings {
	fn default() -> Self {
		Self {
			client_id: String::new(),
			client_secret: TokenSecret::default(),
			base_url: DEFAULT_BASE_URL.into(),
			scopes: ScopeSet::default_scopes(),
			token_safety_margin_secs: 60,
			request_timeout_secs: 30,
			default_token_ttl_secs: 3_600,
		}
	}
}

/// Everything [`Settings::build`] wires together.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct Components {
	/// Descriptor derived from the base URL.
	pub descriptor: ProviderDescriptor,
	/// Client-credentials issuer behind the cache.
	pub issuer: Arc<ReqwestClientCredentialsIssuer>,
	/// Process-wide token cache.
	pub cache: TokenCache,
	/// Data Management client sharing [`cache`](Self::cache).
	pub data: DataClient,
}

fn parse_secs(key: &'static str, value: String) -> Result<u64> {
	match value.trim().parse() {
		Ok(secs) => Ok(secs),
		Err(_) => Err(ConfigError::InvalidSetting { key, value }.into()),
	}
}

fn positive(key: &'static str, secs: u64) -> Result<()> {
	if secs == 0 {
		return Err(ConfigError::InvalidSetting { key, value: secs.to_string() }.into());
	}

	Ok(())
}

fn secs_to_duration(key: &'static str, secs: u64) -> Result<Duration> {
	let secs = i64::try_from(secs)
		.map_err(|_| ConfigError::InvalidSetting { key, value: secs.to_string() })?;

	Ok(Duration::seconds(secs))
}
