//! OAuth 2.0 client-credentials issuer.
//!
//! Each [`acquire`](TokenIssuer::acquire) call performs one form-encoded POST to the
//! descriptor's token endpoint (`grant_type=client_credentials` plus the configured scopes) and
//! converts the response into an [`IssuedToken`]. Caching and single-flight coordination are the
//! cache's job; this type never remembers a previous token.

// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::ConfigError,
	http::TokenHttpClient,
	issuer::{IssuedToken, IssuerFuture, TokenIssuer},
	oauth::{BasicFacade, OAuth2Facade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{ProviderDescriptor, ProviderStrategy},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Issuer specialized for the crate's default reqwest transport stack.
pub type ReqwestClientCredentialsIssuer =
	ClientCredentialsIssuer<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Issues access tokens through the client-credentials grant.
pub struct ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Provider descriptor that defines the token endpoint and quirks.
	pub descriptor: ProviderDescriptor,
	/// Strategy responsible for provider-specific request adjustments and error mapping.
	pub strategy: Arc<dyn ProviderStrategy>,
	client_id: String,
	scope: ScopeSet,
	default_ttl: Duration,
	facade: BasicFacade<C, M>,
}
impl<C, M> ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Lifetime assumed when the token endpoint omits `expires_in`.
	pub const DEFAULT_TOKEN_TTL: Duration = Duration::seconds(3_600);

	/// Creates an issuer that reuses the caller-provided transport + mapper pair.
	///
	/// Fails with [`ConfigError::MissingClientCredentials`] when either credential is blank, so a
	/// misconfigured deployment is rejected before any network call.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let client_id = client_id.into();
		let client_secret = TokenSecret::new(client_secret);

		if client_id.trim().is_empty() || client_secret.is_blank() {
			return Err(ConfigError::MissingClientCredentials.into());
		}

		let facade = BasicFacade::from_descriptor(
			&descriptor,
			&client_id,
			&client_secret,
			http_client.into(),
			mapper.into(),
		)?;

		Ok(Self {
			descriptor,
			strategy,
			client_id,
			scope: ScopeSet::default_scopes(),
			default_ttl: Self::DEFAULT_TOKEN_TTL,
			facade,
		})
	}

	/// Replaces the requested scope set (defaults to [`ScopeSet::default_scopes`]).
	pub fn with_scope(mut self, scope: ScopeSet) -> Self {
		self.scope = scope;

		self
	}

	/// Overrides the lifetime assumed when the response has no `expires_in`.
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = ttl;

		self
	}

	/// Client identifier presented to the token endpoint.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// Scopes requested on every acquisition.
	pub fn scope(&self) -> &ScopeSet {
		&self.scope
	}

	async fn exchange(&self) -> Result<IssuedToken> {
		let mut form = BTreeMap::new();

		self.strategy.augment_token_request(&mut form);

		let extra_params = form
			.into_iter()
			.filter(|(key, _)| key != "grant_type" && key != "scope")
			.collect::<Vec<(String, String)>>();

		self.facade
			.exchange_client_credentials(
				self.strategy.as_ref(),
				&self.scope,
				extra_params.as_slice(),
				self.default_ttl,
			)
			.await
	}
}
#[cfg(feature = "reqwest")]
impl ClientCredentialsIssuer<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an issuer backed by a default reqwest transport.
	pub fn new(
		descriptor: ProviderDescriptor,
		strategy: Arc<dyn ProviderStrategy>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Result<Self> {
		Self::with_http_client(
			descriptor,
			strategy,
			client_id,
			client_secret,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> TokenIssuer for ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn acquire(&self) -> IssuerFuture<'_> {
		const KIND: FlowKind = FlowKind::TokenAcquisition;

		Box::pin(async move {
			let span = FlowSpan::new(KIND, "client_credentials");

			obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

			let result = span.instrument(self.exchange()).await;

			match &result {
				Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
				Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
			}

			result
		})
	}
}
impl<C, M> Debug for ClientCredentialsIssuer<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientCredentialsIssuer")
			.field("descriptor", &self.descriptor)
			.field("client_id", &self.client_id)
			.field("scope", &self.scope)
			.field("default_ttl", &self.default_ttl)
			.finish()
	}
}
