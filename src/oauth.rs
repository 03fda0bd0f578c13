//! Internal OAuth client facade abstractions.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{ScopeSet, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	issuer::IssuedToken,
	provider::{
		ClientAuthMethod, ProviderDescriptor, ProviderErrorContext, ProviderErrorKind,
		ProviderStrategy,
	},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeTokenResponse = oauth2::basic::BasicTokenResponse;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		strategy: &dyn ProviderStrategy,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(strategy, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => map_generic_transport_error(meta, message),
			_ => map_unknown_transport_error(meta),
		}
	}
}

pub(crate) trait OAuth2Facade {
	fn exchange_client_credentials<'a, 'strategy, 'params>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		scope: &'a ScopeSet,
		extra_params: &'params [(String, String)],
		default_ttl: Duration,
	) -> FacadeFuture<'a, IssuedToken>
	where
		'strategy: 'a,
		'params: 'a;
}

pub(crate) struct BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	scope_delimiter: char,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client_id: &str,
		client_secret: &TokenSecret,
		http_client: Arc<C>,
		error_mapper: Arc<M>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let mut oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_token_uri(token_url);

		if matches!(descriptor.preferred_client_auth_method, ClientAuthMethod::ClientSecretPost) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			oauth_client,
			scope_delimiter: descriptor.quirks.scope_delimiter,
			http_client,
			error_mapper,
		})
	}
}
impl<C, M> OAuth2Facade for BasicFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn exchange_client_credentials<'a, 'strategy, 'params>(
		&'a self,
		strategy: &'strategy dyn ProviderStrategy,
		scope: &'a ScopeSet,
		extra_params: &'params [(String, String)],
		default_ttl: Duration,
	) -> FacadeFuture<'a, IssuedToken>
	where
		'strategy: 'a,
		'params: 'a,
	{
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let mut request = self.oauth_client.exchange_client_credentials();

			// oauth2 joins scopes with spaces; pre-joining keeps custom delimiters intact.
			if let Some(joined) = scope.joined(self.scope_delimiter) {
				request = request.add_scope(Scope::new(joined));
			}
			for (key, value) in extra_params {
				request = request.add_extra_param(key, value);
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(strategy, meta.take(), err, self.error_mapper.as_ref())
			})?;

			map_token_response(response, default_ttl)
		})
	}
}

fn map_token_response(response: FacadeTokenResponse, default_ttl: Duration) -> Result<IssuedToken> {
	let ttl = match response.expires_in() {
		Some(expires_in) => {
			let secs = i64::try_from(expires_in.as_secs())
				.map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			if secs <= 0 {
				return Err(ConfigError::NonPositiveExpiresIn.into());
			}

			Duration::seconds(secs)
		},
		None => default_ttl,
	};

	Ok(IssuedToken::new(response.access_token().secret().to_owned(), ttl))
}

fn map_request_error<E, M>(
	strategy: &dyn ProviderStrategy,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(strategy, meta_ref, error),
		RequestTokenError::Parse(error, body) => match meta_status(meta_ref) {
			Some(status) if status >= 400 =>
				map_unstructured_error(strategy, status, &body, meta_ref),
			status => TransientError::TokenResponseParse { source: error, status }.into(),
		},
		// oauth2 reports an empty error body this way.
		RequestTokenError::Other(message) => match meta_status(meta_ref) {
			Some(status) if status >= 400 =>
				map_unstructured_error(strategy, status, &[], meta_ref),
			status => TransientError::TokenEndpoint {
				message: format!("Token endpoint returned an unexpected response: {message}."),
				status,
				retry_after: meta_retry_after(meta_ref),
				details: None,
			}
			.into(),
		},
	}
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx = ProviderErrorContext::new().with_oauth_error(response.error().as_ref());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.as_str());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}
	if let Ok(details) = serde_json::to_value(&response) {
		ctx = ctx.with_details(details);
	}

	let message =
		format!("Token endpoint returned an OAuth error: {}.", ctx.summary().unwrap_or_default());

	classified_error(strategy, ctx, message, meta)
}

fn map_unstructured_error(
	strategy: &dyn ProviderStrategy,
	status: u16,
	body: &[u8],
	meta: Option<&ResponseMetadata>,
) -> Error {
	let ctx = ProviderErrorContext::new().with_http_status(status).with_body(body);
	let message = match (ctx.summary(), ctx.body_preview.as_deref()) {
		(Some(summary), _) => format!("Token endpoint returned HTTP {status}: {summary}"),
		(None, Some(body)) if !body.is_empty() =>
			format!("Token endpoint returned HTTP {status} with body `{body}`"),
		_ => format!("Token endpoint returned HTTP {status}"),
	};

	classified_error(strategy, ctx, message, meta)
}

fn classified_error(
	strategy: &dyn ProviderStrategy,
	ctx: ProviderErrorContext,
	message: String,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let kind = strategy.classify_token_error(&ctx);
	let status = meta_status(meta).or(ctx.http_status);
	let details = ctx.details;

	match kind {
		ProviderErrorKind::InvalidGrant => Error::InvalidGrant { reason: message, status, details },
		ProviderErrorKind::InvalidClient =>
			Error::InvalidClient { reason: message, status, details },
		ProviderErrorKind::InsufficientScope =>
			Error::InsufficientScope { reason: message, status, details },
		ProviderErrorKind::Transient => TransientError::TokenEndpoint {
			message,
			status,
			retry_after: meta_retry_after(meta),
			details,
		}
		.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	strategy: &dyn ProviderStrategy,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	// Strategy reserved for future use.
	let _ = strategy;

	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "Request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
			details: None,
		}
		.into();
	}

	TransportError::from(err).into()
}

#[cfg(feature = "reqwest")]
fn map_generic_transport_error(meta: Option<&ResponseMetadata>, message: impl Display) -> Error {
	TransientError::TokenEndpoint {
		message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
		details: None,
	}
	.into()
}

#[cfg(feature = "reqwest")]
fn map_unknown_transport_error(meta: Option<&ResponseMetadata>) -> Error {
	TransientError::TokenEndpoint {
		message: "HTTP client error occurred while calling the token endpoint".into(),
		status: meta_status(meta),
		retry_after: meta_retry_after(meta),
		details: None,
	}
	.into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
