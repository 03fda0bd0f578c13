//! Token endpoint transport.
//!
//! The issuer never talks to an HTTP stack directly. It asks a [`TokenHttpClient`] for an
//! [`AsyncHttpClient`] handle bound to a fresh [`ResponseMetadataSlot`], lets `oauth2` drive the
//! exchange through that handle, and reads the slot back when the exchange fails so the error
//! carries the upstream status and `Retry-After` hint.

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
#[cfg(feature = "reqwest")]
use reqwest::{
	header::{HeaderValue, RETRY_AFTER},
	redirect::Policy,
};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::_prelude::*;

/// HTTP stack used for token requests.
///
/// Implementations are shared by every acquisition of an issuer, so they must be
/// `Send + Sync + 'static`. Each call to [`with_metadata`](Self::with_metadata) returns an owned
/// handle whose request futures are `Send`.
pub trait TokenHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Error produced by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Per-request handle handed to `oauth2`.
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Returns a handle that reports every response it receives to `slot`.
	///
	/// The handle clears the slot before sending and stores the status and `Retry-After` hint
	/// as soon as response headers arrive, whether or not the status is a success.
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Status and retry hint of the last token endpoint response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// `Retry-After` converted to a relative duration.
	pub retry_after: Option<Duration>,
}

/// Cell shared by one token request and the error mapping that follows it.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Replaces the recorded metadata.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Removes and returns the recorded metadata.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// reqwest-backed [`TokenHttpClient`].
///
/// Token responses are never redirected; clients passed to [`with_client`](Self::with_client)
/// should be built with [`Policy::none`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Uses an existing reqwest client as is.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that gives up after `timeout` and does not follow redirects.
	///
	/// A timed-out request surfaces as an ordinary acquisition failure.
	pub fn with_timeout(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).redirect(Policy::none()).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl TokenHttpClient for ReqwestHttpClient {
	type Handle = ReqwestHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		ReqwestHandle { client: self.0.clone(), slot }
	}
}

/// Handle returned by [`ReqwestHttpClient::with_metadata`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHandle {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for ReqwestHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let request: reqwest::Request = request.try_into().map_err(Box::new)?;
			let response = self.client.execute(request).await.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().clone();

			self.slot.store(ResponseMetadata {
				status: Some(status.as_u16()),
				retry_after: headers
					.get(RETRY_AFTER)
					.and_then(|value| retry_after(value, OffsetDateTime::now_utc())),
			});

			let body = response.bytes().await.map_err(Box::new)?;
			let mut converted = HttpResponse::new(body.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}

// Delta-seconds or an HTTP date; dates in the past yield nothing.
#[cfg(feature = "reqwest")]
fn retry_after(value: &HeaderValue, now: OffsetDateTime) -> Option<Duration> {
	let raw = value.to_str().ok()?.trim();

	match raw.parse::<u32>() {
		Ok(secs) => Some(Duration::seconds(secs.into())),
		Err(_) => OffsetDateTime::parse(raw, &Rfc2822)
			.ok()
			.map(|moment| moment - now)
			.filter(|delta| delta.is_positive()),
	}
}
