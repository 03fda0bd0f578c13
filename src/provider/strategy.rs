//! Token endpoint error classification and request decoration.
//!
//! The issuer turns every failed token exchange into a [`ProviderErrorContext`] and asks the
//! configured [`ProviderStrategy`] which [`ProviderErrorKind`] it belongs to. The context
//! understands both RFC 6749 error bodies (`error`, `error_description`) and the APS gateway
//! shape (`developerMessage`, `errorCode`), and keeps the decoded JSON body so callers can
//! forward it untouched.

// std
use std::collections::BTreeMap;
// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

/// Hooks a provider can override to decorate token requests and classify failures.
pub trait ProviderStrategy: Send + Sync {
	/// Picks the error category for a failed token request.
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind;

	/// Adds provider-specific form fields to the client-credentials request.
	///
	/// Entries already present in the request (`grant_type`, `scope`, client credentials) are
	/// not overwritten.
	fn augment_token_request(&self, _form: &mut BTreeMap<String, String>) {}
}

/// Error categories a strategy can assign to a failed token request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderErrorKind {
	/// Provider rejected the grant (e.g. a disabled application).
	InvalidGrant,
	/// Client authentication failed.
	InvalidClient,
	/// Requested scopes exceed what the client may obtain.
	InsufficientScope,
	/// Failure is temporary and should be retried.
	Transient,
}

/// Everything known about a failed token request, independent of the HTTP client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderErrorContext {
	/// HTTP status returned by the token endpoint.
	pub http_status: Option<u16>,
	/// RFC 6749 `error` code.
	pub oauth_error: Option<String>,
	/// RFC 6749 `error_description`.
	pub error_description: Option<String>,
	/// APS gateway `errorCode` (e.g. `AUTH-001`).
	pub error_code: Option<String>,
	/// APS gateway `developerMessage`.
	pub developer_message: Option<String>,
	/// Leading part of a raw response body.
	pub body_preview: Option<String>,
	/// Response body when it decoded as JSON.
	pub details: Option<Value>,
	/// Failure happened below HTTP (DNS, TCP, TLS, timeout).
	pub network_error: bool,
}
impl ProviderErrorContext {
	/// Characters kept by [`with_body`](Self::with_body) before the preview is cut.
	pub const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates an empty context.
	pub fn new() -> Self {
		Self::default()
	}

	/// Context for a failure that never produced an HTTP response.
	pub fn network_failure() -> Self {
		Self { network_error: true, ..Self::default() }
	}

	/// Records the HTTP status.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Records an RFC 6749 `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Records an RFC 6749 `error_description`.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Records the decoded error body without reading any field from it.
	pub fn with_details(mut self, details: Value) -> Self {
		self.details = Some(details);

		self
	}

	/// Records a raw response body.
	///
	/// Keeps a preview of the text and, when the body is a JSON object, the decoded document
	/// plus any recognised `error`, `error_description`, `errorCode` and `developerMessage`
	/// fields. Fields set earlier win over the body.
	pub fn with_body(mut self, body: &[u8]) -> Self {
		let text = String::from_utf8_lossy(body);

		self.body_preview = Some(preview(text.trim()));

		let Ok(document @ Value::Object(_)) = serde_json::from_slice::<Value>(body) else {
			return self;
		};

		if let Ok(fields) = ErrorBody::deserialize(&document) {
			self.oauth_error = self.oauth_error.or(fields.error);
			self.error_description = self.error_description.or(fields.error_description);
			self.error_code = self.error_code.or(fields.error_code);
			self.developer_message = self.developer_message.or(fields.developer_message);
		}

		self.details = Some(document);

		self
	}

	/// Most descriptive human-readable text the provider supplied.
	pub fn summary(&self) -> Option<&str> {
		[&self.developer_message, &self.error_description, &self.oauth_error, &self.error_code]
			.into_iter()
			.find_map(|field| field.as_deref().filter(|text| !text.is_empty()))
	}
}

/// Classification used for the APS token endpoint.
///
/// Order of precedence:
/// 1. network failures, HTTP 429 and 5xx are transient;
/// 2. a recognised RFC 6749 `error` code;
/// 3. an APS `AUTH-*` gateway code, read against the status (403 means missing scopes, anything
///    else a rejected client);
/// 4. keywords in the provider's message or the raw body;
/// 5. the status alone.
#[derive(Debug, Default)]
pub struct DefaultProviderStrategy;
impl Display for DefaultProviderStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("aps-token-strategy")
	}
}
impl ProviderStrategy for DefaultProviderStrategy {
	fn classify_token_error(&self, ctx: &ProviderErrorContext) -> ProviderErrorKind {
		if ctx.network_error || matches!(ctx.http_status, Some(429 | 500..)) {
			return ProviderErrorKind::Transient;
		}

		ctx.oauth_error
			.as_deref()
			.and_then(|code| {
				lookup(OAUTH_ERROR_CODES, code, |text, needle| text.eq_ignore_ascii_case(needle))
			})
			.or_else(|| gateway_kind(ctx))
			.or_else(|| hinted_kind(ctx))
			.unwrap_or_else(|| status_kind(ctx.http_status))
	}
}

const OAUTH_ERROR_CODES: &[(&str, ProviderErrorKind)] = &[
	("invalid_client", ProviderErrorKind::InvalidClient),
	("unauthorized_client", ProviderErrorKind::InvalidClient),
	("invalid_grant", ProviderErrorKind::InvalidGrant),
	("access_denied", ProviderErrorKind::InvalidGrant),
	("unsupported_grant_type", ProviderErrorKind::InvalidGrant),
	("invalid_scope", ProviderErrorKind::InsufficientScope),
	("insufficient_scope", ProviderErrorKind::InsufficientScope),
	("server_error", ProviderErrorKind::Transient),
	("temporarily_unavailable", ProviderErrorKind::Transient),
];
// Matched against lowercased text, first hit wins.
const MESSAGE_HINTS: &[(&str, ProviderErrorKind)] = &[
	("scope", ProviderErrorKind::InsufficientScope),
	("invalid_client", ProviderErrorKind::InvalidClient),
	("client_id", ProviderErrorKind::InvalidClient),
	("client id", ProviderErrorKind::InvalidClient),
	("client secret", ProviderErrorKind::InvalidClient),
	("invalid_grant", ProviderErrorKind::InvalidGrant),
	("temporarily_unavailable", ProviderErrorKind::Transient),
];

#[derive(Deserialize)]
struct ErrorBody {
	error: Option<String>,
	error_description: Option<String>,
	#[serde(rename = "errorCode")]
	error_code: Option<String>,
	#[serde(rename = "developerMessage")]
	developer_message: Option<String>,
}

fn lookup(
	table: &[(&str, ProviderErrorKind)],
	text: &str,
	matches: impl Fn(&str, &str) -> bool,
) -> Option<ProviderErrorKind> {
	table.iter().find(|(needle, _)| matches(text, *needle)).map(|(_, kind)| *kind)
}

fn gateway_kind(ctx: &ProviderErrorContext) -> Option<ProviderErrorKind> {
	let code = ctx.error_code.as_deref()?;

	if !code.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("AUTH-")) {
		return None;
	}

	Some(match ctx.http_status {
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::InvalidClient,
	})
}

fn hinted_kind(ctx: &ProviderErrorContext) -> Option<ProviderErrorKind> {
	[ctx.summary(), ctx.body_preview.as_deref()].into_iter().flatten().find_map(|text| {
		lookup(MESSAGE_HINTS, &text.to_ascii_lowercase(), |text, needle| text.contains(needle))
	})
}

fn status_kind(status: Option<u16>) -> ProviderErrorKind {
	match status {
		Some(400 | 404 | 410) => ProviderErrorKind::InvalidGrant,
		Some(401) => ProviderErrorKind::InvalidClient,
		Some(403) => ProviderErrorKind::InsufficientScope,
		_ => ProviderErrorKind::Transient,
	}
}

fn preview(text: &str) -> String {
	match text.char_indices().nth(ProviderErrorContext::BODY_PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}…", &text[..cut]),
		None => text.to_owned(),
	}
}
