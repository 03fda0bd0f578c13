// crates.io
use serde_json::Value;
// self
use crate::_prelude::*;

type ParseError = serde_path_to_error::Error<serde_json::Error>;

/// JSON:API document returned by the Data Management API.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonApiDocument {
	/// Primary data: an array for listings, an object for single resources.
	pub data: Value,
	/// Related resources requested through `include`.
	#[serde(default)]
	pub included: Vec<Value>,
}
impl JsonApiDocument {
	/// Reads a listing; a missing or null `data` becomes an empty array.
	pub fn from_listing(body: Value) -> Result<Self, ParseError> {
		let raw = RawDocument::parse(body)?;

		Ok(Self {
			data: raw.data.unwrap_or_else(|| Value::Array(Vec::new())),
			included: raw.included.unwrap_or_default(),
		})
	}

	/// Reads a single resource; the whole body stands in for a missing or null `data`.
	pub fn from_resource(body: Value) -> Result<Self, ParseError> {
		let raw = RawDocument::parse(body.clone())?;

		Ok(Self { data: raw.data.unwrap_or(body), included: raw.included.unwrap_or_default() })
	}

	/// Number of primary resources (1 for a single object).
	pub fn len(&self) -> usize {
		match &self.data {
			Value::Array(items) => items.len(),
			Value::Null => 0,
			_ => 1,
		}
	}

	/// Returns `true` when the document carries no primary resource.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(Deserialize)]
struct RawDocument {
	#[serde(default)]
	data: Option<Value>,
	#[serde(default)]
	included: Option<Vec<Value>>,
}
impl RawDocument {
	fn parse(body: Value) -> Result<Self, ParseError> {
		serde_path_to_error::deserialize(body)
	}
}

/// Response body handed to browser clients by a hub browser backend.
///
/// Successes carry the document; failures carry the error message and the upstream error body,
/// with [`status`](Self::status) telling the router which HTTP status to answer with.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataEnvelope {
	/// Successful pass-through.
	Success {
		/// Always `true`.
		success: bool,
		/// Primary data.
		data: Value,
		/// Included resources.
		included: Vec<Value>,
	},
	/// Failed call.
	Failure {
		/// Always `false`.
		success: bool,
		/// Human-readable failure message.
		error: String,
		/// Upstream error body, or `null`.
		details: Value,
		/// Status to answer with: the upstream status, or 500.
		#[serde(skip)]
		status: u16,
	},
}
impl DataEnvelope {
	/// Wraps a successful document.
	pub fn success(document: JsonApiDocument) -> Self {
		Self::Success { success: true, data: document.data, included: document.included }
	}

	/// Wraps a failure, mirroring the upstream status when one is known.
	///
	/// `details` holds the upstream JSON error body, whether it came from the Data Management API
	/// or from the token endpoint.
	pub fn failure(error: &Error) -> Self {
		Self::Failure {
			success: false,
			error: error.to_string(),
			details: error.details().cloned().unwrap_or(Value::Null),
			status: error.upstream_status().unwrap_or(500),
		}
	}

	/// HTTP status a router should answer with.
	pub fn status(&self) -> u16 {
		match self {
			Self::Success { .. } => 200,
			Self::Failure { status, .. } => *status,
		}
	}
}
impl From<Result<JsonApiDocument>> for DataEnvelope {
	fn from(result: Result<JsonApiDocument>) -> Self {
		match result {
			Ok(document) => Self::success(document),
			Err(err) => Self::failure(&err),
		}
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::error::DataApiError;

	#[test]
	fn listing_defaults_missing_members() {
		let document =
			JsonApiDocument::from_listing(json!({ "jsonapi": { "version": "1.0" } }))
				.expect("Listing without data should parse.");

		assert_eq!(document.data, json!([]));
		assert!(document.included.is_empty());
		assert!(document.is_empty());

		let document = JsonApiDocument::from_listing(json!({ "data": null, "included": null }))
			.expect("Listing with null members should parse.");

		assert_eq!(document.data, json!([]));
	}

	#[test]
	fn resource_falls_back_to_whole_body() {
		let body = json!({ "type": "versions", "id": "urn:v1" });
		let document =
			JsonApiDocument::from_resource(body.clone()).expect("Bare resource should parse.");

		assert_eq!(document.data, body);
		assert_eq!(document.len(), 1);

		let document = JsonApiDocument::from_resource(json!({
			"data": { "id": "urn:v1" },
			"included": [{ "type": "derivatives", "id": "dXJu" }]
		}))
		.expect("Wrapped resource should parse.");

		assert_eq!(document.data, json!({ "id": "urn:v1" }));
		assert_eq!(document.included.len(), 1);
	}

	#[test]
	fn malformed_included_reports_its_path() {
		let err = JsonApiDocument::from_listing(json!({ "data": [], "included": "oops" }))
			.expect_err("Non-array included must be rejected.");

		assert_eq!(err.path().to_string(), "included");
	}

	#[test]
	fn envelopes_serialize_like_the_browser_expects() {
		let ok = DataEnvelope::success(JsonApiDocument { data: json!([1]), included: Vec::new() });

		assert_eq!(ok.status(), 200);
		assert_eq!(
			serde_json::to_value(&ok).expect("Success envelope should serialize."),
			json!({ "success": true, "data": [1], "included": [] })
		);

		let err: Error = DataApiError::Status {
			operation: "hubs",
			status: 403,
			message: "Forbidden".into(),
			details: Some(json!({ "errors": [{ "code": "403" }] })),
		}
		.into();
		let failed = DataEnvelope::from(Err::<JsonApiDocument, _>(err));
		let body = serde_json::to_value(&failed).expect("Failure envelope should serialize.");

		assert_eq!(failed.status(), 403);
		assert_eq!(body["success"], json!(false));
		assert_eq!(body["details"], json!({ "errors": [{ "code": "403" }] }));
		assert!(body.get("status").is_none());
	}

	#[test]
	fn envelope_carries_token_endpoint_details() {
		let body = json!({ "developerMessage": "Client disabled", "errorCode": "AUTH-001" });
		let rejected = Error::InvalidClient {
			reason: "client rejected".into(),
			status: Some(401),
			details: Some(body.clone()),
		};
		let err: Error = crate::error::AcquisitionError::new(rejected).into();
		let failed = DataEnvelope::failure(&err);

		assert_eq!(failed.status(), 401);
		assert_eq!(
			serde_json::to_value(&failed).expect("Failure envelope should serialize.")["details"],
			body
		);
	}

	#[test]
	fn envelope_without_upstream_status_uses_500() {
		let err: Error = crate::error::ConfigError::MissingClientCredentials.into();
		let failed = DataEnvelope::failure(&err);

		assert_eq!(failed.status(), 500);
		assert_eq!(
			serde_json::to_value(&failed).expect("Failure envelope should serialize.")["details"],
			Value::Null
		);
	}
}
