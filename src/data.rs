//! Data Management pass-through client.
//!
//! Every call obtains a bearer token from the shared [`TokenCache`] and issues one GET against the
//! Data Management API, returning the upstream JSON:API document. A token failure aborts the call
//! before any data request goes out.

mod document;

pub use document::*;

// crates.io
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{FolderId, HubId, ItemId, ProjectId, TokenSecret, VersionId},
	cache::TokenCache,
	error::{ConfigError, DataApiError, TransportError},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::{ProviderDescriptor, ProviderDescriptorError},
};

/// Client for hub, project, folder, item, and version lookups.
#[derive(Clone, Debug)]
pub struct DataClient {
	cache: TokenCache,
	base: Url,
	http: ReqwestClient,
}
impl DataClient {
	/// Creates a client rooted at the descriptor's Data Management base URL.
	pub fn new(cache: TokenCache, descriptor: &ProviderDescriptor, http: ReqwestClient) -> Self {
		Self { cache, base: descriptor.endpoints.data_api.clone(), http }
	}

	/// Token cache shared with other components.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Lists the hubs visible to the application.
	pub async fn hubs(&self) -> Result<JsonApiDocument> {
		let body = self.fetch("hubs", &["project", "v1", "hubs"], None).await?;

		listing("hubs", body)
	}

	/// Lists the projects of a hub.
	pub async fn projects(&self, hub: &HubId) -> Result<JsonApiDocument> {
		let body = self.fetch("projects", &["project", "v1", "hubs", hub, "projects"], None).await?;

		listing("projects", body)
	}

	/// Lists the top-level folders of a project.
	pub async fn top_folders(&self, hub: &HubId, project: &ProjectId) -> Result<JsonApiDocument> {
		let body = self
			.fetch(
				"top_folders",
				&["project", "v1", "hubs", hub, "projects", project, "folders"],
				None,
			)
			.await?;

		listing("top_folders", body)
	}

	/// Lists the contents of a folder.
	///
	/// When the primary endpoint answers 404, the call is retried once against
	/// `relationships/contents` with the same token; any other failure is returned as is.
	pub async fn folder_contents(
		&self,
		project: &ProjectId,
		folder: &FolderId,
	) -> Result<JsonApiDocument> {
		const OPERATION: &str = "folder_contents";

		let token = self.cache.get_token().await?;
		let primary =
			self.url(&["data", "v1", "projects", project, "folders", folder, "contents"], None)?;
		let body = match self.send(OPERATION, primary, &token).await {
			Err(Error::DataApi(DataApiError::Status { status: 404, .. })) => {
				#[cfg(feature = "tracing")]
				tracing::warn!(
					folder = %folder,
					"Folder contents endpoint returned 404; trying the relationships endpoint."
				);

				let fallback = self.url(
					&[
						"data",
						"v1",
						"projects",
						project,
						"folders",
						folder,
						"relationships",
						"contents",
					],
					None,
				)?;

				self.send(OPERATION, fallback, &token).await?
			},
			other => other?,
		};

		listing(OPERATION, body)
	}

	/// Lists the versions of an item.
	pub async fn item_versions(
		&self,
		project: &ProjectId,
		item: &ItemId,
	) -> Result<JsonApiDocument> {
		let body = self
			.fetch(
				"item_versions",
				&["data", "v1", "projects", project, "items", item, "versions"],
				None,
			)
			.await?;

		listing("item_versions", body)
	}

	/// Fetches one version together with its `derivatives` relationship.
	pub async fn version(
		&self,
		project: &ProjectId,
		version: &VersionId,
	) -> Result<JsonApiDocument> {
		let body = self
			.fetch(
				"version",
				&["data", "v1", "projects", project, "versions", version],
				Some(("include", "derivatives")),
			)
			.await?;

		let document = JsonApiDocument::from_resource(body)
			.map_err(|source| DataApiError::Parse { operation: "version", source })?;

		Ok(document)
	}

	async fn fetch(
		&self,
		operation: &'static str,
		segments: &[&str],
		query: Option<(&str, &str)>,
	) -> Result<Value> {
		let token = self.cache.get_token().await?;
		let url = self.url(segments, query)?;

		self.send(operation, url, &token).await
	}

	async fn send(&self, operation: &'static str, url: Url, token: &TokenSecret) -> Result<Value> {
		const KIND: FlowKind = FlowKind::DataApi;

		let span = FlowSpan::new(KIND, operation);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.request(operation, url, token)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_err) => {
				#[cfg(feature = "tracing")]
				tracing::error!(operation, error = %_err, "Data API call failed.");

				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn request(
		&self,
		operation: &'static str,
		url: Url,
		token: &TokenSecret,
	) -> Result<Value> {
		let response = self
			.http
			.get(url)
			.bearer_auth(token.expose())
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		if !status.is_success() {
			return Err(DataApiError::Status {
				operation,
				status: status.as_u16(),
				message: status.canonical_reason().unwrap_or("Unexpected status").to_owned(),
				details: serde_json::from_slice::<Value>(&bytes).ok(),
			}
			.into());
		}

		let mut de = serde_json::Deserializer::from_slice(&bytes);
		let body = serde_path_to_error::deserialize::<_, Value>(&mut de)
			.map_err(|source| DataApiError::Parse { operation, source })?;

		Ok(body)
	}

	fn url(&self, segments: &[&str], query: Option<(&str, &str)>) -> Result<Url> {
		let mut url = self.base.clone();

		url.path_segments_mut()
			.map_err(|_| {
				ConfigError::from(ProviderDescriptorError::InvalidBaseUrl {
					url: self.base.to_string(),
				})
			})?
			.pop_if_empty()
			.extend(segments);

		if let Some((key, value)) = query {
			url.query_pairs_mut().append_pair(key, value);
		}

		Ok(url)
	}
}

fn listing(operation: &'static str, body: Value) -> Result<JsonApiDocument> {
	let document = JsonApiDocument::from_listing(body)
		.map_err(|source| DataApiError::Parse { operation, source })?;

	Ok(document)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{build_reqwest_test_data_client, test_descriptor},
		auth::ScopeSet,
	};

	fn client(base: &str) -> DataClient {
		let (client, _clock) = build_reqwest_test_data_client(
			test_descriptor(base),
			"id",
			"secret",
			ScopeSet::default(),
		);

		client
	}

	#[test]
	fn identifiers_are_encoded_as_single_segments() {
		let client = client("https://127.0.0.1/gateway");
		let version = VersionId::new("urn:adsk.wipprod:fs.file:vf.abc?version=2")
			.expect("Version fixture should be valid.");
		let url = client
			.url(
				&["data", "v1", "projects", "b.proj", "versions", &version],
				Some(("include", "derivatives")),
			)
			.expect("URL should build.");

		assert_eq!(
			url.as_str(),
			"https://127.0.0.1/gateway/data/v1/projects/b.proj/versions/\
			 urn:adsk.wipprod:fs.file:vf.abc%3Fversion=2?include=derivatives"
		);

		let url = client.url(&["folders", "a/b"], None).expect("URL should build.");

		assert!(url.as_str().ends_with("/folders/a%2Fb"));
	}
}
