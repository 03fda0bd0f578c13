//! Walks a hub browser backend through settings, the shared token cache, and Data Management
//! lookups against a local mock of the platform.
//!
//! Several concurrent hub listings start together yet trigger a single token request, and the
//! final folder lookup shows the `relationships/contents` fallback plus the response envelope a
//! web handler would return.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use aps_broker::{
	auth::{FolderId, HubId, ProjectId},
	config::Settings,
	data::DataEnvelope,
	http::ReqwestHttpClient,
	reqwest::{Client, redirect::Policy},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/authentication/v2/token")
				.form_urlencoded_tuple("grant_type", "client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.delay(std::time::Duration::from_millis(100))
				.json_body(json!({
					"access_token": "demo-access",
					"token_type": "Bearer",
					"expires_in": 3_599
				}));
		})
		.await;
	let _hubs = server
		.mock_async(|when, then| {
			when.method(GET).path("/project/v1/hubs").header("authorization", "Bearer demo-access");
			then.status(200).json_body(json!({
				"data": [{ "type": "hubs", "id": "b.demo-hub", "attributes": { "name": "Demo" } }]
			}));
		})
		.await;
	let _contents = server
		.mock_async(|when, then| {
			when.method(GET).path("/data/v1/projects/b.demo-project/folders/urn:demo/contents");
			then.status(404).json_body(json!({ "errors": [{ "status": "404" }] }));
		})
		.await;
	let _relationships = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/data/v1/projects/b.demo-project/folders/urn:demo/relationships/contents");
			then.status(200).json_body(json!({ "data": [{ "type": "items", "id": "urn:item" }] }));
		})
		.await;
	let base_url = server.base_url();
	let settings = Settings::from_lookup(|key| match key {
		"APS_CLIENT_ID" => Some("demo-client".into()),
		"APS_CLIENT_SECRET" => Some("demo-secret".into()),
		"APS_BASE_URL" => Some(base_url.clone()),
		_ => None,
	})?;
	let timeout = settings.request_timeout()?;
	// The mock serves a self-signed certificate.
	let mock_client = || {
		Client::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.timeout(timeout)
	};
	let token_http =
		ReqwestHttpClient::with_client(mock_client().redirect(Policy::none()).build()?);
	let components = settings.build_with_clients(token_http, mock_client().build()?)?;
	let data = components.data;
	let (a, b, c) = tokio::join!(data.hubs(), data.hubs(), data.hubs());

	for listing in [a?, b?, c?] {
		println!("Hub listing returned {} hub(s).", listing.len());
	}

	token_mock.assert_calls_async(1).await;
	println!("Cache state after the burst: {:?}.", components.cache.state());

	let hub = HubId::new("b.demo-hub")?;
	let project = ProjectId::new("b.demo-project")?;
	let folder = FolderId::new("urn:demo")?;
	let envelope = DataEnvelope::from(data.folder_contents(&project, &folder).await);

	println!("Folder response ({}): {}.", envelope.status(), serde_json::to_string(&envelope)?);

	let envelope = DataEnvelope::from(data.projects(&hub).await);

	println!(
		"Unmocked project listing ({}): {}.",
		envelope.status(),
		serde_json::to_string(&envelope)?
	);

	Ok(())
}
