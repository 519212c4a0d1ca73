//! Demonstrates a limit-bounded collection search with a literal bearer token against a local
//! stand-in for the CMR search API.
//!
//! The mock reports 120 hits and serves 50 records per page; with a limit of 100 the engine
//! stops after two pages and returns exactly 100 records.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use cmr_broker::{
	cmr::CmrClient,
	config::Settings,
	http::ReqwestTransport,
	search::{ResponseFormat, SearchParams},
};

fn page(offset: usize) -> serde_json::Value {
	let entries: Vec<_> = (offset..offset + 50).map(|i| json!({ "id": format!("C{i}") })).collect();

	json!({ "feed": { "entry": entries } })
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let first = server
		.mock_async(|when, then| {
			when.method(GET).path("/search/collections.json").query_param("page_num", "1");
			then.status(200).header("cmr-hits", "120").json_body(page(0));
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET).path("/search/collections.json").query_param("page_num", "2");
			then.status(200).header("cmr-hits", "120").json_body(page(50));
		})
		.await;
	let settings = Settings::default().with_cmr_host(server.base_url()).with_limit(100);
	let client = CmrClient::builder("DEMO_PROVIDER", "cmr-broker-demo")
		.token("demo-token")
		.settings(settings)
		.transport(Arc::new(ReqwestTransport::default()))
		.build()?;
	let records = client
		.search_collections(SearchParams::new().with("short_name", "MODIS*"), ResponseFormat::Json)
		.await?;

	first.assert_async().await;
	second.assert_async().await;

	println!(
		"Fetched {} collection records (first: {:?}).",
		records.len(),
		records.first().and_then(|record| record.get("id")),
	);

	Ok(())
}
