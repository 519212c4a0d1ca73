mod common;

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use serde_json::json;
// self
use cmr_broker::{
	config::StackLocation,
	error::{Error, ServiceFailure},
	http::{HttpResponse, Method},
	launchpad::{LaunchpadClient, LaunchpadConfig, START_TIME_SKEW_SECS, TokenRecord},
	secret::Secret,
	storage::{MemoryObjectStore, ObjectLocation},
};
use common::{ScriptedTransport, StubResolver, unix_now};

const API: &str = "https://api.launchpad.example.com/icam/api/sm/v1";
const PASSPHRASE: &str = "lp-passphrase";
const CERTIFICATE: &str = "launchpad.pfx";

fn stack() -> StackLocation {
	StackLocation::new("sys-bucket", "my-stack")
}

fn config() -> LaunchpadConfig {
	LaunchpadConfig::new(API, PASSPHRASE, CERTIFICATE)
}

fn store_with_certificate() -> MemoryObjectStore {
	let store = MemoryObjectStore::default();

	store.insert(stack().certificate(CERTIFICATE), b"pkcs12-bytes".to_vec());

	store
}

fn client(transport: Arc<ScriptedTransport>, store: &MemoryObjectStore) -> LaunchpadClient {
	LaunchpadClient::new(transport, Arc::new(store.clone()), stack())
		.with_resolver(StubResolver::new(PASSPHRASE))
}

fn gettoken_response(token: &str) -> HttpResponse {
	HttpResponse::json(
		200,
		&json!({
			"authlevel": 25,
			"cookiename": "SMSESSION",
			"session_idletimeout": 3600,
			"session_maxtimeout": 3600,
			"sm_token": token,
			"status": "success",
		}),
	)
}

fn token_location() -> ObjectLocation {
	ObjectLocation::new("sys-bucket", "my-stack/launchpad/token.json")
}

#[tokio::test]
async fn cache_miss_requests_and_persists_a_token() {
	let transport = ScriptedTransport::new([gettoken_response("fresh-token")]);
	let store = store_with_certificate();
	let before = unix_now();
	let token = client(transport.clone(), &store)
		.get_token(&config())
		.await
		.expect("Token acquisition should succeed.");
	let after = unix_now();

	assert_eq!(token.expose(), "fresh-token");

	let requests = transport.requests();

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].request.method, Method::Get);
	assert_eq!(requests[0].request.url.as_str(), format!("{API}/gettoken"));
	assert!(requests[0].certificate_present);
	assert!(
		!requests[0].certificate_path().expect("A client certificate should be attached.").exists()
	);

	let record: TokenRecord = serde_json::from_slice(
		&store.object(&token_location()).expect("The token record should be persisted."),
	)
	.expect("The token record should be JSON.");

	assert_eq!(record.session_token.expose(), "fresh-token");
	assert_eq!(record.session_maxtimeout, 3600);
	assert!(record.session_starttime >= before - START_TIME_SKEW_SECS - 1);
	assert!(record.session_starttime <= after - START_TIME_SKEW_SECS + 1);
	assert_eq!(record.extra.get("cookiename"), Some(&json!("SMSESSION")));
}

#[tokio::test]
async fn valid_cached_record_skips_the_network() {
	let transport = ScriptedTransport::new([]);
	let store = store_with_certificate();
	let cached = json!({
		"sm_token": "cached-token",
		"session_starttime": unix_now() - 60,
		"session_maxtimeout": 3600,
	});

	store.insert(token_location(), cached.to_string());

	let token = client(transport.clone(), &store)
		.get_token(&config())
		.await
		.expect("Cached token should be returned.");

	assert_eq!(token.expose(), "cached-token");
	assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn stale_record_is_overwritten() {
	let transport = ScriptedTransport::new([gettoken_response("renewed-token")]);
	let store = store_with_certificate();
	let stale = json!({
		"sm_token": "stale-token",
		"session_starttime": unix_now() - 7200,
		"session_maxtimeout": 3600,
	});

	store.insert(token_location(), stale.to_string());

	let lp = client(transport.clone(), &store);
	let token = lp.get_token(&config()).await.expect("Stale token should be renewed.");

	assert_eq!(token.expose(), "renewed-token");
	assert_eq!(transport.calls(), 1);

	let cached = lp.cache().load().await.expect("Cache should load.");

	assert_eq!(cached.as_ref().map(Secret::expose), Some("renewed-token"));
}

#[tokio::test]
async fn missing_certificate_fails_before_any_request() {
	let transport = ScriptedTransport::new([gettoken_response("unused")]);
	let store = MemoryObjectStore::default();
	let err = client(transport.clone(), &store)
		.get_token(&config())
		.await
		.expect_err("A missing certificate should fail.");

	assert!(matches!(
		&err,
		Error::CertificateNotFound { bucket, key }
			if bucket == "sys-bucket" && key == "my-stack/crypto/launchpad.pfx"
	));
	assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn wrong_passphrase_is_a_certificate_error() {
	let transport = ScriptedTransport::new([]);
	let store = store_with_certificate();
	let config = LaunchpadConfig::new(API, "wrong", CERTIFICATE);
	let err = client(transport.clone(), &store)
		.get_token(&config)
		.await
		.expect_err("A wrong passphrase should fail.");

	assert!(matches!(err, Error::Certificate(_)));
	assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn token_service_failure_releases_the_certificate_and_caches_nothing() {
	let transport = ScriptedTransport::new([HttpResponse::new(403, "certificate revoked")]);
	let store = store_with_certificate();
	let err = client(transport.clone(), &store)
		.get_token(&config())
		.await
		.expect_err("A 403 should fail.");

	assert!(matches!(
		&err,
		Error::TokenService(ServiceFailure::Status { status: 403, body, .. })
			if body == "certificate revoked"
	));

	let requests = transport.requests();

	assert!(requests[0].certificate_present);
	assert!(!requests[0].certificate_path().expect("Certificate should be attached.").exists());
	assert!(store.object(&token_location()).is_none());
}

#[tokio::test]
async fn transport_fault_is_a_token_service_error() {
	let transport = ScriptedTransport::new([]);
	let store = store_with_certificate();
	let err = client(transport.clone(), &store)
		.request_token(&config())
		.await
		.expect_err("An exhausted transport should fail.");

	assert!(matches!(err, Error::TokenService(ServiceFailure::Transport(_))));
	assert_eq!(err.status(), None);
}

#[tokio::test]
async fn payload_without_sm_token_is_a_protocol_error() {
	let transport = ScriptedTransport::new([HttpResponse::json(
		200,
		&json!({ "status": "success", "session_maxtimeout": 3600 }),
	)]);
	let store = store_with_certificate();
	let err = client(transport, &store)
		.get_token(&config())
		.await
		.expect_err("A payload without sm_token should fail.");

	assert!(matches!(err, Error::Protocol { .. }));
	assert!(err.to_string().contains("sm_token"));
}

#[tokio::test]
async fn request_token_leaves_the_cache_alone() {
	let transport = ScriptedTransport::new([gettoken_response("direct-token")]);
	let store = store_with_certificate();
	let record = client(transport, &store)
		.request_token(&config())
		.await
		.expect("Direct request should succeed.");

	assert_eq!(record.session_token.expose(), "direct-token");
	assert!(store.object(&token_location()).is_none());
}

#[tokio::test]
async fn validate_posts_the_token_as_json() {
	let transport =
		ScriptedTransport::new([HttpResponse::json(200, &json!({ "status": "success" }))]);
	let store = store_with_certificate();
	let payload = client(transport.clone(), &store)
		.validate_token(&config(), &Secret::new("to-validate"))
		.await
		.expect("Validation should succeed.");

	assert_eq!(payload, json!({ "status": "success" }));

	let requests = transport.requests();

	assert_eq!(requests[0].request.method, Method::Post);
	assert_eq!(requests[0].request.url.as_str(), format!("{API}/validate"));
	assert_eq!(requests[0].request.json, Some(json!({ "token": "to-validate" })));
	assert!(requests[0].certificate_present);
}

#[tokio::test]
async fn concurrent_callers_share_one_token_request() {
	let transport = ScriptedTransport::delayed(
		[gettoken_response("shared-token")],
		StdDuration::from_millis(50),
	);
	let store = store_with_certificate();
	let lp = client(transport.clone(), &store);
	let config = config();
	let (first, second) = tokio::join!(lp.get_token(&config), lp.get_token(&config));

	assert_eq!(first.expect("First caller should succeed.").expose(), "shared-token");
	assert_eq!(second.expect("Second caller should succeed.").expose(), "shared-token");
	assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn stored_pkcs12_bundle_is_resolved_with_the_default_resolver() {
	let transport = ScriptedTransport::new([gettoken_response("pki-token")]);
	let store = MemoryObjectStore::default();

	store.insert(
		stack().certificate(CERTIFICATE),
		include_bytes!("fixtures/client_chain.p12").to_vec(),
	);

	let token = LaunchpadClient::new(transport.clone(), Arc::new(store.clone()), stack())
		.get_token(&LaunchpadConfig::new(API, "lp-fixture", CERTIFICATE))
		.await
		.expect("Token acquisition with a real bundle should succeed.");

	assert_eq!(token.expose(), "pki-token");

	let requests = transport.requests();

	assert!(requests[0].certificate_present);
	assert!(
		!requests[0].certificate_path().expect("A client certificate should be attached.").exists()
	);
}
