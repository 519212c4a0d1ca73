//! Earthdata Login (EDL) user-token management.
//!
//! Tokens are JWTs; only the payload's `exp` claim matters here, so payloads are decoded without
//! verifying signatures. Nothing is cached locally: every call talks to EDL.

// std
use std::time::Duration as StdDuration;
// crates.io
use tracing::debug;
// self
use crate::{
	_prelude::*,
	config::{CmrEnvironment, Settings},
	error::{ConfigError, ServiceFailure},
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, OperationKind},
};

/// Decodes the claims of a JWT without checking its signature.
///
/// Returns `None` when the header or payload segment is malformed or the payload is not a JSON
/// object.
pub fn decode_claims(token: &str) -> Option<serde_json::Map<String, JsonValue>> {
	jsonwebtoken::dangerous::insecure_decode::<serde_json::Map<String, JsonValue>>(token)
		.map(|data| data.claims)
		.ok()
}

/// Returns the integer `exp` claim of a JWT, if any.
pub fn token_expiration(token: &str) -> Option<i64> {
	decode_claims(token)?.get("exp")?.as_i64()
}

/// A token is expired when it cannot be decoded, lacks an integer `exp`, or `exp <= now`.
pub fn is_token_expired(token: &str, now: OffsetDateTime) -> bool {
	token_expiration(token).is_none_or(|exp| exp <= now.unix_timestamp())
}

/// Picks the non-expired `access_token` with the latest `exp` from an EDL token listing.
pub fn latest_token(tokens: &[JsonValue], now: OffsetDateTime) -> Option<Secret> {
	tokens
		.iter()
		.filter_map(|entry| entry.get("access_token")?.as_str())
		.filter_map(|token| {
			token_expiration(token)
				.filter(|exp| *exp > now.unix_timestamp())
				.map(|exp| (exp, token))
		})
		.max_by_key(|(exp, _)| *exp)
		.map(|(_, token)| Secret::new(token))
}

/// Earthdata Login client for one environment.
#[derive(Clone)]
pub struct EarthdataLogin {
	transport: Arc<dyn HttpTransport>,
	base: Url,
	timeout: StdDuration,
}
impl EarthdataLogin {
	/// Targets the EDL host of `environment`.
	pub fn new(transport: Arc<dyn HttpTransport>, environment: CmrEnvironment) -> Result<Self> {
		Self::from_settings(transport, &Settings::default().with_environment(environment))
	}

	/// Targets the EDL host and timeout carried by `settings`.
	pub fn from_settings(transport: Arc<dyn HttpTransport>, settings: &Settings) -> Result<Self> {
		Ok(Self { transport, base: settings.earthdata_base()?, timeout: settings.timeout })
	}

	/// Overrides the EDL base URL.
	pub fn with_base_url(mut self, base: Url) -> Self {
		self.base = base;

		self
	}

	/// Overrides the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// EDL base URL in use.
	pub fn base_url(&self) -> &Url {
		&self.base
	}

	/// Lists the user's tokens and returns the valid one that expires last.
	pub async fn retrieve_token(
		&self,
		username: &str,
		password: &Secret,
	) -> Result<Option<Secret>> {
		obs::observe(OperationKind::EarthdataRetrieve, "retrieve_token", async move {
			let request = HttpRequest::get(self.endpoint("api/users/tokens")?);
			let response = self.send(request, username, password).await?;
			let tokens = response
				.json_body::<Vec<JsonValue>>()
				.map_err(|e| Error::unexpected(e.inner()))?;
			let token = latest_token(&tokens, OffsetDateTime::now_utc());

			debug!(listed = tokens.len(), found = token.is_some(), "Retrieved EDL tokens.");

			Ok(token)
		})
		.await
	}

	/// Creates a new token; `None` when EDL answers with an empty body.
	pub async fn create_token(
		&self,
		username: &str,
		password: &Secret,
	) -> Result<Option<Secret>> {
		obs::observe(OperationKind::EarthdataCreate, "create_token", async move {
			let request = HttpRequest::post(self.endpoint("api/users/token")?);
			let response = self.send(request, username, password).await?;

			if response.is_empty() {
				return Ok(None);
			}

			let body =
				response.json_body::<JsonValue>().map_err(|e| Error::unexpected(e.inner()))?;

			match &body {
				JsonValue::Null => Ok(None),
				JsonValue::Object(fields) if fields.is_empty() => Ok(None),
				JsonValue::String(value) if value.is_empty() => Ok(None),
				_ => body
					.get("access_token")
					.and_then(JsonValue::as_str)
					.map(|token| Some(Secret::new(token)))
					.ok_or_else(|| Error::unexpected("EDL token response lacks `access_token`")),
			}
		})
		.await
	}

	/// Revokes `token`.
	pub async fn revoke_token(
		&self,
		username: &str,
		password: &Secret,
		token: &Secret,
	) -> Result<()> {
		obs::observe(OperationKind::EarthdataRevoke, "revoke_token", async move {
			let request = HttpRequest::post(self.endpoint("api/users/revoke_token")?)
				.query("token", token.expose());

			self.send(request, username, password).await?;

			Ok(())
		})
		.await
	}

	/// Returns an existing valid token, creating one when none survives.
	pub async fn get_token(&self, username: &str, password: &Secret) -> Result<Option<Secret>> {
		match self.retrieve_token(username, password).await? {
			Some(token) => Ok(Some(token)),
			None => self.create_token(username, password).await,
		}
	}

	fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		ConfigError::parse_url(&format!("{}/{path}", self.base.as_str().trim_end_matches('/')))
	}

	async fn send(
		&self,
		request: HttpRequest,
		username: &str,
		password: &Secret,
	) -> Result<HttpResponse> {
		let request = request.basic_auth(username, password.clone()).timeout(self.timeout);
		let response = self.transport.execute(request).await.map_err(Error::unexpected)?;

		if !response.is_success() {
			return Err(Error::LoginService(ServiceFailure::from_response(&response)));
		}

		Ok(response)
	}
}
impl Debug for EarthdataLogin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EarthdataLogin")
			.field("base", &self.base.as_str())
			.field("timeout", &self.timeout)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use jsonwebtoken::{EncodingKey, Header};
	// self
	use super::*;

	fn mint(claims: JsonValue) -> String {
		jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"edl-test"))
			.expect("Test JWT should encode.")
	}

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("Timestamp should be valid.")
	}

	#[test]
	fn decode_claims_reads_payload_without_verifying() {
		let token = mint(serde_json::json!({ "exp": 1_700_000_100, "uid": "edl-user" }));
		let claims = decode_claims(&token).expect("Claims should decode.");

		assert_eq!(claims.get("uid"), Some(&JsonValue::from("edl-user")));
		assert_eq!(token_expiration(&token), Some(1_700_000_100));
		assert!(decode_claims("not-a-jwt").is_none());
		assert!(decode_claims("a.!!!.c").is_none());

		let header = token.split('.').next().expect("Minted JWT should have a header.");

		// Payload segment is base64url for `not-json`.
		assert!(decode_claims(&format!("{header}.bm90LWpzb24.sig")).is_none());
	}

	#[test]
	fn expiry_rules_treat_undecodable_tokens_as_expired() {
		let live = mint(serde_json::json!({ "exp": 1_700_000_001 }));
		let boundary = mint(serde_json::json!({ "exp": 1_700_000_000 }));
		let no_exp = mint(serde_json::json!({ "uid": "edl-user" }));
		let text_exp = mint(serde_json::json!({ "exp": "tomorrow" }));

		assert!(!is_token_expired(&live, now()));
		assert!(is_token_expired(&boundary, now()));
		assert!(is_token_expired(&no_exp, now()));
		assert!(is_token_expired(&text_exp, now()));
		assert!(is_token_expired("garbage", now()));
	}

	#[test]
	fn latest_token_prefers_the_latest_expiry() {
		let early = mint(serde_json::json!({ "exp": 1_700_000_100 }));
		let late = mint(serde_json::json!({ "exp": 1_700_000_200 }));
		let unbounded = mint(serde_json::json!({ "uid": "edl-user" }));
		let tokens = vec![
			serde_json::json!({ "access_token": early, "token_type": "Bearer" }),
			serde_json::json!({ "access_token": late.clone() }),
			serde_json::json!({ "access_token": unbounded }),
			serde_json::json!({ "token_type": "Bearer" }),
		];
		let picked = latest_token(&tokens, now()).expect("A valid token should be picked.");

		assert_eq!(picked.expose(), late);
		assert!(latest_token(&tokens[2..], now()).is_none());
	}
}
