//! Launchpad PKI token acquisition with an object-store-backed cache.
//!
//! [`LaunchpadClient::get_token`] returns the cached session token while it is valid. On a miss
//! it fetches the PKCS#12 bundle from `{stackName}/crypto/{certificate}`, resolves it into a
//! temporary PEM client certificate, calls `GET {api}/gettoken` over mutual TLS, stamps the
//! record with `now - 300s`, and persists it. Concurrent callers on one client share a
//! single-flight guard and re-check the cache after acquiring it.

pub mod cache;

pub use cache::{START_TIME_SKEW_SECS, TokenCache, TokenRecord};

// std
use std::time::Duration as StdDuration;
// crates.io
use tracing::debug;
// self
use crate::{
	_prelude::*,
	certificate::{CertificateResolver, ClientCertificate, Pkcs12Resolver},
	config::{DEFAULT_TIMEOUT, StackLocation},
	error::{ConfigError, ServiceFailure},
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, OperationKind},
	storage::{ObjectStore, StoreError},
};

/// Per-call Launchpad settings.
#[derive(Clone, Debug)]
pub struct LaunchpadConfig {
	/// Token service base URL (for example `https://api.launchpad.nasa.gov/icam/api/sm/v1`).
	pub api: String,
	/// Passphrase protecting the PKCS#12 bundle.
	pub passphrase: Secret,
	/// File name of the bundle under `{stackName}/crypto/`.
	pub certificate: String,
}
impl LaunchpadConfig {
	/// Builds a config.
	pub fn new(
		api: impl Into<String>,
		passphrase: impl Into<Secret>,
		certificate: impl Into<String>,
	) -> Self {
		Self { api: api.into(), passphrase: passphrase.into(), certificate: certificate.into() }
	}

	fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		ConfigError::parse_url(&format!("{}/{path}", self.api.trim_end_matches('/')))
	}
}

#[derive(Deserialize)]
struct GetTokenPayload {
	sm_token: Secret,
	session_maxtimeout: i64,
	#[serde(flatten)]
	extra: serde_json::Map<String, JsonValue>,
}

/// Launchpad token service client bound to one stack.
pub struct LaunchpadClient {
	transport: Arc<dyn HttpTransport>,
	store: Arc<dyn ObjectStore>,
	resolver: Arc<dyn CertificateResolver>,
	stack: StackLocation,
	cache: TokenCache,
	timeout: StdDuration,
	flight: AsyncMutex<()>,
}
impl LaunchpadClient {
	/// Builds a client using the pure-Rust PKCS#12 resolver and the default timeout.
	pub fn new(
		transport: Arc<dyn HttpTransport>,
		store: Arc<dyn ObjectStore>,
		stack: StackLocation,
	) -> Self {
		let cache = TokenCache::new(store.clone(), &stack);

		Self {
			transport,
			store,
			resolver: Arc::new(Pkcs12Resolver),
			stack,
			cache,
			timeout: DEFAULT_TIMEOUT,
			flight: AsyncMutex::new(()),
		}
	}

	/// Replaces the certificate resolver.
	pub fn with_resolver(mut self, resolver: Arc<dyn CertificateResolver>) -> Self {
		self.resolver = resolver;

		self
	}

	/// Replaces the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Token cache used by [`LaunchpadClient::get_token`].
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Returns a valid session token, from the cache when possible.
	pub async fn get_token(&self, config: &LaunchpadConfig) -> Result<Secret> {
		obs::observe(OperationKind::LaunchpadToken, "get_token", async move {
			if let Some(token) = self.cache.load().await? {
				debug!("Reusing cached Launchpad token.");

				return Ok(token);
			}

			let _singleflight = self.flight.lock().await;

			if let Some(token) = self.cache.load().await? {
				debug!("Reusing Launchpad token stored by a concurrent caller.");

				return Ok(token);
			}

			let record = self.request_token(config).await?;

			self.cache.store(&record).await?;

			Ok(record.session_token)
		})
		.await
	}

	/// Calls `GET {api}/gettoken` without consulting or updating the cache.
	pub async fn request_token(&self, config: &LaunchpadConfig) -> Result<TokenRecord> {
		let url = config.endpoint("gettoken")?;
		let certificate = self.client_certificate(config).await?;

		debug!(url = %url, "Requesting a Launchpad token.");

		let request = HttpRequest::get(url).client_certificate(&certificate).timeout(self.timeout);
		let response = self.exchange(request, certificate).await?;
		let payload: GetTokenPayload = response.json_body().map_err(|e| {
			Error::protocol(format!(
				"Launchpad gettoken payload is invalid at `{}`: {}",
				e.path(),
				e.inner()
			))
		})?;
		let mut extra = payload.extra;

		extra.remove("session_starttime");

		Ok(TokenRecord::acquired_at(
			payload.sm_token,
			payload.session_maxtimeout,
			extra,
			OffsetDateTime::now_utc(),
		))
	}

	/// Calls `POST {api}/validate` with `{"token": token}` and returns the raw payload.
	pub async fn validate_token(
		&self,
		config: &LaunchpadConfig,
		token: &Secret,
	) -> Result<JsonValue> {
		obs::observe(OperationKind::LaunchpadValidate, "validate_token", async move {
			let url = config.endpoint("validate")?;
			let certificate = self.client_certificate(config).await?;

			debug!(url = %url, "Validating a Launchpad token.");

			let request = HttpRequest::post(url)
				.json(serde_json::json!({ "token": token.expose() }))
				.client_certificate(&certificate)
				.timeout(self.timeout);
			let response = self.exchange(request, certificate).await?;

			response.json_body::<JsonValue>().map_err(|e| {
				Error::protocol(format!("Launchpad validate payload is not JSON: {}", e.inner()))
			})
		})
		.await
	}

	/// Reads the PKCS#12 bundle stored at `{stackName}/crypto/{name}`.
	pub async fn retrieve_certificate(&self, name: &str) -> Result<Vec<u8>> {
		let location = self.stack.certificate(name);
		let not_found = || Error::CertificateNotFound {
			bucket: location.bucket.clone(),
			key: location.key.clone(),
		};

		if !self.store.exists(&location).await? {
			return Err(not_found());
		}

		match self.store.get(&location).await {
			Ok(bundle) => Ok(bundle),
			Err(StoreError::NotFound { .. }) => Err(not_found()),
			Err(e) => Err(e.into()),
		}
	}

	async fn client_certificate(&self, config: &LaunchpadConfig) -> Result<ClientCertificate> {
		let bundle = self.retrieve_certificate(&config.certificate).await?;

		Ok(self.resolver.resolve(&bundle, &config.passphrase)?)
	}

	// Consumes the certificate so its PEM file is removed as soon as the exchange settles.
	async fn exchange(
		&self,
		request: HttpRequest,
		certificate: ClientCertificate,
	) -> Result<HttpResponse> {
		let outcome = self.transport.execute(request).await;

		drop(certificate);

		let response = outcome.map_err(|e| Error::TokenService(e.into()))?;

		if !response.is_success() {
			return Err(Error::TokenService(ServiceFailure::from_response(&response)));
		}

		Ok(response)
	}
}
impl Debug for LaunchpadClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LaunchpadClient")
			.field("stack", &self.stack)
			.field("timeout", &self.timeout)
			.finish()
	}
}
