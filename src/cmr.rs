//! Catalog client: provider identity, one credential source, and search helpers.
//!
//! A [`CmrClient`] resolves a bearer token once per logical request (literal token, Earthdata
//! Login, or Launchpad PKI), turns it into read headers, and threads them through
//! [`search::search_concept`]. The write half of the catalog API is declared by
//! [`CatalogIngest`] and reports [`Error::NotSupported`] for every operation.

// self
use crate::{
	_prelude::*,
	certificate::CertificateResolver,
	config::{CredentialSettings, Settings},
	earthdata::EarthdataLogin,
	error::ConfigError,
	http::HttpTransport,
	launchpad::{LaunchpadClient, LaunchpadConfig},
	search::{self, ConceptType, ResponseFormat, SearchOptions, SearchParams},
	secrets::SecretStore,
	storage::ObjectStore,
};

/// Header carrying the CMR client id.
pub const CLIENT_ID_HEADER: &str = "Client-Id";
/// Header carrying the bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Boxed future returned by [`CatalogIngest`] operations.
pub type IngestFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// OAuth provider backing a client's credentials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
	/// Earthdata Login.
	#[default]
	Earthdata,
	/// Launchpad PKI token service.
	Launchpad,
}
impl OAuthProvider {
	/// Returns the configuration label.
	pub const fn as_str(self) -> &'static str {
		match self {
			OAuthProvider::Earthdata => "earthdata",
			OAuthProvider::Launchpad => "launchpad",
		}
	}
}
impl Display for OAuthProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for OAuthProvider {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"earthdata" => Ok(Self::Earthdata),
			"launchpad" => Ok(Self::Launchpad),
			_ => Err(ConfigError::InvalidValue {
				name: crate::config::vars::CMR_OAUTH_PROVIDER,
				value: s.to_owned(),
				reason: "expected earthdata or launchpad".into(),
			}),
		}
	}
}

/// Earthdata Login username + password source.
#[derive(Clone, Debug, Default)]
pub struct EarthdataCredentials {
	/// EDL username.
	pub username: Option<String>,
	/// Literal password; ignored when a secret name is set.
	pub password: Option<Secret>,
	/// Secret holding the password.
	pub password_secret_name: Option<String>,
}

/// Launchpad PKI source.
#[derive(Clone, Debug, Default)]
pub struct LaunchpadCredentials {
	/// Token service base URL.
	pub api: String,
	/// Literal passphrase; ignored when a secret name is set.
	pub passphrase: Option<Secret>,
	/// Secret holding the passphrase.
	pub passphrase_secret_name: Option<String>,
	/// Certificate file name under `{stackName}/crypto/`.
	pub certificate: String,
}

/// Exactly one credential source.
#[derive(Clone, Debug)]
pub enum Credentials {
	/// Literal bearer token, used as is.
	Token(Secret),
	/// Earthdata Login.
	Earthdata(EarthdataCredentials),
	/// Launchpad PKI.
	Launchpad(LaunchpadCredentials),
}

/// Write contract of the catalog API; every operation is declared but unsupported.
pub trait CatalogIngest
where
	Self: Send + Sync,
{
	/// Headers for `PUT`/`POST`/`DELETE` requests.
	fn write_headers(
		&self,
		_token: Option<&Secret>,
		_ummg_version: Option<&str>,
		_revision_id: Option<&str>,
	) -> Result<BTreeMap<String, String>> {
		Err(Error::NotSupported { operation: "write_headers" })
	}

	/// Adds a collection record from its XML document.
	fn ingest_collection<'a>(&'a self, _xml: &'a str) -> IngestFuture<'a, JsonValue> {
		not_supported("ingest_collection")
	}

	/// Adds a granule record from its XML document.
	fn ingest_granule<'a>(
		&'a self,
		_xml: &'a str,
		_revision_id: Option<&'a str>,
	) -> IngestFuture<'a, JsonValue> {
		not_supported("ingest_granule")
	}

	/// Adds or updates UMM-G JSON metadata.
	fn ingest_umm_granule<'a>(
		&'a self,
		_metadata: &'a JsonValue,
		_revision_id: Option<&'a str>,
	) -> IngestFuture<'a, JsonValue> {
		not_supported("ingest_umm_granule")
	}

	/// Deletes a collection record.
	fn delete_collection<'a>(&'a self, _dataset_id: &'a str) -> IngestFuture<'a, JsonValue> {
		not_supported("delete_collection")
	}

	/// Deletes a granule record.
	fn delete_granule<'a>(&'a self, _granule_ur: &'a str) -> IngestFuture<'a, JsonValue> {
		not_supported("delete_granule")
	}

	/// Validates a collection XML document.
	fn validate_collection<'a>(&'a self, _xml: &'a str) -> IngestFuture<'a, JsonValue> {
		not_supported("validate_collection")
	}

	/// Validates a granule XML document.
	fn validate_granule<'a>(&'a self, _xml: &'a str) -> IngestFuture<'a, JsonValue> {
		not_supported("validate_granule")
	}

	/// Fetches granule metadata behind a concept link.
	fn get_granule_metadata<'a>(
		&'a self,
		_cmr_link: &'a str,
	) -> IngestFuture<'a, Option<JsonValue>> {
		not_supported("get_granule_metadata")
	}
}

fn not_supported<'a, T>(operation: &'static str) -> IngestFuture<'a, T>
where
	T: 'a,
{
	Box::pin(async move { Err(Error::NotSupported { operation }) })
}

/// Client bound to one provider and one credential source.
pub struct CmrClient {
	provider: String,
	client_id: String,
	oauth_provider: OAuthProvider,
	credentials: Credentials,
	settings: Settings,
	transport: Arc<dyn HttpTransport>,
	secrets: Option<Arc<dyn SecretStore>>,
	earthdata: EarthdataLogin,
	launchpad: Option<LaunchpadClient>,
}
impl CmrClient {
	/// Starts a builder for `provider` / `client_id`.
	pub fn builder(provider: impl Into<String>, client_id: impl Into<String>) -> CmrClientBuilder {
		CmrClientBuilder::new(provider, client_id)
	}

	/// CMR provider id.
	pub fn provider(&self) -> &str {
		&self.provider
	}

	/// CMR client id.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// OAuth provider backing the credentials.
	pub fn oauth_provider(&self) -> OAuthProvider {
		self.oauth_provider
	}

	/// Settings in use.
	pub fn settings(&self) -> &Settings {
		&self.settings
	}

	/// Returns a usable bearer token, if the credential source yields one.
	pub async fn resolve_token(&self) -> Result<Option<Secret>> {
		match &self.credentials {
			Credentials::Token(token) => Ok(Some(token.clone())),
			Credentials::Earthdata(credentials) => {
				let password = self
					.resolve_secret(
						credentials.password.as_ref(),
						credentials.password_secret_name.as_deref(),
						"CMR password",
					)
					.await?;
				let username = credentials
					.username
					.as_deref()
					.filter(|username| !username.is_empty())
					.ok_or_else(|| Error::credential("No CMR username set"))?;

				self.earthdata.get_token(username, &password).await
			},
			Credentials::Launchpad(credentials) => {
				let passphrase = self
					.resolve_secret(
						credentials.passphrase.as_ref(),
						credentials.passphrase_secret_name.as_deref(),
						"Launchpad passphrase",
					)
					.await?;
				let launchpad = self
					.launchpad
					.as_ref()
					.ok_or_else(|| Error::credential("Launchpad client is not configured"))?;
				let config = LaunchpadConfig {
					api: credentials.api.clone(),
					passphrase,
					certificate: credentials.certificate.clone(),
				};

				launchpad.get_token(&config).await.map(Some)
			},
		}
	}

	/// Headers for `GET` requests: `Client-Id`, plus `Authorization` when a token is given.
	pub fn read_headers(&self, token: Option<&Secret>) -> BTreeMap<String, String> {
		let mut headers = BTreeMap::from([(CLIENT_ID_HEADER.to_owned(), self.client_id.clone())]);

		if let Some(token) = token.filter(|token| !token.is_empty()) {
			headers.insert(AUTHORIZATION_HEADER.to_owned(), token.expose().to_owned());
		}

		headers
	}

	/// Resolves the token once and runs a paginated search.
	pub async fn search_concept(
		&self,
		concept: ConceptType,
		params: &SearchParams,
		options: &SearchOptions,
	) -> Result<Vec<JsonValue>> {
		let token = self.resolve_token().await?;
		let headers = self.read_headers(token.as_ref());

		search::search_concept(
			self.transport.as_ref(),
			&self.settings,
			concept,
			params,
			&headers,
			options,
		)
		.await
	}

	/// Searches collections of this provider; caller parameters win over the provider default.
	pub async fn search_collections(
		&self,
		params: SearchParams,
		format: ResponseFormat,
	) -> Result<Vec<JsonValue>> {
		self.search_provider(ConceptType::Collections, params, format).await
	}

	/// Searches granules of this provider; caller parameters win over the provider default.
	pub async fn search_granules(
		&self,
		params: SearchParams,
		format: ResponseFormat,
	) -> Result<Vec<JsonValue>> {
		self.search_provider(ConceptType::Granules, params, format).await
	}

	async fn search_provider(
		&self,
		concept: ConceptType,
		params: SearchParams,
		format: ResponseFormat,
	) -> Result<Vec<JsonValue>> {
		let params = params.with_leading("provider_short_name", &self.provider);
		let options = SearchOptions::default().with_format(format);

		self.search_concept(concept, &params, &options).await
	}

	// A configured secret name takes precedence over the literal value.
	async fn resolve_secret(
		&self,
		literal: Option<&Secret>,
		secret_name: Option<&str>,
		what: &str,
	) -> Result<Secret> {
		if let Some(name) = secret_name.filter(|name| !name.is_empty()) {
			let store = self.secrets.as_ref().ok_or_else(|| {
				Error::credential(format!("No secret store is configured to read the {what}"))
			})?;

			return match store.get_secret(name).await? {
				Some(secret) if !secret.is_empty() => Ok(secret),
				_ => Err(Error::credential(format!("Unable to retrieve the {what}"))),
			};
		}

		literal
			.filter(|secret| !secret.is_empty())
			.cloned()
			.ok_or_else(|| Error::credential(format!("No {what} set")))
	}
}
impl CatalogIngest for CmrClient {}
impl Debug for CmrClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CmrClient")
			.field("provider", &self.provider)
			.field("client_id", &self.client_id)
			.field("oauth_provider", &self.oauth_provider)
			.field("credentials", &self.credentials)
			.field("settings", &self.settings)
			.finish()
	}
}

/// Builder for [`CmrClient`].
pub struct CmrClientBuilder {
	provider: String,
	client_id: String,
	oauth_provider: OAuthProvider,
	credentials: Option<Credentials>,
	settings: Settings,
	transport: Option<Arc<dyn HttpTransport>>,
	secrets: Option<Arc<dyn SecretStore>>,
	object_store: Option<Arc<dyn ObjectStore>>,
	resolver: Option<Arc<dyn CertificateResolver>>,
}
impl CmrClientBuilder {
	/// Creates a builder with default settings and no credentials.
	pub fn new(provider: impl Into<String>, client_id: impl Into<String>) -> Self {
		Self {
			provider: provider.into(),
			client_id: client_id.into(),
			oauth_provider: OAuthProvider::default(),
			credentials: None,
			settings: Settings::default(),
			transport: None,
			secrets: None,
			object_store: None,
			resolver: None,
		}
	}

	/// Seeds provider, client id, and credentials from resolved credential settings.
	pub fn from_credential_settings(credentials: CredentialSettings) -> Self {
		Self::new(credentials.provider, credentials.client_id)
			.oauth_provider(credentials.oauth_provider)
			.credentials(credentials.credentials)
	}

	/// Labels the OAuth provider used with a literal token.
	pub fn oauth_provider(mut self, oauth_provider: OAuthProvider) -> Self {
		self.oauth_provider = oauth_provider;

		self
	}

	/// Sets the credential source.
	pub fn credentials(mut self, credentials: Credentials) -> Self {
		self.credentials = Some(credentials);

		self
	}

	/// Uses a literal bearer token.
	pub fn token(self, token: impl Into<Secret>) -> Self {
		self.credentials(Credentials::Token(token.into()))
	}

	/// Replaces the settings.
	pub fn settings(mut self, settings: Settings) -> Self {
		self.settings = settings;

		self
	}

	/// Sets the HTTP transport.
	pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Sets the secret store used for password and passphrase lookups.
	pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
		self.secrets = Some(secrets);

		self
	}

	/// Sets the object store holding Launchpad certificates and the token cache.
	pub fn object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
		self.object_store = Some(store);

		self
	}

	/// Replaces the Launchpad certificate resolver.
	pub fn certificate_resolver(mut self, resolver: Arc<dyn CertificateResolver>) -> Self {
		self.resolver = Some(resolver);

		self
	}

	/// Validates the configuration and builds the client.
	pub fn build(self) -> Result<CmrClient> {
		let credentials = self
			.credentials
			.ok_or_else(|| Error::credential("No credential source was configured"))?;
		let transport = self.transport.ok_or_else(|| {
			Error::Config(ConfigError::http_client_build(std::io::Error::other(
				"no HTTP transport was configured",
			)))
		})?;
		let earthdata = EarthdataLogin::from_settings(transport.clone(), &self.settings)?;
		let launchpad = match &credentials {
			Credentials::Launchpad(_) => {
				let store = self.object_store.ok_or_else(|| {
					Error::credential("Launchpad credentials need an object store")
				})?;
				let mut client =
					LaunchpadClient::new(transport.clone(), store, self.settings.stack()?)
						.with_timeout(self.settings.timeout);

				if let Some(resolver) = self.resolver {
					client = client.with_resolver(resolver);
				}

				Some(client)
			},
			_ => None,
		};
		let oauth_provider = match &credentials {
			Credentials::Token(_) => self.oauth_provider,
			Credentials::Earthdata(_) => OAuthProvider::Earthdata,
			Credentials::Launchpad(_) => OAuthProvider::Launchpad,
		};

		Ok(CmrClient {
			provider: self.provider,
			client_id: self.client_id,
			oauth_provider,
			credentials,
			settings: self.settings,
			transport,
			secrets: self.secrets,
			earthdata,
			launchpad,
		})
	}
}
impl Debug for CmrClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CmrClientBuilder")
			.field("provider", &self.provider)
			.field("client_id", &self.client_id)
			.field("oauth_provider", &self.oauth_provider)
			.field("credentials", &self.credentials)
			.finish()
	}
}
