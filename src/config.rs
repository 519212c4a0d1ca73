//! Settings resolved once from the process environment (or any lookup closure) and passed down
//! explicitly, so no operation reads live environment variables.

// std
use std::{env, time::Duration as StdDuration};
// self
use crate::{
	_prelude::*,
	cmr::{Credentials, EarthdataCredentials, LaunchpadCredentials, OAuthProvider},
	error::ConfigError,
	storage::{self, ObjectLocation},
};

/// Environment variable names understood by [`Settings`] and [`CredentialSettings`].
pub mod vars {
	/// CMR environment logical name (`PROD`, `OPS`, `UAT`, `SIT`).
	pub const CMR_ENVIRONMENT: &str = "CMR_ENVIRONMENT";
	/// Custom CMR base URL; wins over the environment.
	pub const CMR_HOST: &str = "CMR_HOST";
	/// Default record limit for searches.
	pub const CMR_LIMIT: &str = "CMR_LIMIT";
	/// Default page size for searches.
	pub const CMR_PAGE_SIZE: &str = "CMR_PAGE_SIZE";
	/// Per-request timeout in seconds.
	pub const CMR_TIMEOUT_SECS: &str = "CMR_TIMEOUT_SECS";
	/// Bucket holding the token cache and PKI certificates.
	pub const SYSTEM_BUCKET: &str = "system_bucket";
	/// Deployment stack name used as the key prefix.
	pub const STACK_NAME: &str = "stackName";
	/// `earthdata` or `launchpad`.
	pub const CMR_OAUTH_PROVIDER: &str = "cmr_oauth_provider";
	/// CMR provider id.
	pub const CMR_PROVIDER: &str = "cmr_provider";
	/// CMR client id.
	pub const CMR_CLIENT_ID: &str = "cmr_client_id";
	/// Earthdata Login username.
	pub const CMR_USERNAME: &str = "cmr_username";
	/// Secret holding the Earthdata Login password.
	pub const CMR_PASSWORD_SECRET_NAME: &str = "cmr_password_secret_name";
	/// Secret holding the Launchpad certificate passphrase.
	pub const LAUNCHPAD_PASSPHRASE_SECRET_NAME: &str = "launchpad_passphrase_secret_name";
	/// Launchpad token service endpoint.
	pub const LAUNCHPAD_API: &str = "launchpad_api";
	/// File name of the Launchpad PKCS#12 certificate.
	pub const LAUNCHPAD_CERTIFICATE: &str = "launchpad_certificate";
}

/// Record limit used when neither the caller nor the environment sets one.
pub const DEFAULT_LIMIT: usize = 100;
/// Page size used when neither the caller nor the environment sets one.
pub const DEFAULT_PAGE_SIZE: usize = 50;
/// Per-request timeout used when the environment does not set one.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// CMR / Earthdata Login deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmrEnvironment {
	/// Production.
	Prod,
	/// Operations (production alias).
	Ops,
	/// User acceptance testing.
	Uat,
	/// System integration testing; the fallback for anything unrecognized.
	#[default]
	Sit,
}
impl CmrEnvironment {
	/// Maps a logical name onto an environment; unknown names fall back to SIT.
	pub fn from_name(name: &str) -> Self {
		match name.trim().to_ascii_uppercase().as_str() {
			"PROD" => Self::Prod,
			"OPS" => Self::Ops,
			"UAT" => Self::Uat,
			_ => Self::Sit,
		}
	}

	/// Like [`CmrEnvironment::from_name`], treating an unset name as SIT.
	pub fn resolve(name: Option<&str>) -> Self {
		name.map(Self::from_name).unwrap_or_default()
	}

	/// Returns the canonical logical name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Prod => "PROD",
			Self::Ops => "OPS",
			Self::Uat => "UAT",
			Self::Sit => "SIT",
		}
	}

	/// Default CMR base URL for this environment.
	pub const fn cmr_host(self) -> &'static str {
		match self {
			Self::Prod | Self::Ops => "https://cmr.earthdata.nasa.gov",
			Self::Uat => "https://cmr.uat.earthdata.nasa.gov",
			Self::Sit => "https://cmr.sit.earthdata.nasa.gov",
		}
	}

	/// Earthdata Login base URL for this environment.
	pub const fn earthdata_host(self) -> &'static str {
		match self {
			Self::Prod | Self::Ops => "https://urs.earthdata.nasa.gov",
			Self::Uat => "https://uat.urs.earthdata.nasa.gov",
			Self::Sit => "https://sit.urs.earthdata.nasa.gov",
		}
	}
}
impl Display for CmrEnvironment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Bucket + stack prefix under which Launchpad artifacts live.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackLocation {
	/// Bucket name (`system_bucket`).
	pub bucket: String,
	/// Stack name (`stackName`), used as the key prefix.
	pub stack_name: String,
}
impl StackLocation {
	/// Builds a stack location.
	pub fn new(bucket: impl Into<String>, stack_name: impl Into<String>) -> Self {
		Self { bucket: bucket.into(), stack_name: stack_name.into() }
	}

	/// `{stack}/launchpad/token.json`.
	pub fn launchpad_token(&self) -> ObjectLocation {
		let key = storage::join_key([&self.stack_name, "launchpad/token.json"]);

		ObjectLocation::new(&self.bucket, key)
	}

	/// `{stack}/crypto/{certificate}`.
	pub fn certificate(&self, certificate: &str) -> ObjectLocation {
		let key = storage::join_key([&self.stack_name, "crypto", certificate]);

		ObjectLocation::new(&self.bucket, key)
	}
}

/// Catalog settings shared by the token clients and the search engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
	/// CMR / EDL deployment.
	pub environment: CmrEnvironment,
	/// CMR base URL override.
	pub cmr_host: Option<String>,
	/// Earthdata Login base URL override.
	pub earthdata_host: Option<String>,
	/// Record limit applied when a search does not pass one.
	pub limit: Option<usize>,
	/// Page size applied when a search does not pass one.
	pub page_size: Option<usize>,
	/// Per-request timeout.
	pub timeout: StdDuration,
	/// `system_bucket`, when set.
	pub bucket: Option<String>,
	/// `stackName`, when set.
	pub stack_name: Option<String>,
}
impl Settings {
	/// Resolves settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Resolves settings through `lookup`; empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
		let timeout = parse_number::<u64>(vars::CMR_TIMEOUT_SECS, get(vars::CMR_TIMEOUT_SECS))?
			.map(StdDuration::from_secs)
			.unwrap_or(DEFAULT_TIMEOUT);

		Ok(Self {
			environment: CmrEnvironment::resolve(get(vars::CMR_ENVIRONMENT).as_deref()),
			cmr_host: get(vars::CMR_HOST),
			earthdata_host: None,
			limit: parse_number(vars::CMR_LIMIT, get(vars::CMR_LIMIT))?,
			page_size: parse_number(vars::CMR_PAGE_SIZE, get(vars::CMR_PAGE_SIZE))?,
			timeout,
			bucket: get(vars::SYSTEM_BUCKET),
			stack_name: get(vars::STACK_NAME),
		})
	}

	/// Overrides the environment.
	pub fn with_environment(mut self, environment: CmrEnvironment) -> Self {
		self.environment = environment;

		self
	}

	/// Overrides the CMR base URL.
	pub fn with_cmr_host(mut self, host: impl Into<String>) -> Self {
		self.cmr_host = Some(host.into());

		self
	}

	/// Overrides the Earthdata Login base URL.
	pub fn with_earthdata_host(mut self, host: impl Into<String>) -> Self {
		self.earthdata_host = Some(host.into());

		self
	}

	/// Sets the default record limit.
	pub fn with_limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);

		self
	}

	/// Sets the default page size.
	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = Some(page_size);

		self
	}

	/// Sets the per-request timeout.
	pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Sets `system_bucket` and `stackName`.
	pub fn with_stack(mut self, stack: StackLocation) -> Self {
		self.bucket = Some(stack.bucket);
		self.stack_name = Some(stack.stack_name);

		self
	}

	/// Bucket + stack prefix; both values are required.
	pub fn stack(&self) -> Result<StackLocation, ConfigError> {
		let bucket =
			self.bucket.clone().ok_or(ConfigError::MissingEnvVar { name: vars::SYSTEM_BUCKET })?;
		let stack_name =
			self.stack_name.clone().ok_or(ConfigError::MissingEnvVar { name: vars::STACK_NAME })?;

		Ok(StackLocation { bucket, stack_name })
	}

	/// CMR base URL; an explicit host wins over the environment.
	pub fn cmr_base(&self) -> &str {
		self.cmr_host.as_deref().unwrap_or(self.environment.cmr_host()).trim_end_matches('/')
	}

	/// Earthdata Login base URL; an explicit host wins over the environment.
	pub fn earthdata_base(&self) -> Result<Url, ConfigError> {
		let host =
			self.earthdata_host.as_deref().unwrap_or(self.environment.earthdata_host());

		ConfigError::parse_url(host.trim_end_matches('/'))
	}

	/// `{host}/search/`.
	pub fn search_url(&self) -> Result<Url, ConfigError> {
		self.cmr_url("search/")
	}

	/// `{host}/ingest/providers/{provider}/`.
	pub fn ingest_url(&self, provider: &str) -> Result<Url, ConfigError> {
		self.cmr_url(&format!("ingest/providers/{provider}/"))
	}

	/// `{host}/ingest/providers/{provider}/validate/`.
	pub fn validate_url(&self, provider: &str) -> Result<Url, ConfigError> {
		self.cmr_url(&format!("ingest/providers/{provider}/validate/"))
	}

	/// `{host}/access-control/s3-buckets/`.
	pub fn bucket_access_url(&self) -> Result<Url, ConfigError> {
		self.cmr_url("access-control/s3-buckets/")
	}

	/// `{host}/legacy-services/rest/tokens`.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		self.cmr_url("legacy-services/rest/tokens")
	}

	fn cmr_url(&self, path: &str) -> Result<Url, ConfigError> {
		ConfigError::parse_url(&format!("{}/{path}", self.cmr_base()))
	}
}
impl Default for Settings {
	fn default() -> Self {
		Self {
			environment: CmrEnvironment::default(),
			cmr_host: None,
			earthdata_host: None,
			limit: None,
			page_size: None,
			timeout: DEFAULT_TIMEOUT,
			bucket: None,
			stack_name: None,
		}
	}
}

/// Explicit values that take precedence over the credential environment variables.
#[derive(Clone, Debug, Default)]
pub struct CredentialOverrides {
	/// `earthdata` or `launchpad`.
	pub oauth_provider: Option<String>,
	/// CMR provider id.
	pub provider: Option<String>,
	/// CMR client id.
	pub client_id: Option<String>,
	/// Earthdata Login username.
	pub username: Option<String>,
	/// Secret holding the Earthdata Login password.
	pub password_secret_name: Option<String>,
	/// Secret holding the Launchpad passphrase.
	pub passphrase_secret_name: Option<String>,
	/// Launchpad token service endpoint.
	pub api: Option<String>,
	/// Launchpad certificate file name.
	pub certificate: Option<String>,
}

/// Provider identity plus the credential source a [`crate::cmr::CmrClient`] should use.
#[derive(Clone, Debug)]
pub struct CredentialSettings {
	/// CMR provider id.
	pub provider: String,
	/// CMR client id.
	pub client_id: String,
	/// Selected OAuth provider.
	pub oauth_provider: OAuthProvider,
	/// Credential source (never a literal token).
	pub credentials: Credentials,
}
impl CredentialSettings {
	/// Resolves credential settings from `overrides` and the process environment.
	pub fn from_env(overrides: &CredentialOverrides) -> Result<Self, ConfigError> {
		Self::resolve(overrides, |name| env::var(name).ok())
	}

	/// Resolves credential settings from `overrides`, falling back to `lookup`.
	///
	/// `launchpad` selects PKI credentials (api + certificate + passphrase secret); any other
	/// provider selects Earthdata Login (username + password secret).
	pub fn resolve<F>(overrides: &CredentialOverrides, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let pick = |value: &Option<String>, name: &str| {
			value.clone().or_else(|| lookup(name)).filter(|value| !value.trim().is_empty())
		};
		let require = |value: &Option<String>, name: &'static str| {
			pick(value, name).ok_or(ConfigError::MissingEnvVar { name })
		};
		let oauth_provider = pick(&overrides.oauth_provider, vars::CMR_OAUTH_PROVIDER)
			.map(|value| value.parse::<OAuthProvider>())
			.transpose()?
			.unwrap_or_default();
		let credentials = match oauth_provider {
			OAuthProvider::Launchpad => Credentials::Launchpad(LaunchpadCredentials {
				api: require(&overrides.api, vars::LAUNCHPAD_API)?,
				passphrase: None,
				passphrase_secret_name: Some(require(
					&overrides.passphrase_secret_name,
					vars::LAUNCHPAD_PASSPHRASE_SECRET_NAME,
				)?),
				certificate: require(&overrides.certificate, vars::LAUNCHPAD_CERTIFICATE)?,
			}),
			OAuthProvider::Earthdata => Credentials::Earthdata(EarthdataCredentials {
				username: pick(&overrides.username, vars::CMR_USERNAME),
				password: None,
				password_secret_name: pick(
					&overrides.password_secret_name,
					vars::CMR_PASSWORD_SECRET_NAME,
				),
			}),
		};

		Ok(Self {
			provider: require(&overrides.provider, vars::CMR_PROVIDER)?,
			client_id: require(&overrides.client_id, vars::CMR_CLIENT_ID)?,
			oauth_provider,
			credentials,
		})
	}
}

fn parse_number<T>(name: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	value
		.map(|raw| {
			raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
				name,
				value: raw.clone(),
				reason: e.to_string(),
			})
		})
		.transpose()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> =
			pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();

		move |name| map.get(name).cloned()
	}

	#[test]
	fn environment_names_fall_back_to_sit() {
		assert_eq!(CmrEnvironment::from_name("PROD"), CmrEnvironment::Prod);
		assert_eq!(CmrEnvironment::from_name("OPS"), CmrEnvironment::Ops);
		assert_eq!(CmrEnvironment::from_name("uat"), CmrEnvironment::Uat);
		assert_eq!(CmrEnvironment::from_name("SIT"), CmrEnvironment::Sit);
		assert_eq!(CmrEnvironment::from_name("staging"), CmrEnvironment::Sit);
		assert_eq!(CmrEnvironment::resolve(None), CmrEnvironment::Sit);
	}

	#[test]
	fn host_resolution_follows_environment_unless_overridden() {
		let prod = Settings::default().with_environment(CmrEnvironment::Prod);
		let ops = Settings::default().with_environment(CmrEnvironment::Ops);
		let uat = Settings::default().with_environment(CmrEnvironment::Uat);
		let other = Settings::default();

		assert_eq!(prod.cmr_base(), "https://cmr.earthdata.nasa.gov");
		assert_eq!(ops.cmr_base(), "https://cmr.earthdata.nasa.gov");
		assert_eq!(uat.cmr_base(), "https://cmr.uat.earthdata.nasa.gov");
		assert_eq!(other.cmr_base(), "https://cmr.sit.earthdata.nasa.gov");

		let overridden = prod.clone().with_cmr_host("http://localhost:3003/");

		assert_eq!(overridden.cmr_base(), "http://localhost:3003");
		assert_eq!(
			overridden.search_url().expect("Search URL should parse.").as_str(),
			"http://localhost:3003/search/",
		);
		assert_eq!(
			prod.earthdata_base().expect("EDL URL should parse.").as_str(),
			"https://urs.earthdata.nasa.gov/",
		);
		assert_eq!(
			uat.earthdata_base().expect("EDL URL should parse.").as_str(),
			"https://uat.urs.earthdata.nasa.gov/",
		);
		assert_eq!(
			other.earthdata_base().expect("EDL URL should parse.").as_str(),
			"https://sit.urs.earthdata.nasa.gov/",
		);
	}

	#[test]
	fn cmr_urls_cover_every_endpoint() {
		let settings = Settings::default().with_environment(CmrEnvironment::Uat);

		assert_eq!(
			settings.ingest_url("PODAAC").expect("Ingest URL should parse.").as_str(),
			"https://cmr.uat.earthdata.nasa.gov/ingest/providers/PODAAC/",
		);
		assert_eq!(
			settings.validate_url("PODAAC").expect("Validate URL should parse.").as_str(),
			"https://cmr.uat.earthdata.nasa.gov/ingest/providers/PODAAC/validate/",
		);
		assert_eq!(
			settings.bucket_access_url().expect("Bucket access URL should parse.").as_str(),
			"https://cmr.uat.earthdata.nasa.gov/access-control/s3-buckets/",
		);
		assert_eq!(
			settings.token_url().expect("Token URL should parse.").as_str(),
			"https://cmr.uat.earthdata.nasa.gov/legacy-services/rest/tokens",
		);
	}

	#[test]
	fn from_lookup_reads_every_variable() {
		let settings = Settings::from_lookup(lookup(&[
			("CMR_ENVIRONMENT", "UAT"),
			("CMR_HOST", ""),
			("CMR_LIMIT", "250"),
			("CMR_PAGE_SIZE", "25"),
			("CMR_TIMEOUT_SECS", "5"),
			("system_bucket", "sys-bucket"),
			("stackName", "my-stack"),
		]))
		.expect("Settings should resolve from the lookup.");

		assert_eq!(settings.environment, CmrEnvironment::Uat);
		assert_eq!(settings.cmr_host, None);
		assert_eq!(settings.limit, Some(250));
		assert_eq!(settings.page_size, Some(25));
		assert_eq!(settings.timeout, StdDuration::from_secs(5));
		assert_eq!(
			settings.stack().expect("Stack should resolve."),
			StackLocation::new("sys-bucket", "my-stack"),
		);
	}

	#[test]
	fn from_lookup_rejects_malformed_numbers_and_reports_missing_stack() {
		let err = Settings::from_lookup(lookup(&[("CMR_LIMIT", "lots")]))
			.expect_err("A non-numeric limit should be rejected.");

		assert!(matches!(err, ConfigError::InvalidValue { name: "CMR_LIMIT", .. }));

		let settings =
			Settings::from_lookup(lookup(&[("system_bucket", "b")])).expect("Settings resolve.");

		assert!(matches!(
			settings.stack(),
			Err(ConfigError::MissingEnvVar { name: "stackName" })
		));
		assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
	}

	#[test]
	fn stack_location_builds_launchpad_keys() {
		let stack = StackLocation::new("sys-bucket", "my-stack");

		assert_eq!(
			stack.launchpad_token(),
			ObjectLocation::new("sys-bucket", "my-stack/launchpad/token.json"),
		);
		assert_eq!(
			stack.certificate("launchpad.pfx"),
			ObjectLocation::new("sys-bucket", "my-stack/crypto/launchpad.pfx"),
		);
	}

	#[test]
	fn credential_settings_pick_launchpad_or_earthdata() {
		let launchpad = CredentialSettings::resolve(
			&CredentialOverrides { provider: Some("PODAAC".into()), ..Default::default() },
			lookup(&[
				("cmr_oauth_provider", "launchpad"),
				("cmr_provider", "IGNORED"),
				("cmr_client_id", "cumulus"),
				("launchpad_api", "https://api.launchpad.example.com/icam/v1"),
				("launchpad_passphrase_secret_name", "lp-passphrase"),
				("launchpad_certificate", "launchpad.pfx"),
			]),
		)
		.expect("Launchpad settings should resolve.");

		assert_eq!(launchpad.provider, "PODAAC");
		assert_eq!(launchpad.oauth_provider, OAuthProvider::Launchpad);
		assert!(matches!(
			&launchpad.credentials,
			Credentials::Launchpad(LaunchpadCredentials { certificate, .. })
				if certificate == "launchpad.pfx"
		));

		let earthdata = CredentialSettings::resolve(
			&CredentialOverrides::default(),
			lookup(&[
				("cmr_provider", "PODAAC"),
				("cmr_client_id", "cumulus"),
				("cmr_username", "edl-user"),
				("cmr_password_secret_name", "edl-password"),
			]),
		)
		.expect("Earthdata settings should resolve.");

		assert_eq!(earthdata.oauth_provider, OAuthProvider::Earthdata);
		assert!(matches!(
			&earthdata.credentials,
			Credentials::Earthdata(EarthdataCredentials { username: Some(user), .. })
				if user == "edl-user"
		));

		let err = CredentialSettings::resolve(
			&CredentialOverrides::default(),
			lookup(&[("cmr_oauth_provider", "launchpad"), ("cmr_provider", "P")]),
		)
		.expect_err("Launchpad without an api should be rejected.");

		assert!(matches!(err, ConfigError::MissingEnvVar { name: "launchpad_api" }));
	}
}
