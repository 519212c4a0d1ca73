//! Crate-level error types shared by the token clients, the search engine, and the stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// The enum is closed: faults of foreign origin raised while talking to Earthdata Login are
/// normalized into [`Error::Unexpected`] instead of leaking transport-specific types.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Object or secret storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::storage::StoreError,
	),
	/// Local configuration problem (missing or malformed environment value, bad URL).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// PKCS#12 bundle could not be turned into a client certificate.
	#[error(transparent)]
	Certificate(#[from] crate::certificate::CertificateError),
	/// Transport failure outside of a service-specific call.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No usable password, passphrase, or username is available.
	#[error("No usable credential is available: {reason}.")]
	Credential {
		/// Human-readable explanation.
		reason: String,
	},
	/// The Launchpad PKI certificate is missing from the object store.
	#[error("Certificate `{key}` does not exist in bucket `{bucket}`.")]
	CertificateNotFound {
		/// Bucket that was searched.
		bucket: String,
		/// Object key that was expected to hold the PKCS#12 blob.
		key: String,
	},
	/// Launchpad token service call failed.
	#[error("Launchpad token service request failed: {0}.")]
	TokenService(#[source] ServiceFailure),
	/// Earthdata Login call failed.
	#[error("Earthdata Login request failed: {0}.")]
	LoginService(#[source] ServiceFailure),
	/// CMR search call failed.
	#[error("CMR search request failed: {0}.")]
	SearchService(#[source] ServiceFailure),
	/// Response is missing an expected header or field.
	#[error("Unexpected response: {message}.")]
	Protocol {
		/// What was missing or malformed.
		message: String,
	},
	/// Declared operation without an implementation.
	#[error("Operation `{operation}` is not supported.")]
	NotSupported {
		/// Operation label.
		operation: &'static str,
	},
	/// Normalized fault of unknown origin; carries the original message.
	#[error("{message}")]
	Unexpected {
		/// Original error message.
		message: String,
	},
}
impl Error {
	/// Builds a [`Error::Protocol`] from any displayable message.
	pub fn protocol(message: impl Display) -> Self {
		Self::Protocol { message: message.to_string() }
	}

	/// Builds a [`Error::Credential`] from any displayable reason.
	pub fn credential(reason: impl Display) -> Self {
		Self::Credential { reason: reason.to_string() }
	}

	/// Wraps any foreign error as [`Error::Unexpected`], keeping its message.
	pub fn unexpected(error: impl Display) -> Self {
		Self::Unexpected { message: error.to_string() }
	}

	/// Returns the HTTP status code attached to a service failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::TokenService(failure)
			| Self::LoginService(failure)
			| Self::SearchService(failure) => failure.status(),
			_ => None,
		}
	}
}

/// Why a call to an upstream service failed.
#[derive(Debug, ThisError)]
pub enum ServiceFailure {
	/// Upstream answered with a non-2xx status.
	#[error("{body}, statusCode: {status}, statusMessage: {status_text}")]
	Status {
		/// HTTP status code.
		status: u16,
		/// HTTP reason phrase (or `Unknown`).
		status_text: String,
		/// Raw response body, kept for diagnosis.
		body: String,
	},
	/// The request never produced a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl ServiceFailure {
	/// Captures a non-2xx response.
	pub fn from_response(response: &crate::http::HttpResponse) -> Self {
		Self::Status {
			status: response.status,
			status_text: response.reason.clone(),
			body: response.text(),
		}
	}

	/// Returns the HTTP status code, when the failure carries one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status { status, .. } => Some(*status),
			Self::Transport(_) => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Required environment variable is unset.
	#[error("The {name} environment variable must be set.")]
	MissingEnvVar {
		/// Variable name.
		name: &'static str,
	},
	/// Environment variable or option holds an unusable value.
	#[error("Value `{value}` for {name} is invalid: {reason}.")]
	InvalidValue {
		/// Variable or option name.
		name: &'static str,
		/// Offending value.
		value: String,
		/// Why the value was rejected.
		reason: String,
	},
	/// A configured endpoint cannot be parsed.
	#[error("URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Parses `value` as a URL, reporting failures as [`ConfigError::InvalidUrl`].
	pub fn parse_url(value: &str) -> Result<Url, Self> {
		Url::parse(value).map_err(|source| Self::InvalidUrl { value: value.to_owned(), source })
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred: {source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport: {0}")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
