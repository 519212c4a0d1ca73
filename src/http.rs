//! Transport primitives shared by the token clients and the search engine.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Requests are described by
//! [`HttpRequest`] (query pairs, headers, basic auth, JSON body, optional TLS client
//! certificate, timeout) and answered with an [`HttpResponse`] that keeps status, reason phrase,
//! headers, and body for both success and failure so callers can build diagnostic errors.

// std
use std::{path::PathBuf, time::Duration as StdDuration};
// self
use crate::{_prelude::*, certificate::ClientCertificate, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing catalog and token-service requests.
///
/// Implementations must return `Ok` for every response the server produced, whatever its
/// status; `Err` is reserved for requests that never produced a response.
pub trait HttpTransport
where
	Self: Send + Sync,
{
	/// Executes a single request.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// HTTP verbs used by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
}
impl Method {
	/// Returns the wire representation.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Owned description of an outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
	/// HTTP verb.
	pub method: Method,
	/// Absolute target URL (without the query pairs below).
	pub url: Url,
	/// Ordered query pairs appended to `url`.
	pub query: Vec<(String, String)>,
	/// Request headers.
	pub headers: BTreeMap<String, String>,
	/// Basic-auth credentials.
	pub basic_auth: Option<(String, Secret)>,
	/// JSON request body.
	pub json: Option<JsonValue>,
	/// PEM file holding the private key and certificate chain for TLS client auth.
	pub client_certificate: Option<PathBuf>,
	/// Upper bound for the whole exchange.
	pub timeout: Option<StdDuration>,
}
impl HttpRequest {
	/// Starts a request with the given verb.
	pub fn new(method: Method, url: Url) -> Self {
		Self {
			method,
			url,
			query: Vec::new(),
			headers: BTreeMap::new(),
			basic_auth: None,
			json: None,
			client_certificate: None,
			timeout: None,
		}
	}

	/// Starts a `GET` request.
	pub fn get(url: Url) -> Self {
		Self::new(Method::Get, url)
	}

	/// Starts a `POST` request.
	pub fn post(url: Url) -> Self {
		Self::new(Method::Post, url)
	}

	/// Appends a query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends every query pair from `pairs`.
	pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Sets a header, replacing any previous value.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Replaces the header map.
	pub fn headers(mut self, headers: BTreeMap<String, String>) -> Self {
		self.headers = headers;

		self
	}

	/// Attaches basic-auth credentials.
	pub fn basic_auth(mut self, username: impl Into<String>, password: Secret) -> Self {
		self.basic_auth = Some((username.into(), password));

		self
	}

	/// Attaches a JSON body.
	pub fn json(mut self, body: JsonValue) -> Self {
		self.json = Some(body);

		self
	}

	/// Authenticates the TLS session with the given client certificate.
	///
	/// The request only records the file path; the caller keeps `certificate` alive until the
	/// request completes.
	pub fn client_certificate(mut self, certificate: &ClientCertificate) -> Self {
		self.client_certificate = Some(certificate.path().to_path_buf());

		self
	}

	/// Bounds the exchange.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Returns the first query value stored under `key`.
	pub fn query_value(&self, key: &str) -> Option<&str> {
		self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}
}

/// Response captured from the transport, successful or not.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Reason phrase (falls back to `Unknown`).
	pub reason: String,
	/// Response headers keyed by lower-cased name.
	pub headers: BTreeMap<String, String>,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Builds a response with the given status and body; the reason phrase follows the status.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self {
			status,
			reason: reason_phrase(status).to_owned(),
			headers: BTreeMap::new(),
			body: body.into(),
		}
	}

	/// Builds a response whose body is the serialized `value`.
	pub fn json(status: u16, value: &JsonValue) -> Self {
		Self::new(status, value.to_string()).with_header("content-type", "application/json")
	}

	/// Sets the reason phrase.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = reason.into();

		self
	}

	/// Adds a header (name is lower-cased).
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Case-insensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns `true` when the body holds nothing but whitespace.
	pub fn is_empty(&self) -> bool {
		self.body.iter().all(u8::is_ascii_whitespace)
	}

	/// Parses the body as JSON, reporting the failing path on errors.
	pub fn json_body<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}
}

/// Reason phrase for a status code, or `Unknown`.
pub fn reason_phrase(status: u16) -> &'static str {
	match status {
		200 => "OK",
		201 => "Created",
		204 => "No Content",
		400 => "Bad Request",
		401 => "Unauthorized",
		403 => "Forbidden",
		404 => "Not Found",
		409 => "Conflict",
		422 => "Unprocessable Entity",
		429 => "Too Many Requests",
		500 => "Internal Server Error",
		502 => "Bad Gateway",
		503 => "Service Unavailable",
		504 => "Gateway Timeout",
		_ => "Unknown",
	}
}

/// [`HttpTransport`] backed by reqwest.
///
/// Requests carrying a client certificate get a dedicated client built from the PEM file, so the
/// shared connection pool never holds an identity.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	fn client_for(&self, request: &HttpRequest) -> Result<ReqwestClient, TransportError> {
		let Some(path) = &request.client_certificate else {
			return Ok(self.0.clone());
		};
		let pem = std::fs::read(path)?;
		let identity = reqwest::Identity::from_pem(&pem)?;

		Ok(ReqwestClient::builder().identity(identity).build()?)
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let client = self.client_for(&request)?;
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
			};
			let mut builder = client.request(method, request.url).query(&request.query);

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some((username, password)) = &request.basic_auth {
				builder = builder.basic_auth(username, Some(password.expose()));
			}
			if let Some(body) = &request.json {
				builder = builder
					.header(reqwest::header::CONTENT_TYPE, "application/json")
					.body(body.to_string());
			}
			if let Some(timeout) = request.timeout {
				builder = builder.timeout(timeout);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(HttpResponse {
				status: status.as_u16(),
				reason: status.canonical_reason().unwrap_or("Unknown").to_owned(),
				headers,
				body,
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn header_lookup_ignores_case() {
		let response = HttpResponse::new(200, "[]").with_header("CMR-Hits", "42");

		assert_eq!(response.header("cmr-hits"), Some("42"));
		assert_eq!(response.header("CMR-HITS"), Some("42"));
		assert!(response.is_success());
	}

	#[test]
	fn empty_body_detection_ignores_whitespace() {
		assert!(HttpResponse::new(200, " \n").is_empty());
		assert!(!HttpResponse::new(200, "{}").is_empty());
	}

	#[test]
	fn json_body_reports_failing_path() {
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Payload {
			session_maxtimeout: i64,
		}

		let response = HttpResponse::new(200, "{\"session_maxtimeout\":\"soon\"}");
		let err = response
			.json_body::<Payload>()
			.expect_err("A string timeout should not deserialize into an integer.");

		assert_eq!(err.path().to_string(), "session_maxtimeout");
	}

	#[test]
	fn request_builder_keeps_query_order() {
		let url = Url::parse("https://cmr.example.com/search/collections.json")
			.expect("Fixture URL should parse.");
		let request = HttpRequest::get(url)
			.query("provider_short_name", "PODAAC")
			.query_pairs([("page_num", "1"), ("page_size", "50")]);
		let keys: Vec<_> = request.query.iter().map(|(k, _)| k.as_str()).collect();

		assert_eq!(keys, ["provider_short_name", "page_num", "page_size"]);
		assert_eq!(request.query_value("page_size"), Some("50"));
	}
}
