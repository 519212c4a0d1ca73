//! Limit-bounded paginated search against the CMR search API.
//!
//! [`search_concept`] walks `page_num` forward until one of these holds: the caller asked for a
//! single page, the accumulated count reached the record limit or the server-reported
//! `cmr-hits`, a page came back empty, or the [`SearchCancel`] handle fired. Results are
//! truncated to the limit afterwards, so the last page may be fetched in full.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tracing::{debug, error};
// self
use crate::{
	_prelude::*,
	config::{DEFAULT_LIMIT, DEFAULT_PAGE_SIZE, Settings},
	error::{ConfigError, ServiceFailure},
	http::{HttpRequest, HttpResponse, HttpTransport},
	obs::{self, OperationKind},
};

/// Header carrying the total number of matching records.
pub const HITS_HEADER: &str = "cmr-hits";

/// Concept collections exposed by the search API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConceptType {
	/// `collections`.
	Collections,
	/// `granules`.
	Granules,
}
impl ConceptType {
	/// Path segment used in the search URL.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConceptType::Collections => "collections",
			ConceptType::Granules => "granules",
		}
	}
}
impl Display for ConceptType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Response formats; only the JSON flavours can be paginated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResponseFormat {
	/// `json` (results under `feed.entry`).
	#[default]
	Json,
	/// `umm_json` (results under `items`).
	UmmJson,
	/// `echo10` XML; declared but unsupported.
	Echo10,
}
impl ResponseFormat {
	/// URL extension.
	pub const fn as_str(self) -> &'static str {
		match self {
			ResponseFormat::Json => "json",
			ResponseFormat::UmmJson => "umm_json",
			ResponseFormat::Echo10 => "echo10",
		}
	}
}
impl Display for ResponseFormat {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ResponseFormat {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"json" => Ok(Self::Json),
			"umm_json" => Ok(Self::UmmJson),
			"echo10" => Ok(Self::Echo10),
			_ => Err(ConfigError::InvalidValue {
				name: "format",
				value: s.to_owned(),
				reason: "expected json, umm_json, or echo10".into(),
			}),
		}
	}
}

/// Ordered search parameters; setting an existing key keeps its position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SearchParams(Vec<(String, String)>);
impl SearchParams {
	/// Empty parameter list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key`, replacing the value in place when it already exists.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		let key = key.into();
		let value = value.into();

		match self.0.iter_mut().find(|(k, _)| *k == key) {
			Some((_, slot)) => *slot = value,
			None => self.0.push((key, value)),
		}
	}

	/// Chaining form of [`SearchParams::set`].
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.set(key, value);

		self
	}

	/// Returns the value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	/// Returns `true` when `key` is present.
	pub fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Moves `key` to the front, defaulting its value to `value` when the caller did not set it.
	pub fn with_leading(self, key: &str, value: impl Into<String>) -> Self {
		let mut leading = Self::new();

		leading.set(key, self.get(key).map_or_else(|| value.into(), str::to_owned));
		leading.0.extend(self.0.into_iter().filter(|(k, _)| k != key));

		leading
	}

	/// Iterates pairs in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	/// Number of pairs.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no pair is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl<K, V> FromIterator<(K, V)> for SearchParams
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut params = Self::new();

		for (key, value) in iter {
			params.set(key, value);
		}

		params
	}
}

/// Advisory cancellation handle checked before each page request.
#[derive(Clone, Debug, Default)]
pub struct SearchCancel(Arc<AtomicBool>);
impl SearchCancel {
	/// Fresh, unfired handle.
	pub fn new() -> Self {
		Self::default()
	}

	/// Fires the handle; clones observe it too.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	/// Returns `true` once [`SearchCancel::cancel`] was called.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Per-search knobs.
#[derive(Clone, Debug)]
pub struct SearchOptions {
	/// Response format.
	pub format: ResponseFormat,
	/// Follow pages until a stop condition holds; `false` fetches one page.
	pub recursive: bool,
	/// Record limit; falls back to [`Settings::limit`], then 100.
	pub limit: Option<usize>,
	/// Page size; a `pageSize` search parameter wins, then this, then [`Settings::page_size`],
	/// then 50.
	pub page_size: Option<usize>,
	/// Cancellation handle.
	pub cancel: Option<SearchCancel>,
}
impl SearchOptions {
	/// Sets the response format.
	pub fn with_format(mut self, format: ResponseFormat) -> Self {
		self.format = format;

		self
	}

	/// Enables or disables pagination.
	pub fn with_recursive(mut self, recursive: bool) -> Self {
		self.recursive = recursive;

		self
	}

	/// Sets the record limit.
	pub fn with_limit(mut self, limit: usize) -> Self {
		self.limit = Some(limit);

		self
	}

	/// Sets the page size.
	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = Some(page_size);

		self
	}

	/// Attaches a cancellation handle.
	pub fn with_cancel(mut self, cancel: SearchCancel) -> Self {
		self.cancel = Some(cancel);

		self
	}

	fn is_cancelled(&self) -> bool {
		self.cancel.as_ref().is_some_and(SearchCancel::is_cancelled)
	}
}
impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			format: ResponseFormat::Json,
			recursive: true,
			limit: None,
			page_size: None,
			cancel: None,
		}
	}
}

/// Runs a paginated search and returns at most `limit` records.
pub async fn search_concept(
	transport: &dyn HttpTransport,
	settings: &Settings,
	concept: ConceptType,
	params: &SearchParams,
	headers: &BTreeMap<String, String>,
	options: &SearchOptions,
) -> Result<Vec<JsonValue>> {
	obs::observe(OperationKind::Search, "search_concept", async move {
		if options.format == ResponseFormat::Echo10 {
			return Err(Error::NotSupported { operation: "search_concept(echo10)" });
		}

		let limit = options.limit.or(settings.limit).unwrap_or(DEFAULT_LIMIT);
		let page_size = match params.get("pageSize").filter(|v| !v.trim().is_empty()) {
			Some(raw) => parse_param("pageSize", raw)?,
			None => options.page_size.or(settings.page_size).unwrap_or(DEFAULT_PAGE_SIZE),
		};
		let mut query = params.clone();
		let mut page_num = match query.get("page_num") {
			Some(raw) => parse_param("page_num", raw)? + 1,
			None => 1,
		};

		query.set("page_num", page_num.to_string());

		if !query.contains("page_size") {
			query.set("page_size", page_size.to_string());
		}

		let url = ConfigError::parse_url(&format!(
			"{}{concept}.{}",
			settings.search_url()?,
			options.format
		))?;
		let mut results = Vec::new();

		loop {
			if options.is_cancelled() {
				debug!(page_num, collected = results.len(), "Search cancelled.");

				break;
			}

			let request = HttpRequest::get(url.clone())
				.query_pairs(query.iter())
				.headers(headers.clone())
				.timeout(settings.timeout);
			let response = fetch_page(transport, request, &url, &query).await?;
			let items = page_items(&response)?;
			let fetched = items.len();

			results.extend(items);

			let hits = hit_count(&response)?;
			let collected = results.len();

			debug!(page_num, fetched, hits, collected, "Fetched search page.");

			if !options.recursive || collected >= limit || collected >= hits || fetched == 0 {
				break;
			}

			page_num += 1;
			query.set("page_num", page_num.to_string());
		}

		results.truncate(limit);

		Ok(results)
	})
	.await
}

async fn fetch_page(
	transport: &dyn HttpTransport,
	request: HttpRequest,
	url: &Url,
	query: &SearchParams,
) -> Result<HttpResponse> {
	let failure = match transport.execute(request).await {
		Ok(response) if response.is_success() => return Ok(response),
		Ok(response) => ServiceFailure::from_response(&response),
		Err(e) => ServiceFailure::Transport(e),
	};

	error!(url = %url, query = ?query, error = %failure, "Error executing CMR search concept.");

	Err(Error::SearchService(failure))
}

fn page_items(response: &HttpResponse) -> Result<Vec<JsonValue>> {
	let body = response
		.json_body::<JsonValue>()
		.map_err(|e| Error::protocol(format!("search response is not JSON: {}", e.inner())))?;
	let items = match body.get("items") {
		Some(items) => items,
		None => body.pointer("/feed/entry").unwrap_or(&JsonValue::Null),
	};

	Ok(items.as_array().cloned().unwrap_or_default())
}

fn hit_count(response: &HttpResponse) -> Result<usize> {
	let raw = response
		.header(HITS_HEADER)
		.ok_or_else(|| Error::protocol(format!("{HITS_HEADER} header not found")))?;

	raw.trim()
		.parse()
		.map_err(|_| Error::protocol(format!("{HITS_HEADER} header `{raw}` is not an integer")))
}

fn parse_param(name: &'static str, raw: &str) -> Result<usize> {
	raw.trim().parse().map_err(|e: std::num::ParseIntError| {
		ConfigError::InvalidValue { name, value: raw.to_owned(), reason: e.to_string() }.into()
	})
}
