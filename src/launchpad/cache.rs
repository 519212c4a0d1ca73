//! Object-store-backed cache for the Launchpad session token.
//!
//! The record lives at `{stackName}/launchpad/token.json` in the system bucket. Reads and writes
//! are not transactional; concurrent writers race and the last one wins.

// self
use crate::{
	_prelude::*,
	config::StackLocation,
	storage::{ObjectLocation, ObjectStore, StoreError},
};

/// Seconds subtracted from "now" when stamping a freshly acquired record.
pub const START_TIME_SKEW_SECS: i64 = 300;

/// Persisted Launchpad session token.
///
/// Field names follow the token service payload so the record round-trips it; unknown payload
/// fields are kept in [`TokenRecord::extra`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Opaque bearer value.
	#[serde(rename = "sm_token")]
	pub session_token: Secret,
	/// Unix seconds at which the session is considered to have started.
	pub session_starttime: i64,
	/// Session lifetime in seconds.
	pub session_maxtimeout: i64,
	/// Remaining payload fields, preserved verbatim.
	#[serde(flatten)]
	pub extra: serde_json::Map<String, JsonValue>,
}
impl TokenRecord {
	/// Stamps a record acquired at `now`, back-dating the start by [`START_TIME_SKEW_SECS`].
	pub fn acquired_at(
		session_token: Secret,
		session_maxtimeout: i64,
		extra: serde_json::Map<String, JsonValue>,
		now: OffsetDateTime,
	) -> Self {
		Self {
			session_token,
			session_starttime: now.unix_timestamp() - START_TIME_SKEW_SECS,
			session_maxtimeout,
			extra,
		}
	}

	/// Unix second at which the record stops being usable.
	pub fn expires_at(&self) -> i64 {
		self.session_starttime.saturating_add(self.session_maxtimeout)
	}

	/// Returns `true` while `now` is strictly before the expiry.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		now.unix_timestamp() < self.expires_at()
	}
}

/// Reads and writes the cached [`TokenRecord`] of one stack.
#[derive(Clone)]
pub struct TokenCache {
	store: Arc<dyn ObjectStore>,
	location: ObjectLocation,
}
impl TokenCache {
	/// Binds the cache to the stack's token location.
	pub fn new(store: Arc<dyn ObjectStore>, stack: &StackLocation) -> Self {
		Self { store, location: stack.launchpad_token() }
	}

	/// Object location of the cached record.
	pub fn location(&self) -> &ObjectLocation {
		&self.location
	}

	/// Returns the cached bearer value when a record exists and is still valid.
	pub async fn load(&self) -> Result<Option<Secret>> {
		self.load_at(OffsetDateTime::now_utc()).await
	}

	/// Same as [`TokenCache::load`] with an explicit clock.
	pub async fn load_at(&self, now: OffsetDateTime) -> Result<Option<Secret>> {
		let record = self.load_record().await?;

		Ok(record.filter(|record| record.is_valid_at(now)).map(|record| record.session_token))
	}

	/// Returns the raw cached record, valid or not.
	pub async fn load_record(&self) -> Result<Option<TokenRecord>> {
		if !self.store.exists(&self.location).await? {
			return Ok(None);
		}

		let body = self.store.get(&self.location).await?;
		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let record = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
			let message = format!(
				"Token record {} is malformed at `{}`: {}",
				self.location,
				e.path(),
				e.inner()
			);

			StoreError::Serialization { message }
		})?;

		Ok(Some(record))
	}

	/// Serializes `record` and overwrites the cached object.
	pub async fn store(&self, record: &TokenRecord) -> Result<()> {
		let body = serde_json::to_vec(record)
			.map_err(|e| StoreError::Serialization { message: e.to_string() })?;

		self.store.put(&self.location, body).await?;

		Ok(())
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache").field("location", &self.location).finish()
	}
}
