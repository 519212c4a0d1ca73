//! Object-storage contracts and built-in stores for cached tokens and PKI certificates.

pub mod file;
pub mod memory;

pub use file::FileObjectStore;
pub use memory::MemoryObjectStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`ObjectStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Bucket + key addressed blob storage (S3 and friends).
pub trait ObjectStore
where
	Self: Send + Sync,
{
	/// Returns `true` when an object exists at `location`.
	fn exists<'a>(&'a self, location: &'a ObjectLocation) -> StoreFuture<'a, bool>;

	/// Reads the object at `location`; missing objects yield [`StoreError::NotFound`].
	fn get<'a>(&'a self, location: &'a ObjectLocation) -> StoreFuture<'a, Vec<u8>>;

	/// Creates or overwrites the object at `location`.
	fn put<'a>(&'a self, location: &'a ObjectLocation, body: Vec<u8>) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`ObjectStore`] and secret-store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// No object exists at the requested location.
	#[error("Object {location} does not exist.")]
	NotFound {
		/// Location that was requested.
		location: ObjectLocation,
	},
	/// Stored bytes could not be (de)serialized.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Fully-qualified object address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectLocation {
	/// Bucket name.
	pub bucket: String,
	/// Object key inside the bucket.
	pub key: String,
}
impl ObjectLocation {
	/// Builds a location from a bucket and an already-joined key.
	pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
		Self { bucket: bucket.into(), key: key.into() }
	}
}
impl Display for ObjectLocation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "s3://{}/{}", self.bucket, self.key)
	}
}

/// Joins key segments without a leading slash.
///
/// Each segment loses one leading and one trailing `/`; empty segments are dropped. A trailing
/// `/` on the last segment survives so "directory" keys stay directories.
pub fn join_key<I, S>(segments: I) -> String
where
	I: IntoIterator<Item = S>,
	S: AsRef<str>,
{
	let mut key = String::new();
	let mut trailing_slash = false;

	for segment in segments {
		let segment = segment.as_ref();

		trailing_slash = segment.ends_with('/');

		let segment = segment.strip_prefix('/').unwrap_or(segment);
		let segment = segment.strip_suffix('/').unwrap_or(segment);

		if segment.is_empty() {
			continue;
		}
		if !key.is_empty() {
			key.push('/');
		}

		key.push_str(segment);
	}

	if trailing_slash {
		key.push('/');
	}

	key
}
