//! Thread-safe in-memory [`ObjectStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	storage::{ObjectLocation, ObjectStore, StoreError, StoreFuture},
};

type ObjectMap = Arc<RwLock<HashMap<ObjectLocation, Vec<u8>>>>;

/// Keeps objects in-process; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryObjectStore(ObjectMap);
impl MemoryObjectStore {
	/// Seeds an object synchronously (fixtures, demos).
	pub fn insert(&self, location: ObjectLocation, body: impl Into<Vec<u8>>) {
		self.0.write().insert(location, body.into());
	}

	/// Returns a copy of the object at `location`, if any.
	pub fn object(&self, location: &ObjectLocation) -> Option<Vec<u8>> {
		self.0.read().get(location).cloned()
	}

	/// Number of stored objects.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn get_now(map: &ObjectMap, location: &ObjectLocation) -> Result<Vec<u8>, StoreError> {
		map.read()
			.get(location)
			.cloned()
			.ok_or_else(|| StoreError::NotFound { location: location.to_owned() })
	}
}
impl ObjectStore for MemoryObjectStore {
	fn exists<'a>(&'a self, location: &'a ObjectLocation) -> StoreFuture<'a, bool> {
		let map = self.0.clone();

		Box::pin(async move { Ok(map.read().contains_key(location)) })
	}

	fn get<'a>(&'a self, location: &'a ObjectLocation) -> StoreFuture<'a, Vec<u8>> {
		let map = self.0.clone();

		Box::pin(async move { Self::get_now(&map, location) })
	}

	fn put<'a>(&'a self, location: &'a ObjectLocation, body: Vec<u8>) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(location.to_owned(), body);

			Ok(())
		})
	}
}
