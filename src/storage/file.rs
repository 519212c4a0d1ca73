//! Directory-backed [`ObjectStore`] that maps `bucket/key` onto `root/bucket/key`.

// std
use std::{
	fs::{self, File},
	io::{ErrorKind, Write},
	path::{Component, Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	storage::{ObjectLocation, ObjectStore, StoreError, StoreFuture},
};

/// Stores each object as a file under a root directory.
///
/// Writes go through a sibling temp file and a rename so readers never observe a partial token
/// record.
#[derive(Clone, Debug)]
pub struct FileObjectStore {
	root: PathBuf,
}
impl FileObjectStore {
	/// Opens (or creates) a store rooted at `root`.
	pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let root = root.into();

		fs::create_dir_all(&root).map_err(|e| StoreError::Backend {
			message: format!("Failed to create store root {}: {e}", root.display()),
		})?;

		Ok(Self { root })
	}

	/// Root directory of the store.
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn path_for(&self, location: &ObjectLocation) -> Result<PathBuf, StoreError> {
		let relative = Path::new(&location.bucket).join(&location.key);

		if location.bucket.is_empty()
			|| location.key.is_empty()
			|| relative.components().any(|c| !matches!(c, Component::Normal(_)))
		{
			return Err(StoreError::Backend {
				message: format!("Object location {location} cannot be mapped onto the store root"),
			});
		}

		Ok(self.root.join(relative))
	}

	fn read_now(path: &Path, location: &ObjectLocation) -> Result<Vec<u8>, StoreError> {
		fs::read(path).map_err(|e| match e.kind() {
			ErrorKind::NotFound => StoreError::NotFound { location: location.to_owned() },
			_ => StoreError::Backend { message: format!("Failed to read {}: {e}", path.display()) },
		})
	}

	fn write_now(path: &Path, body: &[u8]) -> Result<(), StoreError> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create directory {}: {e}", parent.display()),
			})?;
		}

		let mut tmp_path = path.to_path_buf();

		tmp_path.as_mut_os_string().push(".tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(body).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", path.display()),
		})
	}
}
impl ObjectStore for FileObjectStore {
	fn exists<'a>(&'a self, location: &'a ObjectLocation) -> StoreFuture<'a, bool> {
		Box::pin(async move { Ok(self.path_for(location)?.is_file()) })
	}

	fn get<'a>(&'a self, location: &'a ObjectLocation) -> StoreFuture<'a, Vec<u8>> {
		Box::pin(async move {
			let path = self.path_for(location)?;

			Self::read_now(&path, location)
		})
	}

	fn put<'a>(&'a self, location: &'a ObjectLocation, body: Vec<u8>) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let path = self.path_for(location)?;

			Self::write_now(&path, &body)
		})
	}
}
