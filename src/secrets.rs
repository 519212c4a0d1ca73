//! Secret-store contracts used to resolve EDL passwords and Launchpad passphrases by name.

// std
use std::env;
// self
use crate::{_prelude::*, storage::StoreError};

/// Boxed future returned by [`SecretStore::get_secret`].
pub type SecretFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<Secret>, StoreError>> + 'a + Send>>;

/// Name-addressed secret lookup (AWS Secrets Manager and friends).
pub trait SecretStore
where
	Self: Send + Sync,
{
	/// Returns the secret stored under `name`, or `None` when no such secret exists.
	fn get_secret<'a>(&'a self, name: &'a str) -> SecretFuture<'a>;
}

/// In-process secret store; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemorySecretStore(Arc<RwLock<HashMap<String, Secret>>>);
impl MemorySecretStore {
	/// Adds (or replaces) a secret, returning the store for chaining.
	pub fn with_secret(self, name: impl Into<String>, value: impl Into<Secret>) -> Self {
		self.insert(name, value);

		self
	}

	/// Adds (or replaces) a secret.
	pub fn insert(&self, name: impl Into<String>, value: impl Into<Secret>) {
		self.0.write().insert(name.into(), value.into());
	}
}
impl SecretStore for MemorySecretStore {
	fn get_secret<'a>(&'a self, name: &'a str) -> SecretFuture<'a> {
		Box::pin(async move { Ok(self.0.read().get(name).cloned()) })
	}
}

/// Reads secrets from process environment variables named after the secret.
///
/// An optional prefix is prepended to every name, so `EnvSecretStore::with_prefix("SECRET_")`
/// resolves `cmr-password` from `SECRET_cmr-password`. Empty variables count as absent.
#[derive(Clone, Debug, Default)]
pub struct EnvSecretStore {
	prefix: String,
}
impl EnvSecretStore {
	/// Builds a store that prefixes every lookup.
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}
}
impl SecretStore for EnvSecretStore {
	fn get_secret<'a>(&'a self, name: &'a str) -> SecretFuture<'a> {
		Box::pin(async move {
			let var = format!("{}{name}", self.prefix);

			match env::var(&var) {
				Ok(value) if !value.is_empty() => Ok(Some(Secret::new(value))),
				Ok(_) | Err(env::VarError::NotPresent) => Ok(None),
				Err(e @ env::VarError::NotUnicode(_)) =>
					Err(StoreError::Backend {
						message: format!("Secret {var} is unreadable: {e}"),
					}),
			}
		})
	}
}
