//! Credential brokering and limit-bounded paginated search for the NASA Common Metadata
//! Repository (CMR).
//!
//! Tokens come from one of three places: a literal bearer value, Earthdata Login (username +
//! password, see [`earthdata`]), or the Launchpad PKI token service (see [`launchpad`], cached in
//! an object store). [`cmr::CmrClient`] resolves a token once per logical request and hands the
//! resulting headers to the [`search`] engine, which walks pages until the server-reported hit
//! count or the caller's record limit is reached.
//!
//! Object storage, secrets, and HTTPS are reached through the [`storage::ObjectStore`],
//! [`secrets::SecretStore`], and [`http::HttpTransport`] seams so callers can bring their own
//! cloud SDKs.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod certificate;
pub mod cmr;
pub mod config;
pub mod earthdata;
pub mod error;
pub mod http;
pub mod launchpad;
pub mod obs;
pub mod search;
pub mod secret;
pub mod secrets;
pub mod storage;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::{
		error::{Error, Result},
		secret::Secret,
	};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
