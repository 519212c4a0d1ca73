//! Observability helpers for token and search operations.
//!
//! Every public operation runs inside a span named `cmr_broker.op` carrying the `op` (operation)
//! and `stage` (call site) fields.
//!
//! # Feature Flags
//!
//! - Enable `metrics` to increment the `cmr_broker_op_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationKind {
	/// Launchpad token acquisition (cache or service).
	LaunchpadToken,
	/// Launchpad token validation.
	LaunchpadValidate,
	/// Earthdata Login token listing.
	EarthdataRetrieve,
	/// Earthdata Login token creation.
	EarthdataCreate,
	/// Earthdata Login token revocation.
	EarthdataRevoke,
	/// Paginated CMR search.
	Search,
}
impl OperationKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationKind::LaunchpadToken => "launchpad_token",
			OperationKind::LaunchpadValidate => "launchpad_validate",
			OperationKind::EarthdataRetrieve => "earthdata_retrieve",
			OperationKind::EarthdataCreate => "earthdata_create",
			OperationKind::EarthdataRevoke => "earthdata_revoke",
			OperationKind::Search => "search",
		}
	}
}
impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}

	/// Maps a result onto [`Outcome::Success`] or [`Outcome::Failure`].
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		match result {
			Ok(_) => Outcome::Success,
			Err(_) => Outcome::Failure,
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an [`OpSpan`], recording the attempt and its outcome.
pub async fn observe<T, E, Fut>(kind: OperationKind, stage: &'static str, fut: Fut) -> Result<T, E>
where
	Fut: Future<Output = Result<T, E>>,
{
	let span = OpSpan::new(kind, stage);

	record_outcome(kind, Outcome::Attempt);

	let result = span.instrument(fut).await;

	record_outcome(kind, Outcome::of(&result));

	result
}
