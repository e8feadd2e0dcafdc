//! Gateway-level error types shared across the limiter, the token gateway, and the credential
//! proxy.

// crates.io
use axum::http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{BearerError, ClaimsError},
	offer::OfferError,
	store::StoreError,
};

/// Gateway-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical gateway error exposed by public APIs and rendered by the HTTP surface.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Bearer header failed the shape check.
	#[error(transparent)]
	Bearer(#[from] BearerError),
	/// Unverified token claims could not be decoded.
	#[error(transparent)]
	Claims(#[from] ClaimsError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout) while calling a backing service.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// User-record store failure.
	#[error("User store failure: {0}")]
	Storage(#[from] StoreError),

	/// Request body or parameters are unusable.
	#[error("Invalid request payload: {reason}.")]
	InvalidPayload {
		/// Human-readable explanation of the rejected input.
		reason: String,
	},
	/// Caller is identified but lacks a required role.
	#[error("Authorization error: {reason}.")]
	Forbidden {
		/// Human-readable explanation of the missing permission.
		reason: String,
	},
	/// Requested resource does not exist.
	#[error("{resource} not found.")]
	NotFound {
		/// Resource label (for example `User`).
		resource: &'static str,
	},
	/// Caller exhausted its quota for the current window.
	#[error("Too many requests. Please try again later.")]
	RateLimited {
		/// Time left until the window closes, when the counting store reports it.
		retry_after: Option<Duration>,
	},
	/// Counting store could not be reached while the limiter fails closed.
	#[error("Rate limiter error.")]
	LimiterUnavailable {
		/// Underlying store failure.
		#[source]
		source: StoreError,
	},
	/// Backing service answered with a non-success status.
	#[error("The {service} returned status {status}: {body}")]
	Upstream {
		/// Backing service label.
		service: &'static str,
		/// HTTP status returned upstream.
		status: u16,
		/// Raw upstream body kept for diagnostics.
		body: String,
	},
	/// Identity provider rejected a login grant.
	#[error("Identity provider rejected the credentials: {body}")]
	UpstreamRejected {
		/// HTTP status returned by the provider.
		status: u16,
		/// Raw provider body kept for diagnostics.
		body: String,
	},
	/// Identity provider refused to create a user.
	#[error("Identity provider refused user provisioning with status {status}: {body}")]
	ProvisioningRejected {
		/// HTTP status returned by the provider.
		status: u16,
		/// Raw provider body kept for diagnostics.
		body: String,
	},
	/// Issuance service answered with something that is not a usable credential offer.
	#[error("Invalid offer URL: {source}")]
	InvalidOfferResponse {
		/// Rewrite failure.
		#[source]
		source: OfferError,
	},
	/// Issuance succeeded but the offer endpoint refused the follow-up fetch.
	#[error("Credential fetch failed: status {status}, body: {body}")]
	CredentialFetchUnauthorized {
		/// HTTP status returned by the offer endpoint.
		status: u16,
		/// Raw offer endpoint body kept for diagnostics.
		body: String,
	},
}
impl Error {
	/// Shorthand for [`Error::InvalidPayload`].
	pub fn invalid_payload(reason: impl Into<String>) -> Self {
		Self::InvalidPayload { reason: reason.into() }
	}

	/// HTTP status that best reflects the error class.
	pub fn status_code(&self) -> StatusCode {
		match self {
			Self::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
			Self::Bearer(_)
			| Self::Claims(_)
			| Self::UpstreamRejected { .. }
			| Self::CredentialFetchUnauthorized { .. } => StatusCode::UNAUTHORIZED,
			Self::Forbidden { .. } => StatusCode::FORBIDDEN,
			Self::NotFound { .. } => StatusCode::NOT_FOUND,
			Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
			Self::ProvisioningRejected { status, .. } => match *status {
				401 => StatusCode::UNAUTHORIZED,
				403 => StatusCode::FORBIDDEN,
				400..=499 => StatusCode::BAD_REQUEST,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			},
			Self::Config(_)
			| Self::Transport(_)
			| Self::Storage(_)
			| Self::LimiterUnavailable { .. }
			| Self::Upstream { .. }
			| Self::InvalidOfferResponse { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

/// Configuration and validation failures raised while assembling the gateway.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A required environment variable is absent or empty.
	#[error("Environment variable `{name}` is required.")]
	MissingVariable {
		/// Variable name.
		name: &'static str,
	},
	/// An environment variable holds an unusable value.
	#[error("Environment variable `{name}` is invalid: {reason}.")]
	InvalidVariable {
		/// Variable name.
		name: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// A configured URL cannot be parsed or extended.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
	},
	/// Identity provider descriptor failed validation.
	#[error(transparent)]
	Provider(#[from] crate::provider::IdentityProviderError),
	/// Host rewrite mapping is malformed.
	#[error("Host rewrite entry `{entry}` must look like `internal=external`.")]
	InvalidHostRewrite {
		/// Offending entry.
		entry: String,
	},
	/// Rate limit policy is unusable.
	#[error("Rate limit policy is invalid: {reason}.")]
	InvalidRateLimit {
		/// Why the policy was rejected.
		reason: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts) raised while forwarding.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// The call exceeded its configured bound.
	#[error("Request to the {service} timed out.")]
	Timeout {
		/// Backing service label.
		service: &'static str,
	},
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {service}.")]
	Network {
		/// Backing service label.
		service: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		service: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { service, source: Box::new(src) }
	}

	pub(crate) fn from_reqwest(service: &'static str, err: ReqwestError) -> Self {
		if err.is_timeout() { Self::Timeout { service } } else { Self::network(service, err) }
	}
}
