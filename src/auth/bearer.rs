//! `Authorization` header shape checks.
//!
//! [`validate_bearer_presence`] only proves that the header looks like
//! `Bearer <a>.<b>.<c>`. It is not authentication: any syntactically well-formed credential passes,
//! and downstream services remain responsible for verifying it.

// self
use crate::{
	_prelude::*,
	auth::{
		Secret, UnverifiedClaims,
		claims::{ClaimsError, SEGMENT_COUNT, SEGMENT_SEPARATOR},
	},
};

/// Scheme token expected in front of the credential.
pub const BEARER_SCHEME: &str = "Bearer";

/// Reasons a header fails the bearer shape check.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum BearerError {
	/// Header is absent or empty.
	#[error("Authorization token is missing in the header.")]
	MissingHeader,
	/// Header is not exactly `Bearer <credential>`.
	#[error("Invalid Authorization token format. Ensure the token is a Bearer token.")]
	MalformedScheme,
	/// Credential does not have three dot-separated segments.
	#[error("Malformed JWT token. Ensure the token is correctly generated.")]
	MalformedToken,
}

/// Bearer credential that passed the shape check. Formatting is redacted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BearerToken(Secret);
impl BearerToken {
	/// Returns the raw credential. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		self.0.expose()
	}

	/// Decodes the credential's claims without verifying it.
	pub fn claims(&self) -> Result<UnverifiedClaims, ClaimsError> {
		UnverifiedClaims::decode(self.expose())
	}

	/// Rebuilds the `Authorization` header value for forwarding.
	pub fn authorization_value(&self) -> String {
		format!("{BEARER_SCHEME} {}", self.expose())
	}
}

/// Checks that `header` is `Bearer <a>.<b>.<c>` and returns the credential.
pub fn validate_bearer_presence(header: Option<&str>) -> Result<BearerToken, BearerError> {
	let header = header.filter(|value| !value.is_empty()).ok_or(BearerError::MissingHeader)?;
	let mut parts = header.split(' ');
	let (Some(scheme), Some(credential), None) = (parts.next(), parts.next(), parts.next()) else {
		return Err(BearerError::MalformedScheme);
	};

	if scheme != BEARER_SCHEME {
		return Err(BearerError::MalformedScheme);
	}
	if credential.split(SEGMENT_SEPARATOR).count() != SEGMENT_COUNT {
		return Err(BearerError::MalformedToken);
	}

	Ok(BearerToken(Secret::new(credential)))
}

/// Returns the text after `Bearer ` without any shape check.
pub fn bearer_credential(header: &str) -> Option<&str> {
	header
		.strip_prefix(BEARER_SCHEME)
		.and_then(|rest| rest.strip_prefix(' '))
		.filter(|credential| !credential.is_empty())
}
