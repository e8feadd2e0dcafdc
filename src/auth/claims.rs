//! Unverified claim decoding for three-segment bearer credentials.
//!
//! Nothing here checks signatures, expiry, audience, or issuer. Decoded claims are an identity
//! hint for quota accounting and role gating in front of a provider that re-validates the token;
//! they must never be treated as proof of identity on their own.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::_prelude::*;

pub(crate) const SEGMENT_SEPARATOR: char = '.';
pub(crate) const SEGMENT_COUNT: usize = 3;

const REALM_ACCESS: &str = "realm_access";
const RESOURCE_ACCESS: &str = "resource_access";
const REALM_MANAGEMENT: &str = "realm-management";

/// Failures raised while decoding the payload segment of a bearer credential.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Token does not split into exactly three segments.
	#[error("Malformed JWT token. Expected 3 dot-separated segments, found {found}.")]
	MalformedToken {
		/// Number of segments present.
		found: usize,
	},
	/// Payload segment is not unpadded base64url.
	#[error("Token payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// Payload segment is not a JSON object.
	#[error("Token payload is not a JSON object.")]
	Schema {
		/// JSON decoding failure.
		#[source]
		source: serde_json::Error,
	},
}

/// Claims mapping decoded from a token payload without signature verification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnverifiedClaims(Map<String, Value>);
impl UnverifiedClaims {
	/// Splits `token` on `.`, base64url-decodes the middle segment, and parses it as a JSON object.
	pub fn decode(token: &str) -> Result<Self, ClaimsError> {
		let segments = token.split(SEGMENT_SEPARATOR).collect::<Vec<_>>();

		if segments.len() != SEGMENT_COUNT {
			return Err(ClaimsError::MalformedToken { found: segments.len() });
		}

		let payload = URL_SAFE_NO_PAD.decode(segments[1])?;
		let claims = serde_json::from_slice(&payload)
			.map_err(|source| ClaimsError::Schema { source })?;

		Ok(Self(claims))
	}

	/// Returns the raw claim value for `name`.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.0.get(name)
	}

	/// Returns the `sub` claim when it is a non-empty string.
	pub fn subject(&self) -> Option<&str> {
		self.0.get("sub").and_then(Value::as_str).filter(|sub| !sub.is_empty())
	}

	/// Collects realm roles plus `realm-management` client roles.
	pub fn roles(&self) -> Vec<&str> {
		let realm = self.0.get(REALM_ACCESS);
		let management = self
			.0
			.get(RESOURCE_ACCESS)
			.and_then(|access| access.get(REALM_MANAGEMENT));

		[realm, management].into_iter().flatten().flat_map(role_names).collect()
	}

	/// Returns `true` when [`UnverifiedClaims::roles`] contains `role`.
	pub fn has_role(&self, role: &str) -> bool {
		self.roles().contains(&role)
	}

	/// Borrows the full claims mapping.
	pub fn as_map(&self) -> &Map<String, Value> {
		&self.0
	}
}

fn role_names(access: &Value) -> impl Iterator<Item = &str> {
	access
		.get("roles")
		.and_then(Value::as_array)
		.into_iter()
		.flatten()
		.filter_map(Value::as_str)
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn token(payload: &Value) -> String {
		format!(
			"{}.{}.signature",
			URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
			URL_SAFE_NO_PAD.encode(payload.to_string())
		)
	}

	#[test]
	fn decode_exposes_subject_and_raw_claims() {
		let claims = UnverifiedClaims::decode(&token(&json!({ "sub": "u-1", "azp": "gateway" })))
			.expect("Well-formed token should decode.");

		assert_eq!(claims.subject(), Some("u-1"));
		assert_eq!(claims.get("azp"), Some(&json!("gateway")));
		assert_eq!(claims.as_map().len(), 2);
	}

	#[test]
	fn decode_rejects_wrong_segment_counts() {
		let err = UnverifiedClaims::decode("only.two").expect_err("Two segments must be rejected.");

		assert!(matches!(err, ClaimsError::MalformedToken { found: 2 }));

		let err = UnverifiedClaims::decode("a.b.c.d").expect_err("Four segments must be rejected.");

		assert!(matches!(err, ClaimsError::MalformedToken { found: 4 }));
	}

	#[test]
	fn decode_rejects_invalid_base64() {
		let err = UnverifiedClaims::decode("head.!!!.sig")
			.expect_err("Non-base64url payload must be rejected.");

		assert!(matches!(err, ClaimsError::Encoding(_)));
	}

	#[test]
	fn decode_rejects_non_object_payloads() {
		let err = UnverifiedClaims::decode(&token(&json!(["sub", "u-1"])))
			.expect_err("Array payload must be rejected.");

		assert!(matches!(err, ClaimsError::Schema { .. }));
	}

	#[test]
	fn empty_or_non_string_subject_is_absent() {
		let empty = UnverifiedClaims::decode(&token(&json!({ "sub": "" })))
			.expect("Token with empty subject should decode.");
		let numeric = UnverifiedClaims::decode(&token(&json!({ "sub": 42 })))
			.expect("Token with numeric subject should decode.");

		assert_eq!(empty.subject(), None);
		assert_eq!(numeric.subject(), None);
	}

	#[test]
	fn roles_merge_realm_and_management_grants() {
		let claims = UnverifiedClaims::decode(&token(&json!({
			"realm_access": { "roles": ["offline_access"] },
			"resource_access": {
				"realm-management": { "roles": ["manage-users", 7] },
				"account": { "roles": ["view-profile"] }
			}
		})))
		.expect("Token with role claims should decode.");

		assert_eq!(claims.roles(), vec!["offline_access", "manage-users"]);
		assert!(claims.has_role("manage-users"));
		assert!(!claims.has_role("view-profile"));
	}
}
