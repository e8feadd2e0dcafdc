//! Local user records and the payloads that create or change them.

// crates.io
use uuid::Uuid;
// self
use crate::{_prelude::*, auth::Secret};

const USERNAME_LEN: (usize, usize) = (3, 32);
const NAME_LEN: (usize, usize) = (1, 50);
const PASSWORD_MIN_LEN: usize = 6;

/// Mutable part of a user record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Login name.
	pub username: String,
	/// Contact address.
	#[serde(default)]
	pub email: String,
	/// Given name.
	#[serde(default, rename = "firstName", alias = "firstname")]
	pub first_name: String,
	/// Family name.
	#[serde(default, rename = "lastName", alias = "lastname")]
	pub last_name: String,
}

/// User record kept by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
	/// Record identifier.
	pub id: Uuid,
	/// Profile fields.
	#[serde(flatten)]
	pub profile: UserProfile,
}
impl UserRecord {
	/// Creates a record with a fresh random id.
	pub fn new(profile: UserProfile) -> Self {
		Self { id: Uuid::new_v4(), profile }
	}
}

/// Login payload accepted by `POST /login`.
#[derive(Clone, Debug, Deserialize)]
pub struct LoginRequest {
	/// Login name forwarded to the provider.
	pub username: String,
	/// Password forwarded to the provider.
	pub password: Secret,
	/// Given name used when the local record is created on first login.
	#[serde(default, alias = "firstname", rename = "firstName")]
	pub first_name: String,
	/// Family name used when the local record is created on first login.
	#[serde(default, alias = "lastname", rename = "lastName")]
	pub last_name: String,
	/// Contact address used when the local record is created on first login.
	#[serde(default)]
	pub email: String,
}
impl LoginRequest {
	/// Profile recorded when the user logs in for the first time.
	pub fn profile(&self) -> UserProfile {
		UserProfile {
			username: self.username.clone(),
			email: self.email.clone(),
			first_name: self.first_name.clone(),
			last_name: self.last_name.clone(),
		}
	}
}

/// Registration payload accepted by `POST /users`.
#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationRequest {
	/// Profile fields.
	#[serde(flatten)]
	pub profile: UserProfile,
	/// Initial password.
	pub password: Secret,
}
impl RegistrationRequest {
	/// Checks field lengths and the email shape.
	pub fn validate(&self) -> Result<()> {
		let profile = &self.profile;

		check_len("username", &profile.username, USERNAME_LEN)?;
		check_len("firstName", &profile.first_name, NAME_LEN)?;
		check_len("lastName", &profile.last_name, NAME_LEN)?;

		if self.password.expose().chars().count() < PASSWORD_MIN_LEN {
			return Err(Error::invalid_payload(format!(
				"password must be at least {PASSWORD_MIN_LEN} characters"
			)));
		}
		if !is_email(&profile.email) {
			return Err(Error::invalid_payload("email is not a valid address"));
		}

		Ok(())
	}
}

fn check_len(field: &str, value: &str, (min, max): (usize, usize)) -> Result<()> {
	let len = value.chars().count();

	if len < min || len > max {
		return Err(Error::invalid_payload(format!(
			"{field} must be between {min} and {max} characters"
		)));
	}

	Ok(())
}

fn is_email(value: &str) -> bool {
	let Some((local, domain)) = value.split_once('@') else { return false };

	!local.is_empty()
		&& !domain.contains('@')
		&& domain.split('.').count() >= 2
		&& domain.split('.').all(|label| !label.is_empty())
		&& !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn registration(payload: serde_json::Value) -> RegistrationRequest {
		serde_json::from_value(payload).expect("Registration fixture should deserialize.")
	}

	#[test]
	fn registration_accepts_both_name_spellings() {
		let camel = registration(json!({
			"username": "alice", "password": "secret1", "email": "a@example.com",
			"firstName": "Alice", "lastName": "Liddell"
		}));
		let lower = registration(json!({
			"username": "alice", "password": "secret1", "email": "a@example.com",
			"firstname": "Alice", "lastname": "Liddell"
		}));

		assert_eq!(camel.profile, lower.profile);
		assert!(camel.validate().is_ok());
	}

	#[test]
	fn registration_rejects_out_of_range_fields() {
		let base = json!({
			"username": "alice", "password": "secret1", "email": "a@example.com",
			"firstName": "Alice", "lastName": "Liddell"
		});
		let cases = [
			("username", json!("al")),
			("username", json!("a".repeat(33))),
			("password", json!("short")),
			("email", json!("not-an-email")),
			("email", json!("a@b")),
			("firstName", json!("")),
			("lastName", json!("x".repeat(51))),
		];

		for (field, value) in cases {
			let mut payload = base.clone();

			payload[field] = value;

			let err = registration(payload).validate().expect_err("Invalid field must be rejected.");

			assert!(matches!(err, Error::InvalidPayload { .. }), "{field} should be rejected.");
		}
	}

	#[test]
	fn record_serializes_flat_with_camel_case_names() {
		let record = UserRecord::new(UserProfile {
			username: "alice".into(),
			email: "a@example.com".into(),
			first_name: "Alice".into(),
			last_name: "Liddell".into(),
		});
		let value = serde_json::to_value(&record).expect("User record should serialize.");

		assert_eq!(value["username"], "alice");
		assert_eq!(value["firstName"], "Alice");
		assert_eq!(value["id"], record.id.to_string());
	}

	#[test]
	fn login_request_redacts_password() {
		let request: LoginRequest =
			serde_json::from_value(json!({ "username": "alice", "password": "hunter22" }))
				.expect("Login fixture should deserialize.");

		assert!(!format!("{request:?}").contains("hunter22"));
		assert_eq!(request.profile().username, "alice");
	}
}
