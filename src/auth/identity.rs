//! Caller identity resolution for quota accounting.
//!
//! A resolver walks an ordered list of [`IdentityStrategy`] values and keeps the first one that
//! yields a non-empty identity. The universal chain is bearer subject, then the login username on
//! `POST <login path>`, then the network origin.

// crates.io
use axum::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{UnverifiedClaims, bearer::bearer_credential},
};

/// Identity used when a request carries no network origin.
pub const UNKNOWN_ORIGIN: &str = "unknown";
/// Login route used by the default resolvers.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Request facts inspected by identity strategies.
#[derive(Clone, Copy, Debug)]
pub struct RequestFacts<'a> {
	/// HTTP method.
	pub method: &'a Method,
	/// Request path without the query string.
	pub path: &'a str,
	/// Raw `Authorization` header, when present and readable.
	pub authorization: Option<&'a str>,
	/// Buffered request body, when the resolver asked for it.
	pub body: Option<&'a [u8]>,
	/// Network origin of the caller.
	pub origin: Option<IpAddr>,
}

/// Single step in an identity resolution chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStrategy {
	/// `sub` claim of an unverified bearer credential.
	BearerSubject,
	/// `username` field of a JSON body on `POST <login path>`.
	LoginUsername,
	/// Caller's network address, or [`UNKNOWN_ORIGIN`] when absent.
	Origin,
}
impl IdentityStrategy {
	/// Stable label used in logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BearerSubject => "bearer_subject",
			Self::LoginUsername => "login_username",
			Self::Origin => "origin",
		}
	}
}

/// Resolved caller identity plus the strategy that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
	/// Identity string used in counter keys.
	pub value: String,
	/// Strategy that produced `value`.
	pub source: IdentityStrategy,
}
impl Display for CallerIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.value)
	}
}

/// Ordered identity resolution chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityResolver {
	strategies: Vec<IdentityStrategy>,
	login_path: String,
}
impl IdentityResolver {
	/// Builds a resolver from an explicit chain.
	pub fn new(strategies: Vec<IdentityStrategy>, login_path: impl Into<String>) -> Self {
		Self { strategies, login_path: login_path.into() }
	}

	/// Bearer subject, then login username, then origin.
	pub fn universal(login_path: impl Into<String>) -> Self {
		Self::new(
			vec![IdentityStrategy::BearerSubject, IdentityStrategy::LoginUsername, IdentityStrategy::Origin],
			login_path,
		)
	}

	/// Login username only; resolution fails when the body has none.
	pub fn login_only(login_path: impl Into<String>) -> Self {
		Self::new(vec![IdentityStrategy::LoginUsername], login_path)
	}

	/// Configured chain.
	pub fn strategies(&self) -> &[IdentityStrategy] {
		&self.strategies
	}

	/// Route whose body carries the login username.
	pub fn login_path(&self) -> &str {
		&self.login_path
	}

	/// Returns `true` when resolving this request needs the buffered body.
	pub fn needs_body(&self, method: &Method, path: &str) -> bool {
		self.strategies.contains(&IdentityStrategy::LoginUsername) && self.is_login(method, path)
	}

	/// Walks the chain and returns the first identity found.
	pub fn resolve(&self, facts: &RequestFacts) -> Option<CallerIdentity> {
		self.strategies.iter().find_map(|&source| {
			self.apply(source, facts).map(|value| CallerIdentity { value, source })
		})
	}

	fn apply(&self, strategy: IdentityStrategy, facts: &RequestFacts) -> Option<String> {
		match strategy {
			IdentityStrategy::BearerSubject => facts.authorization.and_then(bearer_subject),
			IdentityStrategy::LoginUsername if self.is_login(facts.method, facts.path) =>
				facts.body.and_then(login_username),
			IdentityStrategy::LoginUsername => None,
			IdentityStrategy::Origin => Some(
				facts.origin.map_or_else(|| UNKNOWN_ORIGIN.to_owned(), |origin| origin.to_string()),
			),
		}
	}

	fn is_login(&self, method: &Method, path: &str) -> bool {
		method == Method::POST && path == self.login_path
	}
}
impl Default for IdentityResolver {
	fn default() -> Self {
		Self::universal(DEFAULT_LOGIN_PATH)
	}
}

fn bearer_subject(header: &str) -> Option<String> {
	let credential = bearer_credential(header)?;

	UnverifiedClaims::decode(credential).ok()?.subject().map(str::to_owned)
}

fn login_username(body: &[u8]) -> Option<String> {
	#[derive(Deserialize)]
	struct LoginProbe {
		username: Option<String>,
	}

	serde_json::from_slice::<LoginProbe>(body)
		.ok()?
		.username
		.filter(|username| !username.is_empty())
}
