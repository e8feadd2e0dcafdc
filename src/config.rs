//! Environment-driven gateway configuration.

// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::ConfigError,
	limit::{FailureMode, RateLimitPolicy},
	offer::HostRewrites,
	provider::{IdentityProvider, ProvisioningAuth},
	proxy::CredentialEndpoints,
};

const DEFAULT_COUNTER_STORE_URL: &str = "redis://localhost:6379";
const DEFAULT_ISSUER_BASE_URL: &str = "http://localhost:7002";
const DEFAULT_VERIFIER_BASE_URL: &str = "http://localhost:7003";
const DEFAULT_LISTEN_PORT: u16 = 3000;

/// Everything the binary needs to assemble the gateway.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
	/// Socket the HTTP server binds.
	pub listen_addr: SocketAddr,
	/// Identity provider descriptor.
	pub provider: IdentityProvider,
	/// How user provisioning authenticates.
	pub provisioning: ProvisioningAuth,
	/// Redis-protocol URL of the shared counting store.
	pub counter_store_url: String,
	/// Bound applied to each counting-store hit.
	pub counter_store_timeout: StdDuration,
	/// Issuance and verification endpoints.
	pub credential_endpoints: CredentialEndpoints,
	/// Internal-to-external host mapping applied to offer references.
	pub host_rewrites: HostRewrites,
	/// Universal limiter policy.
	pub rate_limit: RateLimitPolicy,
	/// Bound applied to forwarding calls.
	pub upstream_timeout: StdDuration,
	/// Bound applied to the offer fetch.
	pub fetch_timeout: StdDuration,
}
impl GatewayConfig {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`; empty values count as unset.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Env(lookup);
		let provider = IdentityProvider::builder(env.url("KEYCLOAK_BASE_URL", None)?)
			.realm(env.required("REALM")?)
			.client(env.required("CLIENT_ID")?, Secret::new(env.required("CLIENT_SECRET")?))
			.build()?;
		let provisioning = match (env.optional("ADMIN_USERNAME"), env.optional("ADMIN_PASSWORD")) {
			(Some(username), Some(password)) =>
				ProvisioningAuth::ServiceAccount { username, password: Secret::new(password) },
			(None, None) => ProvisioningAuth::Delegated,
			(Some(_), None) => return Err(ConfigError::MissingVariable { name: "ADMIN_PASSWORD" }),
			(None, Some(_)) => return Err(ConfigError::MissingVariable { name: "ADMIN_USERNAME" }),
		};
		let credential_endpoints = CredentialEndpoints::new(
			&env.url("ISSUER_BASE_URL", Some(DEFAULT_ISSUER_BASE_URL))?,
			&env.url("VERIFIER_BASE_URL", Some(DEFAULT_VERIFIER_BASE_URL))?,
		)?;
		let host_rewrites = match env.optional("HOST_REWRITES") {
			Some(mapping) => HostRewrites::parse(&mapping)?,
			None => HostRewrites::default(),
		};
		let failure_mode = if env.parse("RATE_LIMIT_FAIL_OPEN", false)? {
			FailureMode::FailOpen
		} else {
			FailureMode::FailClosed
		};
		let rate_limit = RateLimitPolicy::per_path()
			.with_window(Duration::seconds(env.parse("RATE_LIMIT_WINDOW_SECS", 60)?))
			.with_quota(env.parse("RATE_LIMIT_QUOTA", 5)?)
			.with_failure_mode(failure_mode);

		rate_limit.validate()?;

		Ok(Self {
			listen_addr: env
				.parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)))?,
			provider,
			provisioning,
			counter_store_url: env
				.optional("VALKEY_URL")
				.unwrap_or_else(|| DEFAULT_COUNTER_STORE_URL.to_owned()),
			counter_store_timeout: StdDuration::from_millis(env.parse("VALKEY_TIMEOUT_MS", 2_000)?),
			credential_endpoints,
			host_rewrites,
			rate_limit,
			upstream_timeout: StdDuration::from_secs(env.parse("UPSTREAM_TIMEOUT_SECS", 10)?),
			fetch_timeout: StdDuration::from_secs(env.parse("FETCH_TIMEOUT_SECS", 10)?),
		})
	}
}

struct Env<F>(F);
impl<F> Env<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn optional(&self, name: &str) -> Option<String> {
		(self.0)(name).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
	}

	fn required(&self, name: &'static str) -> Result<String, ConfigError> {
		self.optional(name).ok_or(ConfigError::MissingVariable { name })
	}

	fn url(&self, name: &'static str, default: Option<&str>) -> Result<Url, ConfigError> {
		let raw = match (self.optional(name), default) {
			(Some(raw), _) => raw,
			(None, Some(default)) => default.to_owned(),
			(None, None) => return Err(ConfigError::MissingVariable { name }),
		};

		Url::parse(&raw)
			.map_err(|e| ConfigError::InvalidVariable { name, reason: e.to_string() })
	}

	fn parse<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
	where
		T: FromStr,
		T::Err: Display,
	{
		match self.optional(name) {
			Some(raw) => raw
				.parse()
				.map_err(|e: T::Err| ConfigError::InvalidVariable { name, reason: e.to_string() }),
			None => Ok(default),
		}
	}
}
