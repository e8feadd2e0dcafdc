//! Password-grant relay and user provisioning against the identity provider.

// crates.io
use serde::de::IgnoredAny;
use serde_json::json;
// self
use crate::{
	_prelude::*,
	auth::{BEARER_SCHEME, Secret, validate_bearer_presence},
	http::{UpstreamClient, UpstreamResponse},
	obs::{self, GatewayOp, OpOutcome, OpSpan},
	provider::IdentityProvider,
	store::UserStore,
	user::{LoginRequest, RegistrationRequest, UserRecord},
};

const SERVICE: &str = "identity provider";
const MANAGE_USERS_ROLE: &str = "manage-users";
const ADMIN_TOKEN_LEEWAY: Duration = Duration::seconds(30);
const ADMIN_TOKEN_FALLBACK_TTL: Duration = Duration::seconds(60);

/// How the gateway authenticates user-provisioning calls.
#[derive(Clone, Debug)]
pub enum ProvisioningAuth {
	/// Password grant with a dedicated admin account; the token is cached until shortly before it
	/// expires.
	ServiceAccount {
		/// Admin login name.
		username: String,
		/// Admin password.
		password: Secret,
	},
	/// Caller's own bearer token, which must carry the `manage-users` role.
	Delegated,
}

#[derive(Clone, Debug)]
struct CachedAdminToken {
	access_token: Secret,
	expires_at: OffsetDateTime,
}

#[derive(Deserialize)]
struct AdminTokenResponse {
	access_token: Secret,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// Relays logins and provisions users at the identity provider.
#[derive(Clone)]
pub struct TokenGateway {
	provider: IdentityProvider,
	http: UpstreamClient,
	users: Arc<dyn UserStore>,
	provisioning: ProvisioningAuth,
	admin_token: Arc<AsyncMutex<Option<CachedAdminToken>>>,
}
impl TokenGateway {
	/// Creates a gateway that provisions users with the caller's own token.
	pub fn new(provider: IdentityProvider, http: UpstreamClient, users: Arc<dyn UserStore>) -> Self {
		Self {
			provider,
			http,
			users,
			provisioning: ProvisioningAuth::Delegated,
			admin_token: Arc::new(AsyncMutex::new(None)),
		}
	}

	/// Overrides how provisioning calls authenticate.
	pub fn with_provisioning(mut self, provisioning: ProvisioningAuth) -> Self {
		self.provisioning = provisioning;

		self
	}

	/// Provider descriptor.
	pub fn provider(&self) -> &IdentityProvider {
		&self.provider
	}

	/// Exchanges username/password at the provider and returns its JSON response untouched.
	///
	/// A local user record is created on the first successful login.
	pub async fn login(&self, request: LoginRequest) -> Result<UpstreamResponse> {
		const OP: GatewayOp = GatewayOp::Login;

		let span = OpSpan::new(OP, "login");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				let response = self.password_grant(&request.username, &request.password).await?;

				if !response.is_ok() {
					return Err(Error::UpstreamRejected {
						status: response.status,
						body: response.text(),
					});
				}

				serde_json::from_slice::<IgnoredAny>(&response.body).map_err(|_| {
					Error::Upstream {
						service: SERVICE,
						status: response.status,
						body: response.text(),
					}
				})?;
				span.record_stage("ensure_user_record");
				self.ensure_user_record(&request).await?;

				Ok(response)
			})
			.await;

		record_result(OP, &result);

		result
	}

	/// Validates `request`, creates the user at the provider, then stores a local record.
	///
	/// `authorization` is the caller's raw `Authorization` header; it is only consulted when
	/// provisioning is [`ProvisioningAuth::Delegated`].
	pub async fn register_user(
		&self,
		request: RegistrationRequest,
		authorization: Option<&str>,
	) -> Result<UserRecord> {
		const OP: GatewayOp = GatewayOp::RegisterUser;

		let span = OpSpan::new(OP, "register_user");

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span
			.instrument(async {
				request.validate()?;

				let admin = self.admin_authorization(authorization).await?;
				let profile = &request.profile;
				let payload = json!({
					"username": profile.username,
					"email": profile.email,
					"enabled": true,
					"firstName": profile.first_name,
					"lastName": profile.last_name,
					"credentials": [{
						"type": "password",
						"value": request.password.expose(),
						"temporary": false,
					}],
				});

				span.record_stage("provision");

				let response = self
					.http
					.post_json(SERVICE, &self.provider.endpoints.admin_users, &payload, Some(&admin))
					.await?;

				if !response.is_accepted() {
					return Err(Error::ProvisioningRejected {
						status: response.status,
						body: response.text(),
					});
				}

				span.record_stage("store_record");

				Ok(self.users.insert(UserRecord::new(profile.clone())).await?)
			})
			.await;

		record_result(OP, &result);

		result
	}

	async fn password_grant(&self, username: &str, password: &Secret) -> Result<UpstreamResponse> {
		let form = [
			("client_id", self.provider.client_id.as_str()),
			("client_secret", self.provider.client_secret.expose()),
			("grant_type", "password"),
			("username", username),
			("password", password.expose()),
		];

		Ok(self.http.post_form(SERVICE, &self.provider.endpoints.token, &form).await?)
	}

	async fn ensure_user_record(&self, request: &LoginRequest) -> Result<()> {
		self.users.insert_if_absent(UserRecord::new(request.profile())).await?;

		Ok(())
	}

	async fn admin_authorization(&self, caller: Option<&str>) -> Result<String> {
		match &self.provisioning {
			ProvisioningAuth::Delegated => {
				let token = validate_bearer_presence(caller)?;

				if !token.claims()?.has_role(MANAGE_USERS_ROLE) {
					return Err(Error::Forbidden {
						reason: format!("the caller lacks the `{MANAGE_USERS_ROLE}` role"),
					});
				}

				Ok(token.authorization_value())
			},
			ProvisioningAuth::ServiceAccount { username, password } => {
				let token = self.service_account_token(username, password).await?;

				Ok(format!("{BEARER_SCHEME} {}", token.expose()))
			},
		}
	}

	async fn service_account_token(&self, username: &str, password: &Secret) -> Result<Secret> {
		// Concurrent registrations share one grant.
		let mut cached = self.admin_token.lock().await;
		let now = OffsetDateTime::now_utc();

		if let Some(token) =
			cached.as_ref().filter(|token| token.expires_at - now > ADMIN_TOKEN_LEEWAY)
		{
			return Ok(token.access_token.clone());
		}

		let response = self.password_grant(username, password).await?;

		if !response.is_ok() {
			return Err(Error::Upstream {
				service: SERVICE,
				status: response.status,
				body: response.text(),
			});
		}

		let deserializer = &mut serde_json::Deserializer::from_slice(&response.body);
		let parsed: AdminTokenResponse =
			serde_path_to_error::deserialize(deserializer).map_err(|e| Error::Upstream {
				service: SERVICE,
				status: response.status,
				body: format!("admin token response is invalid at `{}`: {}", e.path(), e.inner()),
			})?;
		let ttl = parsed.expires_in.map_or(ADMIN_TOKEN_FALLBACK_TTL, Duration::seconds);
		// Out-of-range lifetimes fall back to the default.
		let expires_at = now.checked_add(ttl).unwrap_or(now + ADMIN_TOKEN_FALLBACK_TTL);

		*cached = Some(CachedAdminToken { access_token: parsed.access_token.clone(), expires_at });

		Ok(parsed.access_token)
	}
}
impl Debug for TokenGateway {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenGateway")
			.field("provider", &self.provider)
			.field("provisioning", &self.provisioning)
			.finish_non_exhaustive()
	}
}

fn record_result<T>(op: GatewayOp, result: &Result<T>) {
	let outcome = match result {
		Ok(_) => OpOutcome::Success,
		Err(Error::Forbidden { .. } | Error::Bearer(_) | Error::InvalidPayload { .. }) =>
			OpOutcome::Rejected,
		Err(_) => OpOutcome::Failure,
	};

	obs::record_op_outcome(op, outcome);
}
