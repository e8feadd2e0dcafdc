//! HTTP surface: shared state, router, middleware, and error rendering.
//!
//! Every route passes the universal quota guard. `/login` can additionally pass a login-only
//! guard, and the user read/update/delete routes require a well-formed bearer header.

mod handlers;
mod middleware;
mod response;

pub use middleware::{QuotaGuard, RequireBearer};

// crates.io
use axum::{
	Router,
	middleware::from_fn_with_state,
	routing::{get, post},
};
// self
use crate::{
	_prelude::*,
	auth::IdentityResolver,
	config::GatewayConfig,
	error::ConfigError,
	http::UpstreamClient,
	limit::RateLimiter,
	offer::OfferUriRewriter,
	provider::TokenGateway,
	proxy::CredentialProxy,
	store::{CounterStore, UserStore},
};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
	/// Login relay and user provisioning.
	pub gateway: Arc<TokenGateway>,
	/// Credential issuance, verification, and onboarding.
	pub proxy: Arc<CredentialProxy>,
	/// Local user records.
	pub users: Arc<dyn UserStore>,
	/// Universal quota guard.
	pub quota: Arc<QuotaGuard>,
	/// Optional extra guard on `POST /login`.
	pub login_quota: Option<Arc<QuotaGuard>>,
}
impl AppState {
	/// Assembles the gateway from `config` over the given stores.
	pub fn from_config(
		config: &GatewayConfig,
		counters: Arc<dyn CounterStore>,
		users: Arc<dyn UserStore>,
	) -> Result<Self, ConfigError> {
		let http = UpstreamClient::with_client(ReqwestClient::builder().build()?)
			.with_call_timeout(config.upstream_timeout);
		let gateway = TokenGateway::new(config.provider.clone(), http.clone(), users.clone())
			.with_provisioning(config.provisioning.clone());
		let proxy = CredentialProxy::new(config.credential_endpoints.clone(), http)
			.with_rewriter(OfferUriRewriter::new(config.host_rewrites.clone()))
			.with_fetch_timeout(config.fetch_timeout);
		let quota = QuotaGuard::new(
			IdentityResolver::default(),
			RateLimiter::new(counters, config.rate_limit.clone()),
		);

		Ok(Self::new(gateway, proxy, users, quota))
	}

	/// Wraps already-built components.
	pub fn new(
		gateway: TokenGateway,
		proxy: CredentialProxy,
		users: Arc<dyn UserStore>,
		quota: QuotaGuard,
	) -> Self {
		Self {
			gateway: Arc::new(gateway),
			proxy: Arc::new(proxy),
			users,
			quota: Arc::new(quota),
			login_quota: None,
		}
	}

	/// Adds a login-only guard in front of `POST /login`.
	pub fn with_login_quota(mut self, guard: QuotaGuard) -> Self {
		self.login_quota = Some(Arc::new(guard));

		self
	}
}

impl Debug for AppState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppState")
			.field("gateway", &self.gateway)
			.field("proxy", &self.proxy)
			.field("quota", &self.quota)
			.field("login_quota", &self.login_quota)
			.finish_non_exhaustive()
	}
}

/// Builds the gateway router.
pub fn router(state: AppState) -> Router {
	let mut login = post(handlers::login);

	if let Some(guard) = state.login_quota.clone() {
		login = login.layer(from_fn_with_state(guard, middleware::enforce_quota));
	}

	Router::new()
		.route("/health", get(handlers::health))
		.route("/login", login)
		.route("/users", get(handlers::list_users).post(handlers::register_user))
		.route(
			"/users/{id}",
			get(handlers::get_user).put(handlers::update_user).delete(handlers::delete_user),
		)
		.route("/credential/issue", post(handlers::issue_credential))
		.route("/credential/verify", post(handlers::verify_credential))
		.route("/credential/onboard", post(handlers::onboard_issuer))
		.layer(from_fn_with_state(state.quota.clone(), middleware::enforce_quota))
		.with_state(state)
}
