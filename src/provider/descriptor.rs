//! Identity provider descriptor: realm, client credentials, and the endpoints derived from them.

/// Builder API for assembling provider descriptors.
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, auth::Secret};

/// Endpoints derived from the provider base URL and realm.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderEndpoints {
	/// `<base>/realms/<realm>/protocol/openid-connect/token`.
	pub token: Url,
	/// `<base>/admin/realms/<realm>/users`.
	pub admin_users: Url,
}

/// Immutable identity provider descriptor consumed by the token gateway.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentityProvider {
	/// Provider base URL.
	pub base_url: Url,
	/// Realm name.
	pub realm: String,
	/// Confidential client id used for password grants.
	pub client_id: String,
	/// Confidential client secret used for password grants.
	pub client_secret: Secret,
	/// Derived endpoints.
	pub endpoints: ProviderEndpoints,
}
impl IdentityProvider {
	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> IdentityProviderBuilder {
		IdentityProviderBuilder::new(base_url)
	}
}
