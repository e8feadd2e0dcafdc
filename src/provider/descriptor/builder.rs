// self
use crate::{
	_prelude::*,
	auth::Secret,
	provider::{IdentityProvider, ProviderEndpoints},
};

/// Errors raised while constructing or validating provider descriptors.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum IdentityProviderError {
	/// Realm is mandatory.
	#[error("Missing realm.")]
	MissingRealm,
	/// Client id is mandatory.
	#[error("Missing client id.")]
	MissingClientId,
	/// Client secret is mandatory.
	#[error("Missing client secret.")]
	MissingClientSecret,
	/// Base URL cannot carry path segments.
	#[error("Provider base URL cannot be extended with path segments: {url}.")]
	CannotBeABase {
		/// Base URL that failed validation.
		url: String,
	},
}

/// Builder for [`IdentityProvider`] values.
#[derive(Debug)]
pub struct IdentityProviderBuilder {
	/// Provider base URL.
	pub base_url: Url,
	/// Realm name.
	pub realm: Option<String>,
	/// Confidential client id.
	pub client_id: Option<String>,
	/// Confidential client secret.
	pub client_secret: Option<Secret>,
}
impl IdentityProviderBuilder {
	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self { base_url, realm: None, client_id: None, client_secret: None }
	}

	/// Sets the realm.
	pub fn realm(mut self, realm: impl Into<String>) -> Self {
		self.realm = Some(realm.into());

		self
	}

	/// Sets the confidential client credentials.
	pub fn client(mut self, client_id: impl Into<String>, client_secret: Secret) -> Self {
		self.client_id = Some(client_id.into());
		self.client_secret = Some(client_secret);

		self
	}

	/// Consumes the builder and derives the provider endpoints.
	pub fn build(self) -> Result<IdentityProvider, IdentityProviderError> {
		let realm =
			self.realm.filter(|realm| !realm.is_empty()).ok_or(IdentityProviderError::MissingRealm)?;
		let client_id =
			self.client_id.filter(|id| !id.is_empty()).ok_or(IdentityProviderError::MissingClientId)?;
		let client_secret = self
			.client_secret
			.filter(|secret| !secret.is_empty())
			.ok_or(IdentityProviderError::MissingClientSecret)?;
		let endpoints = ProviderEndpoints {
			token: extend(
				&self.base_url,
				&["realms", &realm, "protocol", "openid-connect", "token"],
			)?,
			admin_users: extend(&self.base_url, &["admin", "realms", &realm, "users"])?,
		};

		Ok(IdentityProvider { base_url: self.base_url, realm, client_id, client_secret, endpoints })
	}
}

fn extend(base: &Url, segments: &[&str]) -> Result<Url, IdentityProviderError> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|_| IdentityProviderError::CannotBeABase { url: base.to_string() })?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}
