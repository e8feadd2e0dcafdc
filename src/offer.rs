//! Credential-offer URI parsing and internal-host rewriting.
//!
//! Issuance services answer with `openid-credential-offer://<host>[:<port>]?credential_offer_uri=<url>`.
//! Inside a container network both the outer authority and the nested URL usually point at an
//! internal hostname; [`OfferUriRewriter`] maps those to hosts the gateway can reach.

// self
use crate::{_prelude::*, error::ConfigError};

/// Literal prefix every offer reference starts with.
pub const OFFER_SCHEME_PREFIX: &str = "openid-credential-offer://";
/// Query parameter carrying the nested offer URL.
pub const OFFER_URI_PARAM: &str = "credential_offer_uri";

/// Failures raised while parsing an offer reference.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum OfferError {
	/// Input does not start with [`OFFER_SCHEME_PREFIX`].
	#[error("Offer reference must start with `openid-credential-offer://`.")]
	InvalidScheme,
	/// Authority and query after the prefix do not parse.
	#[error("Offer reference is not a valid URI.")]
	InvalidUri(#[source] url::ParseError),
	/// Query lacks a non-empty [`OFFER_URI_PARAM`].
	#[error("Offer reference has no `credential_offer_uri` parameter.")]
	MissingOfferUri,
	/// Nested offer URL does not parse or cannot take the rewritten host.
	#[error("Nested credential offer URI is invalid.")]
	InvalidOfferUri(#[source] url::ParseError),
}

/// Ordered `internal → external` host mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostRewrites(Vec<(String, String)>);
impl HostRewrites {
	/// Mapping with no entries.
	pub fn none() -> Self {
		Self(Vec::new())
	}

	/// Adds an entry; earlier entries win.
	pub fn with(mut self, internal: impl Into<String>, external: impl Into<String>) -> Self {
		self.0.push((internal.into(), external.into()));

		self
	}

	/// Parses `internal=external` entries separated by commas.
	pub fn parse(mapping: &str) -> Result<Self, ConfigError> {
		mapping.split(',').map(str::trim).filter(|entry| !entry.is_empty()).try_fold(
			Self::none(),
			|rewrites, entry| match entry.split_once('=') {
				Some((internal, external))
					if !internal.trim().is_empty() && !external.trim().is_empty() =>
					Ok(rewrites.with(internal.trim(), external.trim())),
				_ => Err(ConfigError::InvalidHostRewrite { entry: entry.to_owned() }),
			},
		)
	}

	/// Rewritten host for `host`, when any entry matches.
	pub fn rewrite_host(&self, host: &str) -> Option<String> {
		self.0
			.iter()
			.find(|(internal, _)| host.contains(internal.as_str()))
			.map(|(internal, external)| host.replacen(internal.as_str(), external, 1))
	}

	fn apply(&self, url: &mut Url) -> Result<(), url::ParseError> {
		match url.host_str().and_then(|host| self.rewrite_host(host)) {
			Some(host) => url.set_host(Some(&host)),
			None => Ok(()),
		}
	}
}
impl Default for HostRewrites {
	fn default() -> Self {
		Self::none().with("host.docker.internal", "localhost")
	}
}

/// Parsed offer reference with both URLs already rewritten.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfferReference {
	/// Outer authority, parsed as `http://<host>[:<port>]?...`.
	pub issuer: Url,
	/// Nested offer URL to fetch.
	pub offer_uri: Url,
}

/// Pure parser/rewriter for offer references.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OfferUriRewriter {
	rewrites: HostRewrites,
}
impl OfferUriRewriter {
	/// Creates a rewriter over `rewrites`.
	pub fn new(rewrites: HostRewrites) -> Self {
		Self { rewrites }
	}

	/// Active mapping.
	pub fn rewrites(&self) -> &HostRewrites {
		&self.rewrites
	}

	/// Parses `raw` and rewrites the outer authority and the nested offer URL.
	pub fn parse(&self, raw: &str) -> Result<OfferReference, OfferError> {
		let remainder =
			raw.trim().strip_prefix(OFFER_SCHEME_PREFIX).ok_or(OfferError::InvalidScheme)?;
		let mut issuer =
			Url::parse(&format!("http://{remainder}")).map_err(OfferError::InvalidUri)?;

		self.rewrites.apply(&mut issuer).map_err(OfferError::InvalidUri)?;

		let nested = issuer
			.query_pairs()
			.find(|(name, _)| name == OFFER_URI_PARAM)
			.map(|(_, value)| value.into_owned())
			.filter(|value| !value.is_empty())
			.ok_or(OfferError::MissingOfferUri)?;
		let mut offer_uri = Url::parse(&nested).map_err(OfferError::InvalidOfferUri)?;

		self.rewrites.apply(&mut offer_uri).map_err(OfferError::InvalidOfferUri)?;

		Ok(OfferReference { issuer, offer_uri })
	}

	/// Returns the rewritten nested offer URL as a string.
	pub fn rewrite(&self, raw: &str) -> Result<String, OfferError> {
		self.parse(raw).map(|reference| reference.offer_uri.into())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const DOCKER_OFFER: &str = "openid-credential-offer://host.docker.internal:9000?credential_offer_uri=http%3A%2F%2Fhost.docker.internal%3A9000%2Foffer%2F123";

	#[test]
	fn rewrites_internal_hosts_in_both_layers() {
		let rewriter = OfferUriRewriter::default();
		let reference = rewriter.parse(DOCKER_OFFER).expect("Docker offer should parse.");

		assert_eq!(reference.issuer.host_str(), Some("localhost"));
		assert_eq!(reference.issuer.port(), Some(9000));
		assert_eq!(
			rewriter.rewrite(DOCKER_OFFER).expect("Docker offer should rewrite."),
			"http://localhost:9000/offer/123"
		);
	}

	#[test]
	fn surrounding_whitespace_is_ignored() {
		let rewriter = OfferUriRewriter::default();

		assert_eq!(
			rewriter.rewrite(&format!("  {DOCKER_OFFER}\n")).expect("Padded offer should rewrite."),
			"http://localhost:9000/offer/123"
		);
	}

	#[test]
	fn rejects_foreign_schemes() {
		let rewriter = OfferUriRewriter::default();

		for raw in ["https://issuer?credential_offer_uri=x", "", "openid-credential-offer:/x"] {
			assert_eq!(rewriter.rewrite(raw), Err(OfferError::InvalidScheme), "{raw}");
		}
	}

	#[test]
	fn rejects_missing_or_empty_offer_parameter() {
		let rewriter = OfferUriRewriter::default();

		assert_eq!(
			rewriter.rewrite("openid-credential-offer://issuer:9000?other=1"),
			Err(OfferError::MissingOfferUri)
		);
		assert_eq!(
			rewriter.rewrite("openid-credential-offer://issuer:9000?credential_offer_uri="),
			Err(OfferError::MissingOfferUri)
		);
	}

	#[test]
	fn rejects_unparseable_nested_offer() {
		let err = OfferUriRewriter::default()
			.rewrite("openid-credential-offer://issuer?credential_offer_uri=not%20a%20url")
			.expect_err("Relative nested URL must be rejected.");

		assert!(matches!(err, OfferError::InvalidOfferUri(_)));
	}

	#[test]
	fn custom_mapping_replaces_default() {
		let rewriter =
			OfferUriRewriter::new(HostRewrites::parse("issuer.internal=127.0.0.1").expect("Mapping should parse."));

		assert_eq!(
			rewriter
				.rewrite("openid-credential-offer://issuer.internal?credential_offer_uri=http%3A%2F%2Fissuer.internal%3A8080%2Fo%2F1")
				.expect("Mapped offer should rewrite."),
			"http://127.0.0.1:8080/o/1"
		);
		assert_eq!(
			OfferUriRewriter::new(HostRewrites::none())
				.rewrite(DOCKER_OFFER)
				.expect("Unmapped offer should still parse."),
			"http://host.docker.internal:9000/offer/123"
		);
	}

	#[test]
	fn mapping_parser_rejects_malformed_entries() {
		assert_eq!(
			HostRewrites::parse("a=b, c=d").expect("Two entries should parse."),
			HostRewrites::none().with("a", "b").with("c", "d")
		);
		assert!(HostRewrites::parse("").expect("Empty mapping should parse.").0.is_empty());
		assert!(matches!(
			HostRewrites::parse("a=b,broken"),
			Err(ConfigError::InvalidHostRewrite { entry }) if entry == "broken"
		));
	}
}
