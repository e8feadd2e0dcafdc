//! Credential issuance, verification, and issuer onboarding proxy.
//!
//! Issuance runs `Start → Issuing → OfferReceived → Fetching → Delivered`; the first failure ends
//! the request in `UpstreamFailed` or `FetchFailed`. Nothing is retried.

// std
use std::time::Duration as StdDuration;
// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	http::{DEFAULT_CALL_TIMEOUT, UpstreamClient, UpstreamResponse},
	obs::{self, GatewayOp, OpOutcome, OpSpan},
	offer::OfferUriRewriter,
};

/// Content type assumed when an upstream omits one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

const ISSUANCE_SERVICE: &str = "issuance service";
const OFFER_SERVICE: &str = "credential offer endpoint";
const VERIFIER_SERVICE: &str = "verification service";

/// Issuance lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssuanceStage {
	/// Request accepted by the gateway.
	Start,
	/// Payload forwarded to the issuance service.
	Issuing,
	/// Issuance service answered with a usable offer reference.
	OfferReceived,
	/// Issuance call failed or returned an unusable offer.
	UpstreamFailed,
	/// Rewritten offer URL is being fetched.
	Fetching,
	/// Credential body returned to the caller.
	Delivered,
	/// Offer fetch failed.
	FetchFailed,
}
impl IssuanceStage {
	/// Stable label recorded on spans.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Start => "start",
			Self::Issuing => "issuing",
			Self::OfferReceived => "offer_received",
			Self::UpstreamFailed => "upstream_failed",
			Self::Fetching => "fetching",
			Self::Delivered => "delivered",
			Self::FetchFailed => "fetch_failed",
		}
	}

	/// Returns `true` for stages that end the request.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::UpstreamFailed | Self::Delivered | Self::FetchFailed)
	}

	/// Returns `true` when `next` directly follows `self`.
	pub const fn can_advance_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Start, Self::Issuing)
				| (Self::Issuing, Self::OfferReceived | Self::UpstreamFailed)
				| (Self::OfferReceived, Self::Fetching)
				| (Self::Fetching, Self::Delivered | Self::FetchFailed)
		)
	}
}

struct IssuanceRun<'a> {
	span: &'a OpSpan,
	stage: IssuanceStage,
}
impl<'a> IssuanceRun<'a> {
	fn start(span: &'a OpSpan) -> Self {
		Self { span, stage: IssuanceStage::Start }
	}

	fn advance(&mut self, next: IssuanceStage) {
		debug_assert!(self.stage.can_advance_to(next), "{:?} -> {next:?}", self.stage);

		self.stage = next;
		self.span.record_stage(next.as_str());
	}

	fn fail<T>(&mut self, next: IssuanceStage, err: Error) -> Result<T> {
		self.advance(next);

		Err(err)
	}
}

/// Backing service endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialEndpoints {
	/// `<issuer>/openid4vc/jwt/issue`.
	pub issue: Url,
	/// `<issuer>/onboard/issuer`.
	pub onboard: Url,
	/// `<verifier>/openid4vc/verify`.
	pub verify: Url,
}
impl CredentialEndpoints {
	/// Derives the endpoint set from the issuer and verifier base URLs.
	pub fn new(issuer_base: &Url, verifier_base: &Url) -> Result<Self, ConfigError> {
		Ok(Self {
			issue: join(issuer_base, &["openid4vc", "jwt", "issue"])?,
			onboard: join(issuer_base, &["onboard", "issuer"])?,
			verify: join(verifier_base, &["openid4vc", "verify"])?,
		})
	}
}

/// Upstream body relayed to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialBody {
	/// Content type to answer with.
	pub content_type: String,
	/// Raw body.
	pub body: Bytes,
}
impl From<UpstreamResponse> for CredentialBody {
	fn from(response: UpstreamResponse) -> Self {
		Self {
			content_type: response.content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_owned()),
			body: response.body,
		}
	}
}

/// Forwards issuance, verification, and onboarding payloads.
#[derive(Clone, Debug)]
pub struct CredentialProxy {
	endpoints: CredentialEndpoints,
	rewriter: OfferUriRewriter,
	http: UpstreamClient,
	fetch_timeout: StdDuration,
}
impl CredentialProxy {
	/// Creates a proxy with the default host rewrites and fetch bound.
	pub fn new(endpoints: CredentialEndpoints, http: UpstreamClient) -> Self {
		Self {
			endpoints,
			rewriter: OfferUriRewriter::default(),
			http,
			fetch_timeout: DEFAULT_CALL_TIMEOUT,
		}
	}

	/// Overrides the offer rewriter.
	pub fn with_rewriter(mut self, rewriter: OfferUriRewriter) -> Self {
		self.rewriter = rewriter;

		self
	}

	/// Overrides the bound applied to the offer fetch.
	pub fn with_fetch_timeout(mut self, fetch_timeout: StdDuration) -> Self {
		self.fetch_timeout = fetch_timeout;

		self
	}

	/// Configured endpoints.
	pub fn endpoints(&self) -> &CredentialEndpoints {
		&self.endpoints
	}

	/// Issues a credential, follows the returned offer reference, and relays the fetched body.
	pub async fn issue(&self, payload: &Map<String, Value>) -> Result<CredentialBody> {
		const OP: GatewayOp = GatewayOp::IssueCredential;

		let span = OpSpan::new(OP, IssuanceStage::Start.as_str());

		obs::record_op_outcome(OP, OpOutcome::Attempt);

		let result = span.instrument(self.run_issuance(&span, payload)).await;

		obs::record_op_outcome(OP, if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });

		result
	}

	/// Forwards a presentation to the verifier and relays its answer.
	pub async fn verify(&self, payload: &Map<String, Value>) -> Result<CredentialBody> {
		self.forward(GatewayOp::VerifyCredential, VERIFIER_SERVICE, &self.endpoints.verify, payload)
			.await
	}

	/// Forwards an onboarding request to the issuer and relays its answer.
	pub async fn onboard_issuer(&self, payload: &Map<String, Value>) -> Result<CredentialBody> {
		self.forward(GatewayOp::OnboardIssuer, ISSUANCE_SERVICE, &self.endpoints.onboard, payload)
			.await
	}

	async fn run_issuance(
		&self,
		span: &OpSpan,
		payload: &Map<String, Value>,
	) -> Result<CredentialBody> {
		let mut run = IssuanceRun::start(span);

		run.advance(IssuanceStage::Issuing);

		let issued = match self.post(ISSUANCE_SERVICE, &self.endpoints.issue, payload).await {
			Ok(response) => response,
			Err(e) => return run.fail(IssuanceStage::UpstreamFailed, e),
		};
		let offer_uri = match self.rewriter.parse(&issued.text()) {
			Ok(reference) => reference.offer_uri,
			Err(source) =>
				return run.fail(IssuanceStage::UpstreamFailed, Error::InvalidOfferResponse { source }),
		};

		run.advance(IssuanceStage::OfferReceived);
		run.advance(IssuanceStage::Fetching);

		let fetched = match self.http.get(OFFER_SERVICE, &offer_uri, self.fetch_timeout).await {
			Ok(response) => response,
			Err(e) => return run.fail(IssuanceStage::FetchFailed, e.into()),
		};

		if !fetched.is_ok() {
			return run.fail(
				IssuanceStage::FetchFailed,
				Error::CredentialFetchUnauthorized { status: fetched.status, body: fetched.text() },
			);
		}

		run.advance(IssuanceStage::Delivered);

		Ok(fetched.into())
	}

	async fn forward(
		&self,
		op: GatewayOp,
		service: &'static str,
		url: &Url,
		payload: &Map<String, Value>,
	) -> Result<CredentialBody> {
		let span = OpSpan::new(op, "forward");

		obs::record_op_outcome(op, OpOutcome::Attempt);

		let result = span.instrument(self.post(service, url, payload)).await.map(CredentialBody::from);

		obs::record_op_outcome(op, if result.is_ok() { OpOutcome::Success } else { OpOutcome::Failure });

		result
	}

	async fn post(
		&self,
		service: &'static str,
		url: &Url,
		payload: &Map<String, Value>,
	) -> Result<UpstreamResponse> {
		let response = self.http.post_json(service, url, payload, None).await?;

		if !response.is_accepted() {
			return Err(Error::Upstream { service, status: response.status, body: response.text() });
		}

		Ok(response)
	}
}

fn join(base: &Url, segments: &[&str]) -> Result<Url, ConfigError> {
	let mut url = base.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::InvalidUrl { url: base.to_string() })?
		.pop_if_empty()
		.extend(segments);

	Ok(url)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn stage_graph_matches_issuance_lifecycle() {
		use IssuanceStage::*;

		assert!(Start.can_advance_to(Issuing));
		assert!(Issuing.can_advance_to(OfferReceived));
		assert!(Issuing.can_advance_to(UpstreamFailed));
		assert!(OfferReceived.can_advance_to(Fetching));
		assert!(Fetching.can_advance_to(Delivered));
		assert!(Fetching.can_advance_to(FetchFailed));
		assert!(!Start.can_advance_to(Fetching));
		assert!(!Delivered.can_advance_to(Issuing));
		assert!(!UpstreamFailed.can_advance_to(Fetching));

		for stage in [UpstreamFailed, Delivered, FetchFailed] {
			assert!(stage.is_terminal());
		}
	}

	#[test]
	fn endpoints_are_derived_from_bases() {
		let issuer = Url::parse("http://localhost:7002").expect("Issuer fixture should parse.");
		let verifier = Url::parse("http://localhost:7003/").expect("Verifier fixture should parse.");
		let endpoints =
			CredentialEndpoints::new(&issuer, &verifier).expect("Endpoints should be derived.");

		assert_eq!(endpoints.issue.as_str(), "http://localhost:7002/openid4vc/jwt/issue");
		assert_eq!(endpoints.onboard.as_str(), "http://localhost:7002/onboard/issuer");
		assert_eq!(endpoints.verify.as_str(), "http://localhost:7003/openid4vc/verify");
	}

	#[test]
	fn missing_content_type_defaults_to_json() {
		let body = CredentialBody::from(UpstreamResponse {
			status: 200,
			content_type: None,
			body: Bytes::from_static(b"{}"),
		});

		assert_eq!(body.content_type, DEFAULT_CONTENT_TYPE);
	}
}
