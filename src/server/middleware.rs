// crates.io
use axum::{
	body::Body,
	extract::{ConnectInfo, FromRequestParts, Request, State},
	http::{header::AUTHORIZATION, request::Parts},
	middleware::Next,
	response::Response,
};
// self
use crate::{
	_prelude::*,
	auth::{BearerError, BearerToken, IdentityResolver, RequestFacts, validate_bearer_presence},
	limit::RateLimiter,
};

const MAX_BUFFERED_BODY: usize = 64 * 1024;

/// Identity resolver plus limiter applied to inbound requests.
#[derive(Clone, Debug)]
pub struct QuotaGuard {
	resolver: IdentityResolver,
	limiter: RateLimiter,
}
impl QuotaGuard {
	/// Pairs a resolver with a limiter.
	pub fn new(resolver: IdentityResolver, limiter: RateLimiter) -> Self {
		Self { resolver, limiter }
	}

	/// Resolves the caller and counts the request, returning it intact when admitted.
	///
	/// The body is buffered only when the resolver needs the login username.
	pub async fn check(&self, request: Request) -> Result<Request> {
		let (request, body) = self.buffer_if_needed(request).await;
		let path = request.uri().path();
		let facts = RequestFacts {
			method: request.method(),
			path,
			authorization: request.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			body: body.as_deref(),
			origin: request
				.extensions()
				.get::<ConnectInfo<SocketAddr>>()
				.map(|ConnectInfo(addr)| addr.ip()),
		};
		let identity = self
			.resolver
			.resolve(&facts)
			.ok_or_else(|| Error::invalid_payload("username is required"))?;

		self.limiter.admit(&identity.value, path).await?;

		Ok(request)
	}

	// An unreadable or oversized body yields no body facts and is forwarded empty; the handler
	// rejects it.
	async fn buffer_if_needed(&self, request: Request) -> (Request, Option<Bytes>) {
		if !self.resolver.needs_body(request.method(), request.uri().path()) {
			return (request, None);
		}

		let (parts, body) = request.into_parts();

		match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
			Ok(bytes) => (Request::from_parts(parts, Body::from(bytes.clone())), Some(bytes)),
			Err(_) => (Request::from_parts(parts, Body::empty()), None),
		}
	}
}

pub(crate) async fn enforce_quota(
	State(guard): State<Arc<QuotaGuard>>,
	request: Request,
	next: Next,
) -> Result<Response> {
	let request = guard.check(request).await?;

	Ok(next.run(request).await)
}

/// Extractor that rejects requests without a well-formed bearer header.
///
/// Only the header shape is checked; the credential is not verified.
#[derive(Clone, Debug)]
pub struct RequireBearer(
	/// Shape-checked credential.
	pub BearerToken,
);
impl<S> FromRequestParts<S> for RequireBearer
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
		let header = parts
			.headers
			.get(AUTHORIZATION)
			.map(|value| value.to_str().map_err(|_| BearerError::MalformedScheme))
			.transpose()?;

		Ok(Self(validate_bearer_presence(header)?))
	}
}
