//! Outbound HTTP plumbing shared by the token gateway and the credential proxy.
//!
//! [`UpstreamClient`] wraps a [`ReqwestClient`] so every forwarding call gets the same bound, the
//! same error classification, and the same buffered [`UpstreamResponse`] shape. Non-success
//! statuses are returned as data; callers decide which statuses count as failures.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{
	RequestBuilder,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
// self
use crate::{_prelude::*, error::TransportError};

/// Default bound applied to forwarding calls.
pub const DEFAULT_CALL_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Fully buffered response from a backing service.
#[derive(Clone, Debug)]
pub struct UpstreamResponse {
	/// HTTP status code.
	pub status: u16,
	/// `Content-Type` header, when present and readable.
	pub content_type: Option<String>,
	/// Raw body.
	pub body: Bytes,
}
impl UpstreamResponse {
	/// Returns `true` for `200 OK`.
	pub fn is_ok(&self) -> bool {
		self.status == 200
	}

	/// Returns `true` for `200 OK` and `201 Created`.
	pub fn is_accepted(&self) -> bool {
		matches!(self.status, 200 | 201)
	}

	/// Lossy UTF-8 view of the body.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
	client: ReqwestClient,
	call_timeout: StdDuration,
}
impl UpstreamClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, call_timeout: DEFAULT_CALL_TIMEOUT }
	}

	/// Overrides the bound applied to JSON and form posts.
	pub fn with_call_timeout(mut self, call_timeout: StdDuration) -> Self {
		self.call_timeout = call_timeout;

		self
	}

	/// Bound applied to JSON and form posts.
	pub fn call_timeout(&self) -> StdDuration {
		self.call_timeout
	}

	/// Posts `payload` as JSON, optionally with an `Authorization` header.
	pub async fn post_json<T>(
		&self,
		service: &'static str,
		url: &Url,
		payload: &T,
		authorization: Option<&str>,
	) -> Result<UpstreamResponse, TransportError>
	where
		T: ?Sized + Serialize,
	{
		let mut request = self.client.post(url.clone()).json(payload);

		if let Some(value) = authorization {
			request = request.header(AUTHORIZATION, value);
		}

		self.execute(service, request, self.call_timeout).await
	}

	/// Posts `form` URL-encoded.
	pub async fn post_form(
		&self,
		service: &'static str,
		url: &Url,
		form: &[(&str, &str)],
	) -> Result<UpstreamResponse, TransportError> {
		let request = self.client.post(url.clone()).form(form);

		self.execute(service, request, self.call_timeout).await
	}

	/// Issues a `GET` bounded by `timeout`.
	pub async fn get(
		&self,
		service: &'static str,
		url: &Url,
		timeout: StdDuration,
	) -> Result<UpstreamResponse, TransportError> {
		self.execute(service, self.client.get(url.clone()), timeout).await
	}

	async fn execute(
		&self,
		service: &'static str,
		request: RequestBuilder,
		timeout: StdDuration,
	) -> Result<UpstreamResponse, TransportError> {
		let response = request
			.timeout(timeout)
			.send()
			.await
			.map_err(|e| TransportError::from_reqwest(service, e))?;
		let status = response.status().as_u16();
		let content_type = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_owned);
		let body = response.bytes().await.map_err(|e| TransportError::from_reqwest(service, e))?;

		Ok(UpstreamResponse { status, content_type, body })
	}
}
impl Default for UpstreamClient {
	fn default() -> Self {
		Self::with_client(ReqwestClient::default())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16) -> UpstreamResponse {
		UpstreamResponse { status, content_type: None, body: Bytes::from_static(b"ok") }
	}

	#[test]
	fn success_predicates_follow_status() {
		assert!(response(200).is_ok());
		assert!(!response(201).is_ok());
		assert!(response(201).is_accepted());
		assert!(!response(204).is_accepted());
		assert_eq!(response(500).text(), "ok");
	}

	#[tokio::test]
	async fn connection_failures_classify_as_transport_errors() {
		let client = UpstreamClient::default().with_call_timeout(StdDuration::from_secs(2));
		let url = Url::parse("http://127.0.0.1:1/token").expect("Fixture URL should parse.");
		let err = client
			.post_form("identity provider", &url, &[("grant_type", "password")])
			.await
			.expect_err("Closed port must fail.");

		assert!(matches!(
			err,
			TransportError::Network { service: "identity provider", .. }
				| TransportError::Timeout { service: "identity provider" }
		));
	}
}
