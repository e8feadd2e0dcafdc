// crates.io
use axum::{
	Json,
	http::{HeaderValue, header::RETRY_AFTER},
	response::{IntoResponse, Response},
};
// self
use crate::_prelude::*;

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = self.status_code();

		if status.is_server_error() {
			log_server_error(&self);
		}

		let retry_after = match &self {
			Error::RateLimited { retry_after: Some(remaining) } => Some(retry_after_secs(*remaining)),
			_ => None,
		};
		let mut response = (status, Json(ErrorBody { error: self.to_string() })).into_response();

		if let Some(secs) = retry_after {
			response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
		}

		response
	}
}

#[cfg(feature = "tracing")]
fn log_server_error(error: &Error) {
	tracing::error!(error = %error, "request failed");
}

#[cfg(not(feature = "tracing"))]
fn log_server_error(_: &Error) {}

fn retry_after_secs(remaining: Duration) -> u64 {
	let whole = remaining.whole_seconds() + i64::from(remaining.subsec_nanoseconds() > 0);

	u64::try_from(whole).unwrap_or(0).max(1)
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::StatusCode;
	// self
	use super::*;

	#[test]
	fn retry_after_rounds_up_to_whole_seconds() {
		assert_eq!(retry_after_secs(Duration::milliseconds(41_200)), 42);
		assert_eq!(retry_after_secs(Duration::seconds(60)), 60);
		assert_eq!(retry_after_secs(Duration::ZERO), 1);
	}

	#[test]
	fn rate_limited_response_carries_retry_after() {
		let response =
			Error::RateLimited { retry_after: Some(Duration::seconds(12)) }.into_response();

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(
			response.headers().get(RETRY_AFTER).and_then(|value| value.to_str().ok()),
			Some("12")
		);
	}
}
