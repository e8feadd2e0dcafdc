// crates.io
use axum::{
	Json,
	extract::{Path, State},
	http::{HeaderMap, StatusCode, header::{AUTHORIZATION, CONTENT_TYPE}},
	response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use uuid::Uuid;
// self
use super::{AppState, RequireBearer};
use crate::{
	_prelude::*,
	proxy::CredentialBody,
	user::{LoginRequest, RegistrationRequest, UserProfile, UserRecord},
};

const USER_RESOURCE: &str = "User";

pub(crate) async fn health() -> Json<Value> {
	Json(json!({ "status": "ok" }))
}

pub(crate) async fn login(State(state): State<AppState>, body: Bytes) -> Result<Response> {
	let request = parse_json::<LoginRequest>(&body)?;
	let response = state.gateway.login(request).await?;

	Ok(relay(response.into()))
}

pub(crate) async fn register_user(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
	let request = parse_json::<RegistrationRequest>(&body)?;
	let authorization = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
	let record = state.gateway.register_user(request, authorization).await?;

	Ok((
		StatusCode::CREATED,
		Json(json!({ "message": "User registered successfully", "id": record.id })),
	))
}

pub(crate) async fn list_users(
	_: RequireBearer,
	State(state): State<AppState>,
) -> Result<Json<Vec<UserRecord>>> {
	Ok(Json(state.users.list().await?))
}

pub(crate) async fn get_user(
	_: RequireBearer,
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<UserRecord>> {
	state
		.users
		.fetch(parse_id(&id)?)
		.await?
		.map(Json)
		.ok_or(Error::NotFound { resource: USER_RESOURCE })
}

pub(crate) async fn update_user(
	_: RequireBearer,
	State(state): State<AppState>,
	Path(id): Path<String>,
	body: Bytes,
) -> Result<Json<UserRecord>> {
	let id = parse_id(&id)?;
	let profile = parse_json::<UserProfile>(&body)?;

	if profile.username.trim().is_empty() {
		return Err(Error::invalid_payload("username is required"));
	}

	state.users.update(id, profile).await?.map(Json).ok_or(Error::NotFound { resource: USER_RESOURCE })
}

pub(crate) async fn delete_user(
	_: RequireBearer,
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<StatusCode> {
	if state.users.delete(parse_id(&id)?).await? {
		Ok(StatusCode::NO_CONTENT)
	} else {
		Err(Error::NotFound { resource: USER_RESOURCE })
	}
}

pub(crate) async fn issue_credential(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Response> {
	let payload = parse_json::<Map<String, Value>>(&body)?;

	Ok(relay(state.proxy.issue(&payload).await?))
}

pub(crate) async fn verify_credential(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Response> {
	let payload = parse_json::<Map<String, Value>>(&body)?;

	Ok(relay(state.proxy.verify(&payload).await?))
}

pub(crate) async fn onboard_issuer(State(state): State<AppState>, body: Bytes) -> Result<Response> {
	let payload = parse_json::<Map<String, Value>>(&body)?;

	Ok(relay(state.proxy.onboard_issuer(&payload).await?))
}

fn relay(body: CredentialBody) -> Response {
	([(CONTENT_TYPE, body.content_type)], body.body).into_response()
}

fn parse_id(raw: &str) -> Result<Uuid> {
	Uuid::parse_str(raw).map_err(|_| Error::invalid_payload("invalid UUID"))
}

fn parse_json<T>(body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let value = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| Error::invalid_payload(format!("{} at `{}`", e.inner(), e.path())))?;

	deserializer.end().map_err(|e| Error::invalid_payload(e.to_string()))?;

	Ok(value)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn json_errors_name_the_failing_field() {
		let err = parse_json::<LoginRequest>(br#"{"username":"alice","password":7}"#)
			.expect_err("Numeric password must be rejected.");

		assert!(matches!(err, Error::InvalidPayload { ref reason } if reason.contains("password")));
		assert!(parse_json::<Map<String, Value>>(b"{} trailing").is_err());
		assert!(parse_json::<Map<String, Value>>(b"[]").is_err());
	}

	#[test]
	fn user_ids_must_be_uuids() {
		assert!(parse_id("2f1c7a5e-8d7b-4a57-9f0e-6c1b2d3e4f50").is_ok());
		assert!(matches!(parse_id("42"), Err(Error::InvalidPayload { .. })));
	}
}
