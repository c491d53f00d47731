//! HTTP Basic-auth extractor and active-role resolution.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use spmi_core::{
  access::{AuthContext, Role},
  store::{DirectoryStore, SpmiStore},
};

use crate::{AppState, error::Error};

/// Header selecting the role a request acts under.
pub const ACTIVE_ROLE_HEADER: &str = "x-active-role";

/// The resolved caller. Present in a handler means the request was
/// authenticated and its active role is granted.
pub struct Authenticated(pub AuthContext);

fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = String::from_utf8(decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

fn requested_role(headers: &HeaderMap) -> Result<Option<Role>, Error> {
  let Some(value) = headers.get(ACTIVE_ROLE_HEADER) else {
    return Ok(None);
  };
  let value = value
    .to_str()
    .map_err(|_| Error::BadRequest(format!("{ACTIVE_ROLE_HEADER} is not valid text")))?;
  Ok(Some(Role::parse(value.trim())?))
}

fn verify_password(password: &str, password_hash: &str) -> Result<(), Error> {
  let parsed_hash = PasswordHash::new(password_hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: SpmiStore + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let (username, password) = basic_credentials(&parts.headers)?;
    let requested = requested_role(&parts.headers)?;

    let credentials = state
      .store
      .find_credentials(username)
      .await
      .map_err(Error::store)?
      .ok_or(Error::Unauthorized)?;
    verify_password(&password, &credentials.password_hash)?;

    let user = credentials.user;
    let context = AuthContext::resolve(user.id, user.username, user.roles, requested)?;
    Ok(Authenticated(context))
  }
}
