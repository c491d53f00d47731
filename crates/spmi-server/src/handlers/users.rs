//! `GET /users[?role=<role>]`: admin lookup for owners and auditors.
//!
//! Users are seeded from configuration; there is no write endpoint.

use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use spmi_core::{
  access::Role,
  directory::User,
  store::{DirectoryStore, SpmiStore},
};

use crate::{AppState, auth::Authenticated, error::Error};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub role: Option<Role>,
}

pub async fn list<S: SpmiStore>(
  State(state): State<AppState<S>>,
  Authenticated(ctx): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<User>>, Error> {
  ctx.require_admin()?;
  let users = state.store.list_users(params.role).await.map_err(Error::store)?;
  Ok(Json(users))
}
