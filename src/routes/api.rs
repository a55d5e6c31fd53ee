use crate::{
    data::IdQuery,
    envelope::ProxyReply,
    error::{InvalidBodySnafu, InvalidQuerySnafu, Operation, SiswaResult},
    proxy::require_id,
    state::SiswaState,
};
use axum::{
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
};
use serde_json::Value;
use snafu::ResultExt;

///keeps malformed query strings inside the JSON error envelope
fn id_from_query(
    query: Result<Query<IdQuery>, QueryRejection>,
    operation: Operation,
) -> SiswaResult<Option<String>> {
    let Query(IdQuery { id }) = query.context(InvalidQuerySnafu { operation })?;
    Ok(id)
}

fn parse_json_body(bytes: &[u8], operation: Operation) -> SiswaResult<Value> {
    serde_json::from_slice(bytes).context(InvalidBodySnafu { operation })
}

pub async fn get_students(State(state): State<SiswaState>) -> SiswaResult<ProxyReply> {
    state.list().await
}

pub async fn post_student(State(state): State<SiswaState>, body: Bytes) -> SiswaResult<ProxyReply> {
    let body = parse_json_body(&body, Operation::Create)?;
    debug!(?body, "Adding student");
    state.create(body).await
}

pub async fn put_student(
    State(state): State<SiswaState>,
    query: Result<Query<IdQuery>, QueryRejection>,
    body: Bytes,
) -> SiswaResult<ProxyReply> {
    let id = id_from_query(query, Operation::Update)?;
    let id = require_id(id.as_deref(), Operation::Update)?;
    let body = parse_json_body(&body, Operation::Update)?;
    state.update(id, body).await
}

pub async fn delete_student(
    State(state): State<SiswaState>,
    query: Result<Query<IdQuery>, QueryRejection>,
) -> SiswaResult<ProxyReply> {
    let id = id_from_query(query, Operation::Delete)?;
    let id = require_id(id.as_deref(), Operation::Delete)?;
    state.delete(id).await
}
