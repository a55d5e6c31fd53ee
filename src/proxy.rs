use crate::{
    envelope::{ProxyReply, records_from_payload},
    error::{MissingIdSnafu, Operation, SiswaResult, TransportSnafu, UpstreamSnafu},
    upstream::{HttpTransport, RequestDescriptor, UpstreamResponse, first_success},
};
use axum::http::Method;
use reqwest::Url;
use serde_json::Value;
use snafu::{OptionExt, ResultExt, ensure};
use std::sync::Arc;

/// Rejects absent or blank ids before anything is sent upstream.
pub fn require_id(id: Option<&str>, operation: Operation) -> SiswaResult<&str> {
    let id = id.context(MissingIdSnafu { operation })?;
    ensure!(!id.trim().is_empty(), MissingIdSnafu { operation });
    Ok(id)
}

/// Forwards the four student operations to the upstream collection at `base`.
#[derive(Clone, Debug)]
pub struct StudentProxy {
    transport: Arc<dyn HttpTransport>,
    base: Url,
}

impl StudentProxy {
    pub fn new(transport: Arc<dyn HttpTransport>, base: Url) -> Self {
        Self { transport, base }
    }

    ///`{base}/{id}`
    pub fn path_form(&self, id: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id);
        }
        url
    }

    ///`{base}?id={id}`
    pub fn query_form(&self, id: &str) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("id", id);
        url
    }

    fn id_candidates(&self, method: &Method, id: &str, body: Option<&Value>) -> [RequestDescriptor; 2] {
        [self.path_form(id), self.query_form(id)]
            .map(|url| RequestDescriptor::new(method.clone(), url, body.cloned()))
    }

    async fn send_once(
        &self,
        operation: Operation,
        request: RequestDescriptor,
    ) -> SiswaResult<UpstreamResponse> {
        debug!(method = %request.method, url = %request.url, "Forwarding to upstream");

        let response = self
            .transport
            .send(&request)
            .await
            .context(TransportSnafu {
                operation,
                url: request.url.as_str(),
            })?;

        ensure!(
            response.status.is_success(),
            UpstreamSnafu {
                operation,
                method: request.method,
                url: request.url.as_str(),
                status: response.status,
                body: response.json(),
            }
        );

        Ok(response)
    }

    pub async fn list(&self) -> SiswaResult<ProxyReply> {
        let response = self
            .send_once(
                Operation::List,
                RequestDescriptor::new(Method::GET, self.base.clone(), None),
            )
            .await?;

        let records = records_from_payload(response.json());
        debug!(count = records.len(), "Listed students");
        Ok(ProxyReply::ok(Value::Array(records)))
    }

    ///the body goes upstream untouched, upstream assigns the id
    pub async fn create(&self, body: Value) -> SiswaResult<ProxyReply> {
        let response = self
            .send_once(
                Operation::Create,
                RequestDescriptor::new(Method::POST, self.base.clone(), Some(body)),
            )
            .await?;

        Ok(ProxyReply {
            status: response.status,
            data: response.json(),
        })
    }

    pub async fn update(&self, id: &str, body: Value) -> SiswaResult<ProxyReply> {
        let id = require_id(Some(id), Operation::Update)?;
        let candidates = self.id_candidates(&Method::PUT, id, Some(&body));

        let response = first_success(self.transport.as_ref(), Operation::Update, &candidates).await?;
        info!(%id, "Updated student");
        Ok(ProxyReply::ok(response.json()))
    }

    pub async fn delete(&self, id: &str) -> SiswaResult<ProxyReply> {
        let id = require_id(Some(id), Operation::Delete)?;
        let candidates = self.id_candidates(&Method::DELETE, id, None);

        let response = first_success(self.transport.as_ref(), Operation::Delete, &candidates).await?;
        info!(%id, "Deleted student");
        Ok(ProxyReply::ok(response.json()))
    }
}
