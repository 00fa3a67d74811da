//! src/services/shock_client.rs
//!
//! ShockClient: thin transport over the Shock REST surface. Every request
//! carries the `OAuth` authorization header when a token is configured, and
//! every JSON response is unwrapped from its `{data: ...}` envelope.

use crate::{
    config::ClientConfig,
    errors::{ShockError, ShockResult},
    models::{Envelope, Node, NodeId, NodeQuery, ResumeKey, UploadAttributes},
};
use bytes::Bytes;
use reqwest::{
    Body, Client as HttpClient, Method, RequestBuilder, Response, StatusCode, Url,
    header::AUTHORIZATION,
    multipart::{Form, Part},
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

const JSON_MIME: &str = "text/json";
const OCTET_STREAM: &str = "application/octet-stream";

/// Client for one Shock service.
///
/// Cheap to clone; clones share the connection pool and configuration.
#[derive(Clone, Debug)]
pub struct ShockClient {
    config: Arc<ClientConfig>,
    base: String,
    http: HttpClient,
}

impl ShockClient {
    /// Build a client, failing fast when the configuration is unusable.
    pub fn new(config: ClientConfig) -> ShockResult<Self> {
        Self::with_http_client(config, HttpClient::new())
    }

    pub fn with_http_client(config: ClientConfig, http: HttpClient) -> ShockResult<Self> {
        config.validate()?;
        Url::parse(&config.url)
            .map_err(|err| ShockError::config(format!("invalid url `{}`: {}", config.url, err)))?;

        let base = config.url.trim_end_matches('/').to_string();
        Ok(Self {
            config: Arc::new(config),
            base,
            http,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // --- transport primitives ---

    /// Authenticated GET of `{base}/{path}?{query}`, unwrapped.
    pub async fn get(&self, path: &str, query: Option<&str>) -> ShockResult<Value> {
        let mut url = self.url(path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        self.send_json(self.request(Method::GET, &url)).await
    }

    /// Authenticated multipart PUT, unwrapped.
    pub async fn put(&self, path: &str, form: Form) -> ShockResult<Value> {
        let url = self.url(path);
        self.send_json(self.request(Method::PUT, &url).multipart(form))
            .await
    }

    /// Authenticated multipart POST, unwrapped.
    pub async fn post(&self, path: &str, form: Form) -> ShockResult<Value> {
        let url = self.url(path);
        self.send_json(self.request(Method::POST, &url).multipart(form))
            .await
    }

    /// Authenticated DELETE. The response body is not inspected on success.
    pub async fn delete(&self, path: &str) -> ShockResult<()> {
        let url = self.url(path);
        let res = self.send(self.request(Method::DELETE, &url)).await?;
        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = res.text().await?;
            Err(error_from_body(status, &text))
        }
    }

    // --- node operations ---

    /// `GET /node/{id}`
    pub async fn get_node(&self, id: &NodeId) -> ShockResult<Node> {
        let data = self.get(&node_path(id), None).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// `GET /node?...`
    pub async fn get_nodes(&self, query: &NodeQuery) -> ShockResult<Vec<Node>> {
        let data = self.get("node", Some(&query.to_query_string())).await?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(data)?)
    }

    /// `GET /node/{id}/acl`
    pub async fn get_node_acls(&self, id: &NodeId) -> ShockResult<Value> {
        self.get(&format!("{}/acl", node_path(id)), None).await
    }

    /// `DELETE /node/{id}`
    pub async fn delete_node(&self, id: &NodeId) -> ShockResult<()> {
        self.delete(&node_path(id)).await
    }

    /// `PUT /node` with an `attributes` document.
    pub async fn update_node(&self, attributes: &Value) -> ShockResult<Value> {
        let form = Form::new().part("attributes", attributes_part(attributes)?);
        self.put("node", form).await
    }

    /// `POST /node` allocating a node that will receive `parts` chunks.
    pub async fn create_node(&self, attributes: &UploadAttributes, parts: u64) -> ShockResult<Node> {
        let form = Form::new()
            .part("attributes", attributes_part(attributes)?)
            .text("parts", parts.to_string());
        let data = self.post("node", form).await?;
        let node: Node = serde_json::from_value(data)?;
        debug!(node = %node.id, parts, "allocated node");
        Ok(node)
    }

    /// `PUT /node/{id}` writing chunk `part` (1-based) and its attributes.
    pub async fn put_chunk(
        &self,
        id: &NodeId,
        part: u64,
        file_name: &str,
        bytes: Bytes,
        attributes: &UploadAttributes,
    ) -> ShockResult<Value> {
        let len = bytes.len() as u64;
        let chunk = Part::stream_with_length(Body::from(bytes), len)
            .file_name(file_name.to_string())
            .mime_str(OCTET_STREAM)?;
        let form = Form::new()
            .part(part.to_string(), chunk)
            .part("attributes", attributes_part(attributes)?);
        debug!(node = %id, part, len, "putting chunk");
        self.put(&node_path(id), form).await
    }

    /// `PUT /node/{id}` setting the stored file name.
    pub async fn change_node_file_name(&self, id: &NodeId, file_name: &str) -> ShockResult<Value> {
        let form = Form::new().text("file_name", file_name.to_string());
        self.put(&node_path(id), form).await
    }

    /// Look for a node holding (part of) the file identified by `key`.
    ///
    /// Hits are re-checked locally so a loosely matching store never hands
    /// back a node for different content.
    pub async fn find_resumable(&self, key: &ResumeKey) -> ShockResult<Option<Node>> {
        let query = NodeQuery::attributes(key.query_pairs()).with_limit(1);
        let nodes = self.get_nodes(&query).await?;
        let hit = nodes.into_iter().next().filter(|node| {
            node.upload_attributes()
                .map(|attrs| key.matches(&attrs))
                .unwrap_or(false)
        });
        Ok(hit)
    }

    // --- helpers ---

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let req = self.http.request(method, url);
        match self.config.token.as_deref() {
            Some(token) => req.header(AUTHORIZATION, format!("OAuth {}", token)),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> ShockResult<Response> {
        req.send().await.map_err(|err| {
            warn!("request to shock failed: {}", err);
            ShockError::Http(err)
        })
    }

    async fn send_json(&self, req: RequestBuilder) -> ShockResult<Value> {
        let res = self.send(req).await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &text));
        }
        let envelope: Envelope<Value> = serde_json::from_str(&text)?;
        Ok(envelope.data.unwrap_or(Value::Null))
    }
}

fn node_path(id: &NodeId) -> String {
    format!("node/{}", id)
}

fn attributes_part<T: serde::Serialize>(attributes: &T) -> ShockResult<Part> {
    let json = serde_json::to_vec(attributes)?;
    Ok(Part::bytes(json).file_name("attributes").mime_str(JSON_MIME)?)
}

/// Prefer the envelope's `error` member; fall back to the raw body.
fn error_from_body(status: StatusCode, text: &str) -> ShockError {
    let message = serde_json::from_str::<Envelope<Value>>(text)
        .ok()
        .and_then(|env| env.error_message())
        .unwrap_or_else(|| text.trim().to_string());
    ShockError::transport(Some(status), message)
}
