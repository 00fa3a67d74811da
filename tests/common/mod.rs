//! In-process fake of the Shock node API, good enough to exercise the
//! client and the upload engine over real HTTP.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, RawQuery, State},
    http::{HeaderMap, StatusCode, header},
    routing::get,
};
use serde_json::{Value, json};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct FakeNode {
    pub attributes: Value,
    pub parts: BTreeMap<u64, Vec<u8>>,
    pub declared_parts: Option<u64>,
    pub file_name: String,
    pub created: u64,
}

impl FakeNode {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// Concatenation of all stored parts in part order.
    pub fn assembled(&self) -> Vec<u8> {
        self.parts.values().flatten().copied().collect()
    }
}

#[derive(Clone, Debug)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    /// Multipart field names, in order.
    pub fields: Vec<String>,
    /// Byte length of each multipart field, in order.
    pub field_sizes: Vec<usize>,
}

#[derive(Default)]
pub struct FakeStore {
    pub nodes: BTreeMap<String, FakeNode>,
    pub requests: Vec<Recorded>,
    /// Answer chunk writes for this part number with a 500.
    pub fail_part: Option<u64>,
    /// Answer `GET /node/{id}` with a 500.
    pub fail_node_get: bool,
    /// Answer `GET /node?...` with a 500.
    pub fail_search: bool,
    /// Ignore filters on `GET /node?...` and return every node.
    pub loose_search: bool,
    /// Cancelled while a `GET /node?...` is being answered.
    pub cancel_on_search: Option<CancellationToken>,
    /// Cancelled while a `POST /node` is being answered.
    pub cancel_on_create: Option<CancellationToken>,
    next_seq: u64,
}

type Shared = Arc<Mutex<FakeStore>>;
type Reply = (StatusCode, Json<Value>);

pub struct FakeShock {
    pub url: String,
    state: Shared,
}

impl FakeShock {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeStore::default()));
        let app = Router::new()
            .route("/node", get(list_nodes).post(create_node).put(update_node))
            .route("/node/{id}", get(get_node).put(put_node).delete(delete_node))
            .route("/node/{id}/acl", get(get_acl))
            .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn store(&self) -> MutexGuard<'_, FakeStore> {
        self.state.lock().unwrap()
    }

    /// Insert a node as if an earlier client had created it.
    pub fn seed(&self, attributes: Value, parts: &[(u64, Vec<u8>)]) -> String {
        let mut store = self.store();
        let id = Uuid::new_v4().to_string();
        store.next_seq += 1;
        let node = FakeNode {
            attributes,
            parts: parts.iter().cloned().collect(),
            declared_parts: None,
            file_name: String::new(),
            created: store.next_seq,
        };
        store.nodes.insert(id.clone(), node);
        id
    }

    pub fn node(&self, id: &str) -> FakeNode {
        self.store().nodes.get(id).cloned().unwrap()
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.store().requests.clone()
    }

    /// `(node id, part number)` of every chunk write, in arrival order.
    pub fn chunk_writes(&self) -> Vec<(String, u64)> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "PUT" && r.path.starts_with("/node/"))
            .flat_map(|r| {
                let id = r.path.trim_start_matches("/node/").to_string();
                r.fields
                    .iter()
                    .filter_map(|f| f.parse::<u64>().ok())
                    .map(move |n| (id.clone(), n))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

fn ok(data: Value) -> Reply {
    (
        StatusCode::OK,
        Json(json!({"data": data, "error": null, "status": 200})),
    )
}

fn fail(status: StatusCode, msg: &str) -> Reply {
    (
        status,
        Json(json!({"data": null, "error": [msg], "status": status.as_u16()})),
    )
}

fn render(id: &str, node: &FakeNode) -> Value {
    let size: usize = node.parts.values().map(Vec::len).sum();
    json!({
        "id": id,
        "version": format!("v{}", node.parts.len()),
        "attributes": node.attributes,
        "file": {"name": node.file_name, "size": size, "checksum": {}, "format": ""},
        "acl": {"owner": "tester", "read": ["tester"], "write": ["tester"], "delete": ["tester"]},
    })
}

fn record(
    state: &Shared,
    method: &str,
    path: String,
    query: Option<String>,
    headers: &HeaderMap,
    fields: &[(String, Vec<u8>)],
) {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().unwrap().requests.push(Recorded {
        method: method.into(),
        path,
        query,
        authorization,
        fields: fields.iter().map(|(name, _)| name.clone()).collect(),
        field_sizes: fields.iter().map(|(_, data)| data.len()).collect(),
    });
}

async fn read_fields(mut multipart: Multipart) -> Result<Vec<(String, Vec<u8>)>, Reply> {
    let mut fields = Vec::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| fail(StatusCode::BAD_REQUEST, &e.to_string()))?;
                fields.push((name, data.to_vec()));
            }
            Ok(None) => return Ok(fields),
            Err(e) => return Err(fail(StatusCode::BAD_REQUEST, &e.to_string())),
        }
    }
}

fn field<'a>(fields: &'a [(String, Vec<u8>)], name: &str) -> Option<&'a [u8]> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, data)| data.as_slice())
}

fn parse_query(raw: &str) -> Vec<(String, Option<String>)> {
    raw.split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (
                urlencoding::decode(k).unwrap().into_owned(),
                Some(urlencoding::decode(v).unwrap().into_owned()),
            ),
            None => (pair.to_string(), None),
        })
        .collect()
}

async fn get_node(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    record(&state, "GET", format!("/node/{}", id), None, &headers, &[]);
    let store = state.lock().unwrap();
    if store.fail_node_get {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "node lookup exploded");
    }
    match store.nodes.get(&id) {
        Some(node) => ok(render(&id, node)),
        None => fail(StatusCode::NOT_FOUND, "Node not found"),
    }
}

async fn get_acl(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    record(&state, "GET", format!("/node/{}/acl", id), None, &headers, &[]);
    let store = state.lock().unwrap();
    match store.nodes.get(&id) {
        Some(node) => ok(render(&id, node)["acl"].clone()),
        None => fail(StatusCode::NOT_FOUND, "Node not found"),
    }
}

async fn list_nodes(
    State(state): State<Shared>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Reply {
    record(&state, "GET", "/node".into(), query.clone(), &headers, &[]);
    let store = state.lock().unwrap();
    if store.fail_search {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "search exploded");
    }
    if let Some(cancel) = &store.cancel_on_search {
        cancel.cancel();
    }

    let params = parse_query(query.as_deref().unwrap_or(""));
    let mut limit = usize::MAX;
    let mut offset = 0;
    let mut filters = Vec::new();
    for (key, value) in params {
        match (key.as_str(), value) {
            ("limit", Some(v)) => limit = v.parse().unwrap(),
            ("offset", Some(v)) => offset = v.parse().unwrap(),
            ("owner", _) | (_, None) => {}
            (_, Some(v)) => filters.push((key, v)),
        }
    }

    let mut nodes: Vec<(&String, &FakeNode)> = store.nodes.iter().collect();
    nodes.sort_by_key(|(_, node)| node.created);
    let hits: Vec<Value> = nodes
        .into_iter()
        .filter(|(_, node)| {
            store.loose_search
                || filters
                    .iter()
                    .all(|(k, v)| node.attr(k) == Some(v.as_str()))
        })
        .skip(offset)
        .take(limit)
        .map(|(id, node)| render(id, node))
        .collect();
    ok(Value::Array(hits))
}

async fn create_node(
    State(state): State<Shared>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    let fields = match read_fields(multipart).await {
        Ok(fields) => fields,
        Err(reply) => return reply,
    };
    record(&state, "POST", "/node".into(), None, &headers, &fields);

    let attributes = match field(&fields, "attributes") {
        Some(raw) => match serde_json::from_slice::<Value>(raw) {
            Ok(v) => v,
            Err(e) => return fail(StatusCode::BAD_REQUEST, &e.to_string()),
        },
        None => Value::Null,
    };
    let declared_parts = field(&fields, "parts")
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(|s| s.parse().ok());

    let mut store = state.lock().unwrap();
    if let Some(cancel) = &store.cancel_on_create {
        cancel.cancel();
    }
    store.next_seq += 1;
    let id = Uuid::new_v4().to_string();
    let node = FakeNode {
        attributes,
        parts: BTreeMap::new(),
        declared_parts,
        file_name: String::new(),
        created: store.next_seq,
    };
    let body = render(&id, &node);
    store.nodes.insert(id, node);
    ok(body)
}

async fn update_node(
    State(state): State<Shared>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    let fields = match read_fields(multipart).await {
        Ok(fields) => fields,
        Err(reply) => return reply,
    };
    record(&state, "PUT", "/node".into(), None, &headers, &fields);
    match field(&fields, "attributes").map(serde_json::from_slice::<Value>) {
        Some(Ok(attrs)) => ok(json!({"attributes": attrs})),
        Some(Err(e)) => fail(StatusCode::BAD_REQUEST, &e.to_string()),
        None => fail(StatusCode::BAD_REQUEST, "no attributes"),
    }
}

async fn put_node(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Reply {
    let fields = match read_fields(multipart).await {
        Ok(fields) => fields,
        Err(reply) => return reply,
    };
    record(&state, "PUT", format!("/node/{}", id), None, &headers, &fields);

    let mut store = state.lock().unwrap();
    let fail_part = store.fail_part;
    let Some(node) = store.nodes.get_mut(&id) else {
        return fail(StatusCode::NOT_FOUND, "Node not found");
    };

    for (name, _) in &fields {
        if let Ok(part) = name.parse::<u64>() {
            if fail_part == Some(part) {
                return fail(StatusCode::INTERNAL_SERVER_ERROR, "disk full");
            }
        }
    }
    for (name, data) in fields {
        if let Ok(part) = name.parse::<u64>() {
            node.parts.insert(part, data);
        } else if name == "attributes" {
            match serde_json::from_slice(&data) {
                Ok(attrs) => node.attributes = attrs,
                Err(e) => return fail(StatusCode::BAD_REQUEST, &e.to_string()),
            }
        } else if name == "file_name" {
            node.file_name = String::from_utf8_lossy(&data).into_owned();
        }
    }
    ok(render(&id, node))
}

async fn delete_node(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Reply {
    record(&state, "DELETE", format!("/node/{}", id), None, &headers, &[]);
    match state.lock().unwrap().nodes.remove(&id) {
        Some(_) => ok(Value::Null),
        None => fail(StatusCode::NOT_FOUND, "Node not found"),
    }
}
