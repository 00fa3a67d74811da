//! Query strings for `GET /node`.
//!
//! Shock's query grammar treats a bare key as a switch: `true` is written as
//! the key alone and `false` is left out entirely. Every other value is a
//! percent-encoded `key=value` pair.

/// A single query value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryValue {
    Flag(bool),
    Text(String),
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<u64> for QueryValue {
    fn from(value: u64) -> Self {
        Self::Text(value.to_string())
    }
}

/// Encode `params` in order, dropping `false` flags.
pub fn encode_query<K, I>(params: I) -> String
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, QueryValue)>,
{
    params
        .into_iter()
        .filter_map(|(key, value)| match value {
            QueryValue::Flag(true) => Some(key.as_ref().to_string()),
            QueryValue::Flag(false) => None,
            QueryValue::Text(text) => Some(format!(
                "{}={}",
                urlencoding::encode(key.as_ref()),
                urlencoding::encode(&text)
            )),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Which kind of filter a [`NodeQuery`] carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// No filter; lists every node visible to the caller.
    #[default]
    None,
    /// Match against node attributes (`query` switch).
    Attributes,
    /// Match against top-level node fields (`querynode` switch).
    NodeFields,
}

/// Parameters for listing nodes.
#[derive(Clone, Debug, Default)]
pub struct NodeQuery {
    pub kind: FilterKind,
    pub filters: Vec<(String, String)>,
    pub owner: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl NodeQuery {
    /// Filter on attribute values.
    pub fn attributes<K, V, I>(filters: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            kind: FilterKind::Attributes,
            filters: collect_pairs(filters),
            ..Self::default()
        }
    }

    /// Filter on node fields rather than attributes.
    pub fn node_fields<K, V, I>(filters: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            kind: FilterKind::NodeFields,
            filters: collect_pairs(filters),
            ..Self::default()
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Render as a query string (without the leading `?`).
    ///
    /// Zero limits and offsets are left out, as are empty owners.
    pub fn to_query_string(&self) -> String {
        let mut params: Vec<(String, QueryValue)> = self
            .filters
            .iter()
            .map(|(k, v)| (k.clone(), QueryValue::from(v.as_str())))
            .collect();

        match self.kind {
            FilterKind::Attributes => params.push(("query".into(), true.into())),
            FilterKind::NodeFields => params.push(("querynode".into(), true.into())),
            FilterKind::None => {}
        }
        if let Some(owner) = self.owner.as_ref().filter(|o| !o.is_empty()) {
            params.push(("owner".into(), owner.as_str().into()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            params.push(("limit".into(), limit.into()));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            params.push(("offset".into(), offset.into()));
        }

        encode_query(params)
    }
}

fn collect_pairs<K, V, I>(pairs: I) -> Vec<(String, String)>
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
