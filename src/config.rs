use crate::errors::{ShockError, ShockResult};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf};

/// Default bytes per chunk for fresh uploads (2 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 2_097_152;

pub const ENV_URL: &str = "SHOCK_URL";
pub const ENV_TOKEN: &str = "SHOCK_TOKEN";
pub const ENV_CHUNK_SIZE: &str = "SHOCK_CHUNK_SIZE";

/// Immutable client configuration, handed to every request.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the Shock service, without the `/node` suffix.
    pub url: String,

    /// Bearer token sent as `Authorization: OAuth <token>`.
    pub token: Option<String>,

    /// Chunk size used when allocating fresh uploads.
    pub chunk_size: u64,
}

// Keep tokens out of logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Build a configuration from a synchronous key-value source.
    ///
    /// Fails with [`ShockError::Configuration`] when the url is absent or a
    /// chunk size does not parse.
    pub fn from_lookup<F>(lookup: F) -> ShockResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ShockError::config(format!("missing parameter `{}`", ENV_URL)))?;

        let chunk_size = match lookup(ENV_CHUNK_SIZE) {
            Some(value) => parse_chunk_size(&value)?,
            None => DEFAULT_CHUNK_SIZE,
        };

        Ok(Self {
            url,
            token: lookup(ENV_TOKEN).filter(|v| !v.is_empty()),
            chunk_size,
        })
    }

    /// Check the invariants every client relies on.
    pub fn validate(&self) -> ShockResult<()> {
        if self.url.trim().is_empty() {
            return Err(ShockError::config("missing parameter `url`"));
        }
        if self.chunk_size == 0 {
            return Err(ShockError::config("chunk size must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_chunk_size(value: &str) -> ShockResult<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|err| ShockError::config(format!("parsing chunk size `{}`: {}", value, err)))
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Client for the Shock object store")]
pub struct Args {
    /// Shock base URL (overrides SHOCK_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Auth token (overrides SHOCK_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Bytes per chunk for new uploads (overrides SHOCK_CHUNK_SIZE)
    #[arg(long, global = true)]
    pub chunk_size: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file in chunks, resuming a previous partial upload if one exists
    Upload {
        path: PathBuf,

        /// Node id of an earlier attempt, checked first
        #[arg(long)]
        node_id: Option<String>,

        /// Do not search the store for a partial upload of this file
        #[arg(long)]
        no_resume: bool,
    },

    /// Print a node record
    Get { id: String },

    /// List nodes, optionally filtered
    List {
        /// Attribute filter `key=value` (repeatable)
        #[arg(long = "attr", value_parser = parse_key_value)]
        attrs: Vec<(String, String)>,

        /// Node field filter `key=value` (repeatable)
        #[arg(long = "node-field", value_parser = parse_key_value)]
        node_fields: Vec<(String, String)>,

        #[arg(long)]
        owner: Option<String>,

        #[arg(long)]
        limit: Option<u64>,

        #[arg(long)]
        offset: Option<u64>,
    },

    /// Delete a node
    Delete { id: String },

    /// Print the ACLs of a node
    Acl { id: String },

    /// Rename the file held by a node
    Rename { id: String, name: String },

    /// Replace attributes through `PUT /node`
    SetAttributes {
        /// Attributes as a JSON object
        json: String,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))
}

impl ClientConfig {
    /// Parse CLI args and merge them over the environment.
    pub fn from_env_and_args() -> anyhow::Result<(Self, Command)> {
        let args = Args::parse();
        let cfg = Self::merge(args.url, args.token, args.chunk_size, |key| env::var(key).ok())?;
        Ok((cfg, args.command))
    }

    fn merge<F>(
        url: Option<String>,
        token: Option<String>,
        chunk_size: Option<u64>,
        lookup: F,
    ) -> ShockResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Self::from_lookup(|key| match key {
            ENV_URL => url.clone().or_else(|| lookup(key)),
            ENV_TOKEN => token.clone().or_else(|| lookup(key)),
            ENV_CHUNK_SIZE => chunk_size.map(|c| c.to_string()).or_else(|| lookup(key)),
            _ => lookup(key),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }
}
