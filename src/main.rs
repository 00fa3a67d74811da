use anyhow::{Context, Result};
use serde_json::Value;
use shock_client::{
    ClientConfig, LocalFile, NodeId, NodeQuery, ShockClient, UploadFile, UploadOptions,
    UploadOutcome, UploadService, config::Command,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // --- Parse config + command ---
    let (cfg, command) = ClientConfig::from_env_and_args()?;
    tracing::debug!("Using config: {:?}", cfg);

    let client = ShockClient::new(cfg)?;

    match command {
        Command::Upload {
            path,
            node_id,
            no_resume,
        } => upload(client, path, node_id, !no_resume).await,
        Command::Get { id } => print_json(&client.get_node(&NodeId::new(id)).await?),
        Command::List {
            attrs,
            node_fields,
            owner,
            limit,
            offset,
        } => {
            if !attrs.is_empty() && !node_fields.is_empty() {
                anyhow::bail!("--attr and --node-field cannot be combined");
            }
            let mut query = if !attrs.is_empty() {
                NodeQuery::attributes(attrs)
            } else if !node_fields.is_empty() {
                NodeQuery::node_fields(node_fields)
            } else {
                NodeQuery::default()
            };
            query.owner = owner;
            query.limit = limit;
            query.offset = offset;
            print_json(&client.get_nodes(&query).await?)
        }
        Command::Delete { id } => {
            client.delete_node(&NodeId::new(&id)).await?;
            tracing::info!("Deleted node {}", id);
            Ok(())
        }
        Command::Acl { id } => print_json(&client.get_node_acls(&NodeId::new(id)).await?),
        Command::Rename { id, name } => {
            print_json(&client.change_node_file_name(&NodeId::new(id), &name).await?)
        }
        Command::SetAttributes { json } => {
            let attributes: Value =
                serde_json::from_str(&json).context("parsing attributes JSON")?;
            print_json(&client.update_node(&attributes).await?)
        }
    }
}

async fn upload(
    client: ShockClient,
    path: std::path::PathBuf,
    node_id: Option<String>,
    attempt_resume: bool,
) -> Result<()> {
    let file = LocalFile::open(&path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    tracing::info!("Uploading {} ({} bytes)", file.path().display(), file.size());

    // Ctrl-C stops before the next chunk; the node stays resumable.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current chunk");
            on_signal.cancel();
        }
    });

    let options = UploadOptions {
        known_node_id: node_id.map(NodeId::from),
        attempt_resume,
    };

    let mut failure = None;
    let outcome = UploadService::new(client)
        .upload(
            &file,
            options,
            |p| {
                tracing::info!(
                    "{} / {} bytes uploaded to node {}",
                    p.uploaded_size,
                    p.file_size,
                    p.node_id
                )
            },
            |err| failure = Some(err),
            &cancel,
        )
        .await;

    match outcome {
        UploadOutcome::Completed { node_id } => {
            println!("{}", node_id);
            Ok(())
        }
        UploadOutcome::Cancelled { node_id } => {
            match node_id {
                Some(id) => tracing::warn!("Upload cancelled; resume later with --node-id {}", id),
                None => tracing::warn!("Upload cancelled before a node was allocated"),
            }
            Ok(())
        }
        UploadOutcome::Failed { node_id } => {
            let err = failure
                .map(anyhow::Error::from)
                .unwrap_or_else(|| anyhow::anyhow!("upload failed"));
            match node_id {
                Some(id) => Err(err.context(format!("uploading {} to node {}", path.display(), id))),
                None => Err(err.context(format!("uploading {}", path.display()))),
            }
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
