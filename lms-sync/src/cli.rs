///
/// This module implements the CLI interface for lms-sync: command parsing,
/// wiring of the concrete client and content source, and the async [`run`]
/// entrypoint used by `main` and the integration tests.
///
/// All reconciliation logic lives in the [`lms-sync-core`] crate. This module
/// is strictly CLI glue.
///
/// [`lms-sync-core`]: ../../lms-sync-core/
use crate::auth::ValenceSigner;
use crate::client::ValenceClient;
use crate::load_config::{load_config, CliConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use lms_sync_core::content_source::FileContentSource;
use lms_sync_core::contract::ContentClient;
use lms_sync_core::dry_run::DryRunClient;
use lms_sync_core::manifest::Manifest;
use lms_sync_core::synchronise::{reconcile_and_rewrite, SynchroniseReport};
use std::path::PathBuf;

/// CLI for lms-sync: publish a local course content tree to Brightspace.
#[derive(Parser)]
#[clap(
    name = "lms-sync",
    version,
    about = "Synchronise a manifest of Markdown/HTML course content into a Brightspace course"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or update the course content described by the manifest, then rewrite links
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Log every write instead of sending it
        #[clap(long)]
        dry_run: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, dry_run } => {
            let mut config = load_config(config)?;
            config.dry_run |= dry_run;
            tracing::info!(command = "sync", dry_run = config.dry_run, "Starting synchronisation");

            let manifest = Manifest::load(&config.manifest_path)?;
            let source = FileContentSource::new(&config.content_directory)
                .with_render_timeout(config.render_timeout);
            let signer = ValenceSigner::new(config.credentials.clone(), config.clock_skew_seconds);
            let client = ValenceClient::new(config.instance_url.clone(), signer);

            let report = if config.dry_run {
                synchronise(&DryRunClient::new(client), &source, &manifest, &config).await?
            } else {
                synchronise(&client, &source, &manifest, &config).await?
            };

            tracing::info!(
                command = "sync",
                entries = report.entries.len(),
                documents_rewritten = report.documents_rewritten,
                "Synchronisation complete"
            );
            println!("{}", serde_json::to_string_pretty(&report.entries)?);
            Ok(())
        }
    }
}

async fn synchronise<C: ContentClient>(
    client: &C,
    source: &FileContentSource,
    manifest: &Manifest,
    config: &CliConfig,
) -> Result<SynchroniseReport> {
    reconcile_and_rewrite(client, source, manifest, config.org_unit_id)
        .await
        .map_err(|e| {
            tracing::error!(command = "sync", error = %e, "Synchronisation failed");
            anyhow::Error::new(e)
        })
}
