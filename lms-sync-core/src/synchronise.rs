//! High-level pipeline: reconcile the manifest tree, then rewrite course links.
//!
//! The two passes are strictly ordered. The tree walk creates or updates every
//! module, topic, resource and quiz link in manifest order; once every entry has
//! a remote id, the link rewriter re-publishes the documents that reference
//! each other.
//!
//! # Error Handling
//! Every failure is fatal and returned as is. Whatever was already written to
//! the course stays there; running again picks it up by title.
//!
//! # Navigation
//! - Main entrypoint: [`reconcile_and_rewrite`]
//! - Output: [`SynchroniseReport`]

use tracing::{error, info};

use crate::contract::{ContentClient, ContentSource, OrgUnit, ResultEntry};
use crate::error::SyncError;
use crate::links::LinkRewriter;
use crate::manifest::Manifest;
use crate::reconcile::Reconciler;

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct SynchroniseReport {
    pub org_unit: OrgUnit,
    /// One entry per manifest node, in manifest pre-order.
    pub entries: Vec<ResultEntry>,
    pub documents_rewritten: usize,
}

pub async fn reconcile_and_rewrite<C, S>(
    client: &C,
    source: &S,
    manifest: &Manifest,
    org_unit_id: i64,
) -> Result<SynchroniseReport, SyncError>
where
    C: ContentClient,
    S: ContentSource,
{
    info!(org_unit_id, "[SYNC] Starting course synchronisation");

    let user = client.who_am_i().await?;
    info!(
        user_id = %user.identifier,
        user = %user.unique_name,
        "Running in user context"
    );

    let org_unit = client.get_org_unit(org_unit_id).await.map_err(|e| {
        error!(org_unit_id, error = %e, "[SYNC] Could not fetch course offering");
        e
    })?;
    info!(
        org_unit = %org_unit.identifier,
        name = %org_unit.name,
        path = %org_unit.path,
        "Found course offering"
    );

    let reconciler = Reconciler::new(client, source, &org_unit);
    let mut entries = Vec::new();
    for node in &manifest.modules {
        let reconciled = reconciler.reconcile(node, None).await?;
        entries.extend(reconciled);
    }
    info!(entries = entries.len(), "[SYNC] Reconciled course tree");

    let documents_rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await?;

    info!(
        entries = entries.len(),
        documents_rewritten, "[SYNC] Synchronisation finished"
    );
    Ok(SynchroniseReport {
        org_unit,
        entries,
        documents_rewritten,
    })
}
