//! The tree walker: reconcile a module, then each of its children in manifest
//! order, threading the module's remote id down as the children's parent.
//!
//! Everything here is strictly sequential. A child cannot be created before its
//! parent has an id, and sibling order on the server follows creation order.

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, error, info};

use super::{Action, Reconciled, Reconciler, ResolvedModule};
use crate::contract::{
    ContentClient, ContentObject, ContentSource, EntryKind, ModulePayload, ParentRef, ResultEntry,
};
use crate::error::SyncError;
use crate::manifest::{ManifestNode, ModuleNode};

impl<'a, C, S> Reconciler<'a, C, S>
where
    C: ContentClient,
    S: ContentSource,
{
    /// Reconcile `node` under `parent` (the course root when `None`) and return
    /// one entry per manifest node, in pre-order.
    pub async fn reconcile(
        &self,
        node: &ManifestNode,
        parent: Option<&ParentRef>,
    ) -> Result<Vec<ResultEntry>, SyncError> {
        match (node, parent) {
            (ManifestNode::Module(module), _) => self.reconcile_module(module, parent).await,
            (ManifestNode::Topic(topic), Some(parent)) => {
                Ok(vec![self.reconcile_topic(parent, topic).await?])
            }
            (ManifestNode::Resource(resource), Some(parent)) => {
                Ok(vec![self.reconcile_resource(parent, resource).await?])
            }
            (ManifestNode::Quiz(quiz), Some(parent)) => {
                Ok(vec![self.reconcile_quiz(parent, quiz).await?])
            }
            (ManifestNode::Unknown(tag), _) => Err(unknown_type(tag)),
            (other, None) => Err(SyncError::Manifest(format!(
                "a {} must be placed inside a module",
                other.type_tag()
            ))),
        }
    }

    /// Boxed so that modules can nest to any depth.
    pub fn reconcile_module<'s>(
        &'s self,
        node: &'s ModuleNode,
        parent: Option<&'s ParentRef>,
    ) -> BoxFuture<'s, Result<Vec<ResultEntry>, SyncError>> {
        async move {
            let resolved = self.resolve_module(node).await?;
            let outcome = self.assert_module(&resolved, parent).await?;

            let mut entries = vec![ResultEntry {
                kind: EntryKind::Module,
                id: outcome.id,
                title: node.title.clone(),
                parent: parent.cloned(),
                description_file_name: node.description_file_name.clone(),
                file_name: None,
                due_date: node.due_date.clone(),
                is_required: false,
            }];

            let this = ParentRef {
                id: outcome.id,
                title: node.title.clone(),
            };
            for child in &node.children {
                match child {
                    ManifestNode::Module(module) => {
                        let nested = self.reconcile_module(module, Some(&this)).await?;
                        entries.extend(nested);
                    }
                    ManifestNode::Topic(topic) => {
                        entries.push(self.reconcile_topic(&this, topic).await?);
                    }
                    ManifestNode::Resource(resource) => {
                        entries.push(self.reconcile_resource(&this, resource).await?);
                    }
                    ManifestNode::Quiz(quiz) => {
                        entries.push(self.reconcile_quiz(&this, quiz).await?);
                    }
                    ManifestNode::Unknown(tag) => return Err(unknown_type(tag)),
                }
            }
            Ok(entries)
        }
        .boxed()
    }

    async fn resolve_module<'n>(&self, node: &'n ModuleNode) -> Result<ResolvedModule<'n>, SyncError> {
        let description = match &node.description_file_name {
            Some(path) => {
                let file = self.source.read(path).await?;
                String::from_utf8_lossy(&file.bytes).into_owned()
            }
            None => String::new(),
        };
        Ok(ResolvedModule {
            title: &node.title,
            due_date: node.due_date.as_deref(),
            description,
        })
    }

    /// Create the module under `parent`, or bring the same-titled one in line
    /// with `module`. Only title, body and due date are compared; any
    /// difference rewrites all three.
    pub async fn assert_module(
        &self,
        module: &ResolvedModule<'_>,
        parent: Option<&ParentRef>,
    ) -> Result<Reconciled, SyncError> {
        let parent_id = parent.map(|p| p.id);
        let contents = self.client.list_content(self.ou(), parent_id).await?;
        let due_date = module.due_date.map(str::to_string);

        let Some(existing) = contents.iter().find(|o| o.is_module_titled(module.title)) else {
            info!(title = module.title, parent = ?parent_id, "Creating module");
            let payload = ModulePayload::new(module.title, due_date, &module.description);
            let created = self
                .client
                .create_module(self.ou(), parent_id, &payload)
                .await
                .map_err(|e| {
                    error!(title = module.title, error = %e, "Module create failed");
                    e
                })?;
            return Ok(Reconciled {
                id: created.id,
                action: Action::Created,
            });
        };

        let changed = changed_fields(existing, module);
        if changed.is_empty() {
            info!(title = module.title, id = existing.id, "Module unchanged");
            return Ok(Reconciled {
                id: existing.id,
                action: Action::Unchanged,
            });
        }

        debug!(title = module.title, id = existing.id, ?changed, "Module is dirty");
        info!(title = module.title, id = existing.id, "Updating module");
        let payload = ModulePayload::overwrite(existing, module.title, due_date, &module.description);
        self.client
            .update_module(self.ou(), existing.id, &payload)
            .await
            .map_err(|e| {
                error!(title = module.title, error = %e, "Module update failed");
                e
            })?;
        Ok(Reconciled {
            id: existing.id,
            action: Action::Updated,
        })
    }
}

fn changed_fields(existing: &ContentObject, module: &ResolvedModule<'_>) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if existing.title != module.title {
        changed.push("title");
    }
    if existing.description_html().unwrap_or_default() != module.description {
        changed.push("description");
    }
    if existing.module_due_date.as_deref() != module.due_date {
        changed.push("due_date");
    }
    changed
}

fn unknown_type(tag: &str) -> SyncError {
    error!(content_type = tag, "Unknown content type in manifest");
    SyncError::UnknownContentType(tag.to_string())
}
