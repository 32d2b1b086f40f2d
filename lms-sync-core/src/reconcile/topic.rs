use tracing::{debug, error, info};

use super::{Action, Reconciled, Reconciler, ResolvedTopic};
use crate::contract::{
    ContentClient, ContentObject, ContentSource, EntryKind, ParentRef, ResultEntry, TopicPayload,
    TopicType,
};
use crate::error::SyncError;
use crate::manifest::{ResourceNode, TopicNode};

impl<'a, C, S> Reconciler<'a, C, S>
where
    C: ContentClient,
    S: ContentSource,
{
    pub async fn reconcile_topic(
        &self,
        parent: &ParentRef,
        node: &TopicNode,
    ) -> Result<ResultEntry, SyncError> {
        let file = self.source.read(&node.file_name).await?;
        let resolved = ResolvedTopic {
            title: &node.title,
            due_date: node.due_date.as_deref(),
            is_hidden: false,
            is_exempt: !node.is_required,
            file,
        };
        let outcome = self.assert_topic(parent, &resolved).await?;
        Ok(ResultEntry {
            kind: EntryKind::Topic,
            id: outcome.id,
            title: node.title.clone(),
            parent: Some(parent.clone()),
            description_file_name: None,
            file_name: Some(node.file_name.clone()),
            due_date: node.due_date.clone(),
            is_required: node.is_required,
        })
    }

    /// Resources are published under their file name, hidden and exempt.
    pub async fn reconcile_resource(
        &self,
        parent: &ParentRef,
        node: &ResourceNode,
    ) -> Result<ResultEntry, SyncError> {
        let file = self.source.read(&node.file_name).await?;
        let resolved = ResolvedTopic {
            title: &node.file_name,
            due_date: node.due_date.as_deref(),
            is_hidden: true,
            is_exempt: true,
            file,
        };
        let outcome = self.assert_topic(parent, &resolved).await?;
        Ok(ResultEntry {
            kind: EntryKind::Resource,
            id: outcome.id,
            title: node.file_name.clone(),
            parent: Some(parent.clone()),
            description_file_name: None,
            file_name: Some(node.file_name.clone()),
            due_date: node.due_date.clone(),
            is_required: false,
        })
    }

    /// Create the file topic under `parent`, or overwrite the one with the same title.
    ///
    /// An existing topic always gets its metadata and its file re-sent: there is
    /// no cheap way to tell whether the file changed.
    pub async fn assert_topic(
        &self,
        parent: &ParentRef,
        topic: &ResolvedTopic<'_>,
    ) -> Result<Reconciled, SyncError> {
        let contents = self.client.list_content(self.ou(), Some(parent.id)).await?;
        let url = format!("{}{}", self.org_unit.path, topic.file.file_name);
        let due_date = topic.due_date.map(str::to_string);

        let Some(existing) = contents.iter().find(|o| o.is_file_topic_titled(topic.title)) else {
            info!(
                title = topic.title,
                file = %topic.file.file_name,
                parent = parent.id,
                "Creating topic"
            );
            let payload = TopicPayload::new(
                topic.title,
                TopicType::File,
                url,
                due_date,
                topic.is_hidden,
                topic.is_exempt,
            );
            let created = self
                .client
                .create_topic(self.ou(), parent.id, &payload, &topic.file)
                .await
                .map_err(|e| {
                    error!(title = topic.title, error = %e, "Topic create failed");
                    e
                })?;
            return Ok(Reconciled {
                id: created.id,
                action: Action::Created,
            });
        };

        let changed = changed_fields(existing, topic, &url);
        debug!(title = topic.title, id = existing.id, ?changed, "Topic fields differing from server");

        info!(title = topic.title, id = existing.id, "Updating topic");
        let payload = TopicPayload {
            start_date: existing.start_date.clone(),
            end_date: existing.end_date.clone(),
            is_hidden: existing.is_hidden,
            is_locked: existing.is_locked,
            reset_completion_tracking: Some(true),
            ..TopicPayload::new(
                topic.title,
                TopicType::File,
                url,
                due_date,
                topic.is_hidden,
                topic.is_exempt,
            )
        };
        self.client
            .update_topic_metadata(self.ou(), existing.id, &payload)
            .await?;

        info!(file = %topic.file.file_name, id = existing.id, "Updating topic file");
        self.client
            .update_topic_file(self.ou(), existing.id, &topic.file)
            .await?;

        Ok(Reconciled {
            id: existing.id,
            action: Action::Updated,
        })
    }
}

fn changed_fields(existing: &ContentObject, topic: &ResolvedTopic<'_>, url: &str) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if existing.title != topic.title {
        changed.push("title");
    }
    if existing.url.as_deref() != Some(url) {
        changed.push("url");
    }
    if existing.due_date.as_deref() != topic.due_date {
        changed.push("due_date");
    }
    if existing.is_exempt != Some(topic.is_exempt) {
        changed.push("is_exempt");
    }
    changed
}
