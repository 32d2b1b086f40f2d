use tracing::{error, info};

use super::Reconciler;
use crate::contract::{
    ContentClient, ContentSource, EntryKind, OrgUnit, ParentRef, ResultEntry, TopicPayload,
    TopicType,
};
use crate::error::SyncError;
use crate::manifest::QuizNode;

/// Quick-link URL that opens quiz `code` inside the course.
pub fn quiz_link_url(org_unit: &OrgUnit, code: &str) -> String {
    format!(
        "/d2l/common/dialogs/quickLink/quickLink.d2l?ou={}&type=quiz&rcode={}",
        org_unit.identifier, code
    )
}

impl<'a, C, S> Reconciler<'a, C, S>
where
    C: ContentClient,
    S: ContentSource,
{
    /// Link the course quiz titled like `node` into `parent`.
    ///
    /// An existing quick-link is left alone: it has nothing worth updating.
    pub async fn reconcile_quiz(
        &self,
        parent: &ParentRef,
        node: &QuizNode,
    ) -> Result<ResultEntry, SyncError> {
        let entry = |id| ResultEntry {
            kind: EntryKind::Quiz,
            id,
            title: node.title.clone(),
            parent: Some(parent.clone()),
            description_file_name: None,
            file_name: None,
            due_date: None,
            is_required: node.is_required,
        };

        let contents = self.client.list_content(self.ou(), Some(parent.id)).await?;
        if let Some(existing) = contents.iter().find(|o| o.is_quiz_link_titled(&node.title)) {
            info!(title = %node.title, id = existing.id, "Quiz link already exists");
            return Ok(entry(existing.id));
        }

        let quizzes = self.client.list_quizzes(self.ou()).await?;
        let Some(quiz) = quizzes.iter().find(|q| q.name == node.title) else {
            error!(title = %node.title, available = quizzes.len(), "No quiz with this name");
            return Err(SyncError::QuizNotFound(node.title.clone()));
        };
        let code = quiz.activity_code().ok_or_else(|| {
            error!(title = %node.title, quiz_id = quiz.quiz_id, "Quiz has no activity id");
            SyncError::QuizNotFound(node.title.clone())
        })?;

        info!(title = %node.title, quiz_id = quiz.quiz_id, parent = parent.id, "Creating quiz topic");
        let payload = TopicPayload::new(
            &node.title,
            TopicType::Link,
            quiz_link_url(self.org_unit, code),
            None,
            false,
            !node.is_required,
        );
        let created = self
            .client
            .create_quiz_link(self.ou(), parent.id, &payload)
            .await?;
        Ok(entry(created.id))
    }
}
