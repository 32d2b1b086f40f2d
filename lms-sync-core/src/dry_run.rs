//! A [`ContentClient`] decorator that reads through and writes nothing.

use async_trait::async_trait;
use tracing::info;

use crate::contract::{
    ContentClient, ContentObject, ModulePayload, ObjectType, OrgUnit, Quiz, SourceFile,
    TopicPayload, WhoAmI,
};
use crate::error::SyncError;

/// Id handed out for objects a dry run pretends to create.
pub const DRY_RUN_ID: i64 = -1;

pub struct DryRunClient<C> {
    inner: C,
}

impl<C> DryRunClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

fn placeholder(title: &str, kind: ObjectType) -> ContentObject {
    ContentObject {
        id: DRY_RUN_ID,
        title: title.to_string(),
        short_title: Some(title.to_string()),
        kind,
        ..ContentObject::default()
    }
}

#[async_trait]
impl<C: ContentClient> ContentClient for DryRunClient<C> {
    async fn list_content(
        &self,
        org_unit: &str,
        parent: Option<i64>,
    ) -> Result<Vec<ContentObject>, SyncError> {
        if parent == Some(DRY_RUN_ID) {
            return Ok(Vec::new());
        }
        self.inner.list_content(org_unit, parent).await
    }

    async fn create_module(
        &self,
        _org_unit: &str,
        parent: Option<i64>,
        payload: &ModulePayload,
    ) -> Result<ContentObject, SyncError> {
        info!(title = %payload.title, parent = ?parent, "[dry run] would create module");
        Ok(placeholder(&payload.title, ObjectType::Module))
    }

    async fn update_module(
        &self,
        _org_unit: &str,
        module_id: i64,
        payload: &ModulePayload,
    ) -> Result<(), SyncError> {
        info!(title = %payload.title, id = module_id, "[dry run] would update module");
        Ok(())
    }

    async fn create_topic(
        &self,
        _org_unit: &str,
        parent: i64,
        payload: &TopicPayload,
        file: &SourceFile,
    ) -> Result<ContentObject, SyncError> {
        info!(
            title = %payload.title,
            file = %file.file_name,
            size = file.bytes.len(),
            parent,
            "[dry run] would create topic"
        );
        Ok(placeholder(&payload.title, ObjectType::Topic))
    }

    async fn update_topic_metadata(
        &self,
        _org_unit: &str,
        topic_id: i64,
        payload: &TopicPayload,
    ) -> Result<(), SyncError> {
        info!(title = %payload.title, id = topic_id, "[dry run] would update topic");
        Ok(())
    }

    async fn update_topic_file(
        &self,
        _org_unit: &str,
        topic_id: i64,
        file: &SourceFile,
    ) -> Result<(), SyncError> {
        info!(file = %file.file_name, id = topic_id, "[dry run] would upload topic file");
        Ok(())
    }

    async fn list_quizzes(&self, org_unit: &str) -> Result<Vec<Quiz>, SyncError> {
        self.inner.list_quizzes(org_unit).await
    }

    async fn create_quiz_link(
        &self,
        _org_unit: &str,
        parent: i64,
        payload: &TopicPayload,
    ) -> Result<ContentObject, SyncError> {
        info!(title = %payload.title, url = %payload.url, parent, "[dry run] would link quiz");
        Ok(placeholder(&payload.title, ObjectType::Topic))
    }

    async fn get_org_unit(&self, org_unit_id: i64) -> Result<OrgUnit, SyncError> {
        self.inner.get_org_unit(org_unit_id).await
    }

    async fn who_am_i(&self) -> Result<WhoAmI, SyncError> {
        self.inner.who_am_i().await
    }
}
