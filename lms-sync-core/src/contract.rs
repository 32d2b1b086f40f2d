//! # contract: the seams between the reconciliation engine and the outside world
//!
//! This module defines the two traits the engine drives and the plain data that
//! crosses them:
//!
//! - [`ContentClient`]: typed facade over the remote course content API.
//! - [`ContentSource`]: resolves a manifest file reference to upload-ready bytes.
//!
//! Remote payloads use the API's PascalCase field names. Reads are tolerant
//! (missing fields default); writes always serialize every field, nulls included.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`; with the `test-export-mocks` feature
//! (on by default) `MockContentClient` and `MockContentSource` are exported for
//! integration tests in dependent crates.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Object type code of a content object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ObjectType {
    #[default]
    Module,
    Topic,
    Other(i32),
}

impl From<i32> for ObjectType {
    fn from(code: i32) -> Self {
        match code {
            0 => ObjectType::Module,
            1 => ObjectType::Topic,
            other => ObjectType::Other(other),
        }
    }
}

impl From<ObjectType> for i32 {
    fn from(kind: ObjectType) -> Self {
        match kind {
            ObjectType::Module => 0,
            ObjectType::Topic => 1,
            ObjectType::Other(code) => code,
        }
    }
}

/// Topic subtype code: an uploaded file, or a link (quiz quick-links are links).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum TopicType {
    File,
    Link,
    Other(i32),
}

impl From<i32> for TopicType {
    fn from(code: i32) -> Self {
        match code {
            1 => TopicType::File,
            3 => TopicType::Link,
            other => TopicType::Other(other),
        }
    }
}

impl From<TopicType> for i32 {
    fn from(kind: TopicType) -> Self {
        match kind {
            TopicType::File => 1,
            TopicType::Link => 3,
            TopicType::Other(code) => code,
        }
    }
}

/// Rich text as the server returns it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RichText {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

/// Rich text as the server accepts it on writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RichTextInput {
    pub content: String,
    #[serde(rename = "Type")]
    pub kind: String,
}

impl RichTextInput {
    pub fn html(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            kind: "Html".to_string(),
        }
    }
}

/// A module or topic as listed under a parent. Parent linkage is implied by the
/// listing it came from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentObject {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub short_title: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: ObjectType,
    #[serde(default)]
    pub topic_type: Option<TopicType>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub is_exempt: Option<bool>,
    #[serde(default)]
    pub description: Option<RichText>,
    #[serde(default)]
    pub module_start_date: Option<String>,
    #[serde(default)]
    pub module_end_date: Option<String>,
    #[serde(default)]
    pub module_due_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl ContentObject {
    pub fn is_module_titled(&self, title: &str) -> bool {
        self.kind == ObjectType::Module && self.title == title
    }

    pub fn is_file_topic_titled(&self, title: &str) -> bool {
        self.kind == ObjectType::Topic
            && self.topic_type == Some(TopicType::File)
            && self.title == title
    }

    pub fn is_quiz_link_titled(&self, title: &str) -> bool {
        self.kind == ObjectType::Topic
            && self.topic_type == Some(TopicType::Link)
            && self.title == title
    }

    /// The stored HTML body, if the object has one.
    pub fn description_html(&self) -> Option<&str> {
        self.description.as_ref().and_then(|d| d.html.as_deref())
    }
}

/// Body of a module create or update call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModulePayload {
    pub title: String,
    pub short_title: String,
    #[serde(rename = "Type")]
    pub kind: ObjectType,
    pub module_start_date: Option<String>,
    pub module_end_date: Option<String>,
    pub module_due_date: Option<String>,
    pub is_hidden: bool,
    pub is_locked: bool,
    pub description: RichTextInput,
}

impl ModulePayload {
    pub fn new(title: &str, due_date: Option<String>, description_html: &str) -> Self {
        Self {
            title: title.to_string(),
            short_title: title.to_string(),
            kind: ObjectType::Module,
            module_start_date: None,
            module_end_date: None,
            module_due_date: due_date,
            is_hidden: false,
            is_locked: false,
            description: RichTextInput::html(description_html),
        }
    }

    /// Full overwrite of `existing` with the manifest's title, due date and body.
    /// Fields the manifest does not own are carried over from the server copy.
    pub fn overwrite(
        existing: &ContentObject,
        title: &str,
        due_date: Option<String>,
        description_html: &str,
    ) -> Self {
        Self {
            module_start_date: existing.module_start_date.clone(),
            module_end_date: existing.module_end_date.clone(),
            is_hidden: existing.is_hidden,
            is_locked: existing.is_locked,
            ..Self::new(title, due_date, description_html)
        }
    }
}

/// Body of a topic create, topic metadata update, or quiz quick-link create.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicPayload {
    pub title: String,
    pub short_title: String,
    #[serde(rename = "Type")]
    pub kind: ObjectType,
    pub topic_type: TopicType,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub due_date: Option<String>,
    pub url: String,
    pub is_hidden: bool,
    pub is_locked: bool,
    pub is_exempt: bool,
    /// Sent on updates only: asks the server to discard learner completion state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_completion_tracking: Option<bool>,
}

impl TopicPayload {
    pub fn new(
        title: &str,
        topic_type: TopicType,
        url: String,
        due_date: Option<String>,
        is_hidden: bool,
        is_exempt: bool,
    ) -> Self {
        Self {
            title: title.to_string(),
            short_title: title.to_string(),
            kind: ObjectType::Topic,
            topic_type,
            start_date: None,
            end_date: None,
            due_date,
            url,
            is_hidden,
            is_locked: false,
            is_exempt,
            reset_completion_tracking: None,
        }
    }
}

/// The course offering every call is scoped to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrgUnit {
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    /// Base path uploaded files are stored under, e.g. `/content/course123/`.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WhoAmI {
    pub identifier: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub unique_name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Quiz {
    pub quiz_id: i64,
    pub name: String,
    #[serde(default)]
    pub activity_id: Option<String>,
}

impl Quiz {
    /// Short activity code: the last path segment of the activity identifier.
    pub fn activity_code(&self) -> Option<&str> {
        self.activity_id
            .as_deref()
            .and_then(|id| id.rsplit('/').next())
            .filter(|code| !code.is_empty())
    }
}

/// One page of a paged object listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectListPage<T> {
    #[serde(default = "Vec::new")]
    pub objects: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Upload-ready bytes for a manifest file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// Name the file is published under (`.md` already swapped for `.html`).
    pub file_name: String,
}

impl SourceFile {
    pub fn is_html(&self) -> bool {
        self.mime_type == "text/html"
    }
}

/// Trait for the remote course content API.
///
/// Every call is individually signed and fails with [`SyncError::Http`] on a
/// non-success status. Implementations never retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentClient: Send + Sync {
    /// List the objects directly under `parent`, or the course root when `None`.
    async fn list_content(
        &self,
        org_unit: &str,
        parent: Option<i64>,
    ) -> Result<Vec<ContentObject>, SyncError>;

    async fn create_module(
        &self,
        org_unit: &str,
        parent: Option<i64>,
        payload: &ModulePayload,
    ) -> Result<ContentObject, SyncError>;

    async fn update_module(
        &self,
        org_unit: &str,
        module_id: i64,
        payload: &ModulePayload,
    ) -> Result<(), SyncError>;

    /// Create a file topic; metadata and file travel in one `multipart/mixed` body.
    async fn create_topic(
        &self,
        org_unit: &str,
        parent: i64,
        payload: &TopicPayload,
        file: &SourceFile,
    ) -> Result<ContentObject, SyncError>;

    async fn update_topic_metadata(
        &self,
        org_unit: &str,
        topic_id: i64,
        payload: &TopicPayload,
    ) -> Result<(), SyncError>;

    async fn update_topic_file(
        &self,
        org_unit: &str,
        topic_id: i64,
        file: &SourceFile,
    ) -> Result<(), SyncError>;

    async fn list_quizzes(&self, org_unit: &str) -> Result<Vec<Quiz>, SyncError>;

    async fn create_quiz_link(
        &self,
        org_unit: &str,
        parent: i64,
        payload: &TopicPayload,
    ) -> Result<ContentObject, SyncError>;

    async fn get_org_unit(&self, org_unit_id: i64) -> Result<OrgUnit, SyncError>;

    async fn who_am_i(&self) -> Result<WhoAmI, SyncError>;
}

/// Trait for reading manifest-referenced files.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Returns the bytes to upload for `path` (relative to the content root).
    /// Markdown comes back rendered, as `text/html`.
    async fn read(&self, path: &str) -> Result<SourceFile, SyncError>;
}

/// Kind of manifest node a [`ResultEntry`] was produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Module,
    Topic,
    Resource,
    Quiz,
}

/// Remote identity of the module an entry was created under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParentRef {
    pub id: i64,
    pub title: String,
}

/// What reconciling one manifest node produced: its semantic fields plus the
/// remote id it now lives under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultEntry {
    pub kind: EntryKind,
    pub id: i64,
    pub title: String,
    pub parent: Option<ParentRef>,
    /// Module body source.
    pub description_file_name: Option<String>,
    /// Topic or resource file source.
    pub file_name: Option<String>,
    pub due_date: Option<String>,
    pub is_required: bool,
}

impl ResultEntry {
    /// The manifest path of the document this entry publishes, if any.
    pub fn document_path(&self) -> Option<&str> {
        self.description_file_name
            .as_deref()
            .or(self.file_name.as_deref())
    }

    /// True when `path` names this entry's document or content file.
    pub fn is_published_from(&self, path: &str) -> bool {
        self.description_file_name.as_deref() == Some(path)
            || self.file_name.as_deref() == Some(path)
    }
}
