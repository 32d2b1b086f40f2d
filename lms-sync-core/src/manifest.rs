//! The local course manifest: a JSON tree of modules holding topics, quizzes,
//! resources and further modules.
//!
//! Nodes are read once per run and never mutated. Anything derived while
//! reconciling (rendered bodies, remote ids) lives in separate values.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use crate::error::SyncError;

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub modules: Vec<ManifestNode>,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let manifest: Manifest =
            serde_json::from_str(json).map_err(|e| SyncError::Manifest(e.to_string()))?;
        if let Some(bad) = manifest
            .modules
            .iter()
            .find(|node| !matches!(node, ManifestNode::Module(_)))
        {
            return Err(SyncError::Manifest(format!(
                "top-level entries must be modules, found '{}'",
                bad.type_tag()
            )));
        }
        Ok(manifest)
    }

    /// Reads and parses the manifest file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let path = path.as_ref();
        info!(manifest_path = %path.display(), "Loading course manifest");
        let json = std::fs::read_to_string(path).map_err(|e| {
            error!(error = ?e, manifest_path = %path.display(), "Failed to read manifest");
            SyncError::from_io(path, e)
        })?;
        let manifest = Self::from_json(&json)?;
        info!(modules = manifest.modules.len(), "Parsed course manifest");
        Ok(manifest)
    }
}

/// One entry of the manifest tree, closed over the content types the engine knows.
///
/// `Unknown` keeps a malformed type tag around so the tree walker can reject it
/// at the point it would have been dispatched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawNode")]
pub enum ManifestNode {
    Module(ModuleNode),
    Topic(TopicNode),
    Quiz(QuizNode),
    Resource(ResourceNode),
    Unknown(String),
}

impl ManifestNode {
    pub fn type_tag(&self) -> &str {
        match self {
            ManifestNode::Module(_) => "module",
            ManifestNode::Topic(_) => "topic",
            ManifestNode::Quiz(_) => "quiz",
            ManifestNode::Resource(_) => "resource",
            ManifestNode::Unknown(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleNode {
    pub title: String,
    pub description_file_name: Option<String>,
    pub due_date: Option<String>,
    pub children: Vec<ManifestNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicNode {
    pub title: String,
    pub file_name: String,
    pub due_date: Option<String>,
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizNode {
    pub title: String,
    pub is_required: bool,
}

/// A topic without a title of its own; it is published under its file name.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub file_name: String,
    pub due_date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    #[serde(rename = "type")]
    kind: String,
    title: Option<String>,
    file_name: Option<String>,
    description_file_name: Option<String>,
    due_date: Option<String>,
    #[serde(default)]
    is_required: bool,
    #[serde(default)]
    children: Vec<ManifestNode>,
}

impl TryFrom<RawNode> for ManifestNode {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let missing = |field: &str| format!("{} entry is missing '{field}'", raw.kind);
        let node = match raw.kind.as_str() {
            "module" => ManifestNode::Module(ModuleNode {
                title: raw.title.ok_or_else(|| missing("title"))?,
                description_file_name: raw.description_file_name,
                due_date: raw.due_date,
                children: raw.children,
            }),
            "topic" => ManifestNode::Topic(TopicNode {
                title: raw.title.ok_or_else(|| missing("title"))?,
                file_name: raw.file_name.ok_or_else(|| missing("fileName"))?,
                due_date: raw.due_date,
                is_required: raw.is_required,
            }),
            "quiz" => ManifestNode::Quiz(QuizNode {
                title: raw.title.ok_or_else(|| missing("title"))?,
                is_required: raw.is_required,
            }),
            "resource" => ManifestNode::Resource(ResourceNode {
                file_name: raw.file_name.ok_or_else(|| missing("fileName"))?,
                due_date: raw.due_date,
            }),
            _ => ManifestNode::Unknown(raw.kind.clone()),
        };
        Ok(node)
    }
}
