//! Create-or-update logic for each manifest node type.
//!
//! [`Reconciler`] bundles the remote client, the content source and the org unit
//! every call is scoped to. The tree walk lives in [`module`]; single-node
//! reconciliation for leaves lives in [`topic`] and [`quiz`].
//!
//! Manifest nodes are never mutated. Whatever is derived for a call (a rendered
//! body, a retitled resource) is carried in one of the `Resolved*` values.

pub mod module;
pub mod quiz;
pub mod topic;

use crate::contract::{ContentClient, ContentSource, OrgUnit, SourceFile};

pub struct Reconciler<'a, C, S> {
    client: &'a C,
    source: &'a S,
    org_unit: &'a OrgUnit,
}

impl<'a, C, S> Reconciler<'a, C, S>
where
    C: ContentClient,
    S: ContentSource,
{
    pub fn new(client: &'a C, source: &'a S, org_unit: &'a OrgUnit) -> Self {
        Self {
            client,
            source,
            org_unit,
        }
    }

    pub fn org_unit(&self) -> &OrgUnit {
        self.org_unit
    }

    pub fn source(&self) -> &S {
        self.source
    }

    fn ou(&self) -> &str {
        &self.org_unit.identifier
    }
}

/// What a single create-or-update call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
    Unchanged,
}

/// Outcome of reconciling one module or topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciled {
    pub id: i64,
    pub action: Action,
}

/// A module with its description body already read.
#[derive(Debug, Clone)]
pub struct ResolvedModule<'n> {
    pub title: &'n str,
    pub due_date: Option<&'n str>,
    pub description: String,
}

/// A topic or resource with its file already read.
#[derive(Debug, Clone)]
pub struct ResolvedTopic<'n> {
    pub title: &'n str,
    pub due_date: Option<&'n str>,
    pub is_hidden: bool,
    pub is_exempt: bool,
    pub file: SourceFile,
}
