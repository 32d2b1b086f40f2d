//! Second pass over a finished reconciliation: point relative links between
//! course documents at the remote objects they were published as.
//!
//! Every href in a document is resolved before anything is written, so a
//! dangling link fails the document without a partial upload. Documents are
//! independent of each other and are processed concurrently.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use futures::future::try_join_all;
use html_escape::decode_html_entities;
use lol_html::{element, rewrite_str, RewriteStrSettings};
use percent_encoding::percent_decode_str;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::{debug, error, info};

use crate::contract::{
    ContentClient, ContentSource, EntryKind, OrgUnit, ResultEntry, SourceFile,
};
use crate::error::SyncError;
use crate::reconcile::{Reconciler, ResolvedModule, ResolvedTopic};

static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("static regex"));

pub struct LinkRewriter<'r, 'a, C, S> {
    reconciler: &'r Reconciler<'a, C, S>,
    entries: &'r [ResultEntry],
}

impl<'r, 'a, C, S> LinkRewriter<'r, 'a, C, S>
where
    C: ContentClient,
    S: ContentSource,
{
    pub fn new(reconciler: &'r Reconciler<'a, C, S>, entries: &'r [ResultEntry]) -> Self {
        Self {
            reconciler,
            entries,
        }
    }

    /// Rewrite every document that links to another course document and
    /// re-upload it. Returns how many documents were re-uploaded.
    pub async fn rewrite_all(&self) -> Result<usize, SyncError> {
        let documents = self
            .entries
            .iter()
            .filter(|entry| entry.document_path().is_some())
            .map(|entry| self.rewrite_document(entry));
        let rewritten = try_join_all(documents).await?;
        let count = rewritten.into_iter().filter(|changed| *changed).count();
        info!(documents = count, "Rewrote course links");
        Ok(count)
    }

    /// Returns true if the document had links to rewrite and was re-uploaded.
    pub async fn rewrite_document(&self, entry: &ResultEntry) -> Result<bool, SyncError> {
        let Some(path) = entry.document_path() else {
            return Ok(false);
        };
        let file = self.reconciler.source().read(path).await?;
        if !file.is_html() {
            debug!(file = path, mime = %file.mime_type, "Not scanning non-html document");
            return Ok(false);
        }

        let html = String::from_utf8_lossy(&file.bytes).into_owned();
        let replacements = self.resolve_links(path, &html)?;
        if replacements.is_empty() {
            debug!(file = path, "No course links in document");
            return Ok(false);
        }

        let rewritten = rewrite_hrefs(&html, &replacements)?;
        self.republish(entry, file, rewritten).await?;
        Ok(true)
    }

    /// Map each relative href in `html`, entity-decoded, to its deep-link.
    fn resolve_links(&self, document: &str, html: &str) -> Result<HashMap<String, String>, SyncError> {
        let mut replacements = HashMap::new();
        for href in collect_hrefs(html) {
            if replacements.contains_key(&href) {
                continue;
            }
            let Some(target_path) = link_target(&href) else {
                continue;
            };
            let candidates = candidate_paths(document, &target_path);
            let target = self.entries.iter().find(|entry| {
                candidates
                    .iter()
                    .any(|candidate| entry.is_published_from(candidate))
            });
            let Some(target) = target else {
                error!(file = document, href = %href, "Link target is not part of the course");
                return Err(SyncError::UnresolvedLink {
                    document: document.to_string(),
                    href,
                    resolved: candidates.into_iter().next().unwrap_or(target_path),
                });
            };

            let new_href = deep_link(self.reconciler.org_unit(), target);
            info!(file = document, href = %href, new_href = %new_href, "Updating link");
            replacements.insert(href, new_href);
        }
        Ok(replacements)
    }

    async fn republish(
        &self,
        entry: &ResultEntry,
        file: SourceFile,
        rewritten: String,
    ) -> Result<(), SyncError> {
        match entry.kind {
            EntryKind::Module => {
                let module = ResolvedModule {
                    title: &entry.title,
                    due_date: entry.due_date.as_deref(),
                    description: rewritten,
                };
                self.reconciler
                    .assert_module(&module, entry.parent.as_ref())
                    .await?;
            }
            EntryKind::Topic | EntryKind::Resource => {
                let Some(parent) = entry.parent.as_ref() else {
                    return Err(SyncError::Manifest(format!(
                        "'{}' has no parent module",
                        entry.title
                    )));
                };
                let is_resource = entry.kind == EntryKind::Resource;
                let topic = ResolvedTopic {
                    title: &entry.title,
                    due_date: entry.due_date.as_deref(),
                    is_hidden: is_resource,
                    is_exempt: is_resource || !entry.is_required,
                    file: SourceFile {
                        bytes: rewritten.into_bytes(),
                        ..file
                    },
                };
                self.reconciler.assert_topic(parent, &topic).await?;
            }
            EntryKind::Quiz => {}
        }
        Ok(())
    }
}

/// Deep-link into the course viewer for a published entry.
pub fn deep_link(org_unit: &OrgUnit, target: &ResultEntry) -> String {
    match target.kind {
        EntryKind::Module => format!(
            "/d2l/le/lessons/{}/units/{}",
            org_unit.identifier, target.id
        ),
        EntryKind::Topic | EntryKind::Resource | EntryKind::Quiz => format!(
            "/d2l/le/lessons/{}/topics/{}",
            org_unit.identifier, target.id
        ),
    }
}

/// Pre-order walk over the `<a href>` elements below a root element.
pub struct Anchors<'a> {
    stack: Vec<ElementRef<'a>>,
}

impl<'a> Anchors<'a> {
    pub fn new(root: ElementRef<'a>) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for Anchors<'a> {
    type Item = ElementRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(element) = self.stack.pop() {
            let children: Vec<_> = element.children().filter_map(ElementRef::wrap).collect();
            self.stack.extend(children.into_iter().rev());
            if element.value().name() == "a" && element.value().attr("href").is_some() {
                return Some(element);
            }
        }
        None
    }
}

/// Hrefs of every anchor in document order.
pub fn collect_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    Anchors::new(document.root_element())
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect()
}

/// The percent-decoded path part of a relative href, or `None` for hrefs that
/// leave the course tree: those with a scheme, site-absolute ones and bare
/// fragments.
pub fn link_target(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('/') || href.starts_with('#') || URL_SCHEME.is_match(href) {
        return None;
    }
    let end = href.find(['?', '#']).unwrap_or(href.len());
    let path = &href[..end];
    if path.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(Cow::into_owned)
        .unwrap_or_else(|_| path.to_string());
    Some(decoded)
}

/// Manifest paths `target` may refer to from `document`, most likely first.
/// Empty when every reading climbs above the content root.
pub fn candidate_paths(document: &str, target: &str) -> Vec<String> {
    let directory = document.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let mut paths: Vec<String> = normalize(directory, target).into_iter().collect();
    if !target.starts_with('.') {
        if let Some(from_root) = normalize("", target) {
            if !paths.contains(&from_root) {
                paths.push(from_root);
            }
        }
    }
    let markdown: Vec<String> = paths
        .iter()
        .filter_map(|p| p.strip_suffix(".html").map(|stem| format!("{stem}.md")))
        .collect();
    paths.extend(markdown);
    paths
}

/// Join `relative` onto `directory`, folding `.` and `..` segments. `None` if a
/// `..` would leave the content root.
pub fn normalize(directory: &str, relative: &str) -> Option<String> {
    let mut segments: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Replace hrefs found in `replacements` and target them at the parent frame.
/// `lol_html` hands out raw attribute text, so it is entity-decoded before the
/// lookup. The rest of the markup is left as it was.
pub fn rewrite_hrefs(html: &str, replacements: &HashMap<String, String>) -> Result<String, SyncError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!("a[href]", |el| {
                let new_href = el
                    .get_attribute("href")
                    .and_then(|href| replacements.get(&*decode_html_entities(&href)));
                if let Some(new_href) = new_href {
                    el.set_attribute("href", new_href)?;
                    el.set_attribute("target", "_parent")?;
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| SyncError::Html(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_links_leaving_the_course() {
        assert_eq!(link_target("https://example.com/a.html"), None);
        assert_eq!(link_target("mailto:someone@example.com"), None);
        assert_eq!(link_target("/d2l/home"), None);
        assert_eq!(link_target("#section"), None);
        assert_eq!(link_target(""), None);
        assert_eq!(link_target("../b/topic.md#intro").as_deref(), Some("../b/topic.md"));
        assert_eq!(link_target("page.html?x=1").as_deref(), Some("page.html"));
    }

    #[test]
    fn percent_encoded_paths_are_decoded() {
        assert_eq!(link_target("my%20notes.md").as_deref(), Some("my notes.md"));
        assert_eq!(link_target("caf%C3%A9.md?q=%20").as_deref(), Some("café.md"));
        // Not valid UTF-8 once decoded: kept as written.
        assert_eq!(link_target("bad%FF.md").as_deref(), Some("bad%FF.md"));
    }

    #[test]
    fn normalizes_against_the_document_directory() {
        assert_eq!(normalize("a", "../b/topic.md").as_deref(), Some("b/topic.md"));
        assert_eq!(normalize("a/b", "./c/../d.html").as_deref(), Some("a/b/d.html"));
    }

    #[test]
    fn climbing_above_the_root_has_no_candidate() {
        assert_eq!(normalize("", "../escape.md"), None);
        assert_eq!(normalize("a", "../../escape.md"), None);
        assert!(candidate_paths("index.html", "../escape.md").is_empty());
        assert_eq!(
            candidate_paths("a/index.html", "x/../../../y.md"),
            Vec::<String>::new()
        );
    }

    #[test]
    fn tries_root_relative_and_markdown_sources() {
        assert_eq!(
            candidate_paths("week1/index.md", "week2/notes.html"),
            vec![
                "week1/week2/notes.html".to_string(),
                "week2/notes.html".to_string(),
                "week1/week2/notes.md".to_string(),
                "week2/notes.md".to_string(),
            ]
        );
        assert_eq!(
            candidate_paths("a/index.html", "../b/topic.md"),
            vec!["b/topic.md".to_string()]
        );
    }

    #[test]
    fn finds_anchors_in_document_order() {
        let html = r#"<div><a href="one">1</a><p><a href="two">2</a></p></div><a>none</a><a href="three">3</a>"#;
        assert_eq!(collect_hrefs(html), vec!["one", "two", "three"]);
    }

    #[test]
    fn rewrites_only_mapped_links() {
        let replacements = HashMap::from([(
            "b.html".to_string(),
            "/d2l/le/lessons/1/topics/2".to_string(),
        )]);
        let out = rewrite_hrefs(
            r#"<p><a href="b.html">B</a> <a href="https://x.org">X</a></p>"#,
            &replacements,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"<p><a href="/d2l/le/lessons/1/topics/2" target="_parent">B</a> <a href="https://x.org">X</a></p>"#
        );
    }

    #[test]
    fn discovery_and_rewrite_agree_on_entity_encoded_hrefs() {
        let html = r#"<p><a href="b.html?x=1&amp;y=2">B</a></p>"#;
        let hrefs = collect_hrefs(html);
        assert_eq!(hrefs, vec!["b.html?x=1&y=2"]);

        let replacements = HashMap::from([(hrefs[0].clone(), "/d2l/le/lessons/1/topics/2".to_string())]);
        let out = rewrite_hrefs(html, &replacements).unwrap();
        assert_eq!(
            out,
            r#"<p><a href="/d2l/le/lessons/1/topics/2" target="_parent">B</a></p>"#
        );
    }
}
