use lms_sync_core::contract::{
    ContentObject, EntryKind, MockContentClient, MockContentSource, ObjectType, OrgUnit, ParentRef,
    ResultEntry, RichText, SourceFile, TopicType,
};
use lms_sync_core::error::SyncError;
use lms_sync_core::links::LinkRewriter;
use lms_sync_core::reconcile::Reconciler;

fn org_unit() -> OrgUnit {
    OrgUnit {
        identifier: "42".to_string(),
        name: "Rust 101".to_string(),
        code: None,
        path: "/content/rust101/".to_string(),
    }
}

fn html_file(name: &str, body: &str) -> SourceFile {
    SourceFile {
        bytes: body.as_bytes().to_vec(),
        mime_type: "text/html".to_string(),
        file_name: name.to_string(),
    }
}

fn module_entry(id: i64, title: &str, description: &str) -> ResultEntry {
    ResultEntry {
        kind: EntryKind::Module,
        id,
        title: title.to_string(),
        parent: None,
        description_file_name: Some(description.to_string()),
        file_name: None,
        due_date: None,
        is_required: false,
    }
}

fn topic_entry(id: i64, title: &str, file: &str, parent: &ResultEntry) -> ResultEntry {
    ResultEntry {
        kind: EntryKind::Topic,
        id,
        title: title.to_string(),
        parent: Some(ParentRef {
            id: parent.id,
            title: parent.title.clone(),
        }),
        description_file_name: None,
        file_name: Some(file.to_string()),
        due_date: None,
        is_required: true,
    }
}

const EXPECTED_MODULE_BODY: &str = r#"<p>See <a href="/d2l/le/lessons/42/topics/7" target="_parent">the topic</a>.</p>"#;

#[tokio::test]
async fn relative_link_becomes_a_topic_deep_link() {
    let a = module_entry(3, "A", "a/index.html");
    let b = topic_entry(7, "B", "b/topic.md", &a);
    let entries = vec![a, b];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "a/index.html" => Ok(html_file(
            "a/index.html",
            r#"<p>See <a href="../b/topic.md">the topic</a>.</p>"#,
        )),
        "b/topic.md" => Ok(html_file("b/topic.html", "<h1>B</h1>")),
        other => panic!("unexpected read: {other}"),
    });

    let mut client = MockContentClient::new();
    client
        .expect_list_content()
        .withf(|_, parent| parent.is_none())
        .times(1)
        .returning(|_, _| {
            Ok(vec![ContentObject {
                id: 3,
                title: "A".to_string(),
                kind: ObjectType::Module,
                description: Some(RichText {
                    text: None,
                    html: Some(r#"<p>See <a href="../b/topic.md">the topic</a>.</p>"#.to_string()),
                }),
                ..ContentObject::default()
            }])
        });
    client
        .expect_update_module()
        .withf(|ou, id, payload| {
            ou == "42" && *id == 3 && payload.description.content == EXPECTED_MODULE_BODY
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .expect("rewrite should succeed");

    assert_eq!(rewritten, 1);
}

#[tokio::test]
async fn topic_linking_to_a_module_is_republished_with_its_file() {
    let a = module_entry(3, "A", "a/index.md");
    let b = topic_entry(7, "B", "b/topic.md", &a);
    let entries = vec![a, b];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "a/index.md" => Ok(html_file("a/index.html", "<p>Module A</p>")),
        "b/topic.md" => Ok(html_file(
            "b/topic.html",
            r#"<a href="../a/index.html#top" target="_blank">Back</a>"#,
        )),
        other => panic!("unexpected read: {other}"),
    });

    let mut client = MockContentClient::new();
    client
        .expect_list_content()
        .withf(|_, parent| *parent == Some(3))
        .times(1)
        .returning(|_, _| {
            Ok(vec![ContentObject {
                id: 7,
                title: "B".to_string(),
                kind: ObjectType::Topic,
                topic_type: Some(TopicType::File),
                ..ContentObject::default()
            }])
        });
    client
        .expect_update_topic_metadata()
        .withf(|_, id, payload| *id == 7 && payload.url == "/content/rust101/b/topic.html")
        .times(1)
        .returning(|_, _, _| Ok(()));
    client
        .expect_update_topic_file()
        .withf(|_, id, file| {
            *id == 7
                && file.file_name == "b/topic.html"
                && file.mime_type == "text/html"
                && file.bytes
                    == br#"<a href="/d2l/le/lessons/42/units/3" target="_parent">Back</a>"#
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .expect("rewrite should succeed");

    assert_eq!(rewritten, 1);
}

#[tokio::test]
async fn dangling_link_fails_without_uploading() {
    let a = module_entry(3, "A", "a/index.html");
    let entries = vec![a];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|_| {
        Ok(html_file(
            "a/index.html",
            r#"<a href="https://example.com">fine</a><a href="./missing.html">broken</a>"#,
        ))
    });
    // No list or update expectations: any remote call fails the test.
    let client = MockContentClient::new();
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let err = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .unwrap_err();

    match &err {
        SyncError::UnresolvedLink {
            document,
            href,
            resolved,
        } => {
            assert_eq!(document, "a/index.html");
            assert_eq!(href, "./missing.html");
            assert_eq!(resolved, "a/missing.html");
        }
        other => panic!("expected an unresolved link, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "Could not find target of link in 'a/index.html' to './missing.html'. Resolved as 'a/missing.html'"
    );
}

#[tokio::test]
async fn documents_without_course_links_are_left_alone() {
    let a = module_entry(3, "A", "a/index.html");
    let mut slides = topic_entry(8, "slides.pdf", "a/slides.pdf", &a);
    slides.kind = EntryKind::Resource;
    let quiz = ResultEntry {
        kind: EntryKind::Quiz,
        id: 9,
        title: "Quiz".to_string(),
        parent: slides.parent.clone(),
        description_file_name: None,
        file_name: None,
        due_date: None,
        is_required: false,
    };
    let entries = vec![a, slides, quiz];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "a/index.html" => Ok(html_file(
            "a/index.html",
            r##"<a href="#top">top</a><a href="/d2l/home">home</a><a href="mailto:t@example.com">mail</a>"##,
        )),
        "a/slides.pdf" => Ok(SourceFile {
            bytes: b"%PDF-1.4 <a href=\"nowhere.html\">".to_vec(),
            mime_type: "application/pdf".to_string(),
            file_name: "a/slides.pdf".to_string(),
        }),
        other => panic!("unexpected read: {other}"),
    });
    let client = MockContentClient::new();
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .unwrap();

    assert_eq!(rewritten, 0);
}

fn remote_module(id: i64, title: &str) -> ContentObject {
    ContentObject {
        id,
        title: title.to_string(),
        kind: ObjectType::Module,
        ..ContentObject::default()
    }
}

/// Client expecting the root listing and exactly one update of module 3 with
/// `expected` as its body.
fn client_expecting_module_body(expected: &'static str) -> MockContentClient {
    let mut client = MockContentClient::new();
    client
        .expect_list_content()
        .withf(|_, parent| parent.is_none())
        .times(1)
        .returning(|_, _| Ok(vec![remote_module(3, "A")]));
    client
        .expect_update_module()
        .withf(move |_, id, payload| *id == 3 && payload.description.content == expected)
        .times(1)
        .returning(|_, _, _| Ok(()));
    client
}

#[tokio::test]
async fn entity_and_percent_encoded_hrefs_are_rewritten() {
    let a = module_entry(3, "A", "a/index.html");
    let notes = topic_entry(7, "Notes", "a/my notes.md", &a);
    let entries = vec![a, notes];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "a/index.html" => Ok(html_file(
            "a/index.html",
            r#"<p><a href="my%20notes.md?a=1&amp;b=2">notes</a></p>"#,
        )),
        "a/my notes.md" => Ok(html_file("a/my notes.html", "<p>Notes</p>")),
        other => panic!("unexpected read: {other}"),
    });
    let client = client_expecting_module_body(
        r#"<p><a href="/d2l/le/lessons/42/topics/7" target="_parent">notes</a></p>"#,
    );
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .expect("rewrite should succeed");

    assert_eq!(rewritten, 1);
}

#[tokio::test]
async fn link_to_a_resource_gets_the_topic_deep_link() {
    let a = module_entry(3, "A", "a/index.html");
    let mut slides = topic_entry(8, "slides.pdf", "a/slides.pdf", &a);
    slides.kind = EntryKind::Resource;
    let entries = vec![a, slides];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "a/index.html" => Ok(html_file("a/index.html", r#"<a href="slides.pdf">Slides</a>"#)),
        "a/slides.pdf" => Ok(SourceFile {
            bytes: b"%PDF-1.4".to_vec(),
            mime_type: "application/pdf".to_string(),
            file_name: "a/slides.pdf".to_string(),
        }),
        other => panic!("unexpected read: {other}"),
    });
    let client = client_expecting_module_body(
        r#"<a href="/d2l/le/lessons/42/topics/8" target="_parent">Slides</a>"#,
    );
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .unwrap();

    assert_eq!(rewritten, 1);
}

#[tokio::test]
async fn repeated_href_is_rewritten_everywhere_and_target_is_replaced() {
    let a = module_entry(3, "A", "a/index.html");
    let b = topic_entry(7, "B", "b/topic.md", &a);
    let entries = vec![a, b];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "a/index.html" => Ok(html_file(
            "a/index.html",
            r#"<a href="../b/topic.md" target="_self">one</a> <a href="../b/topic.md">two</a>"#,
        )),
        "b/topic.md" => Ok(html_file("b/topic.html", "<h1>B</h1>")),
        other => panic!("unexpected read: {other}"),
    });
    let client = client_expecting_module_body(concat!(
        r#"<a href="/d2l/le/lessons/42/topics/7" target="_parent">one</a> "#,
        r#"<a href="/d2l/le/lessons/42/topics/7" target="_parent">two</a>"#,
    ));
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let rewritten = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .unwrap();

    assert_eq!(rewritten, 1);
}

#[tokio::test]
async fn link_above_the_content_root_is_unresolved() {
    let a = module_entry(3, "A", "index.html");
    let escape = topic_entry(7, "Escape", "escape.md", &a);
    let entries = vec![a, escape];

    let mut source = MockContentSource::new();
    source.expect_read().returning(|path| match path {
        "index.html" => Ok(html_file("index.html", r#"<a href="../escape.md">out</a>"#)),
        "escape.md" => Ok(html_file("escape.html", "<p>x</p>")),
        other => panic!("unexpected read: {other}"),
    });
    let client = MockContentClient::new();
    let org_unit = org_unit();

    let reconciler = Reconciler::new(&client, &source, &org_unit);
    let err = LinkRewriter::new(&reconciler, &entries)
        .rewrite_all()
        .await
        .unwrap_err();

    match err {
        SyncError::UnresolvedLink { href, resolved, .. } => {
            assert_eq!(href, "../escape.md");
            assert_eq!(resolved, "../escape.md");
        }
        other => panic!("expected an unresolved link, got {other:?}"),
    }
}
