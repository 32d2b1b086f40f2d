use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::tempdir;

#[test]
fn sync_fails_with_missing_config_file() {
    let mut cmd = Command::cargo_bin("lms-sync").expect("Binary exists");

    cmd.arg("sync").arg("--config").arg("does-not-exist.yaml");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn sync_fails_when_manifest_is_absent() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.yaml");
    write(
        &config,
        format!(
            "instance_domain: school.brightspace.com\norg_unit_id: 1\ncontent_directory: {}\nmanifest_path: {}\n",
            dir.path().display(),
            dir.path().join("manifest.json").display()
        ),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("lms-sync").expect("Binary exists");
    cmd.arg("sync")
        .arg("--config")
        .arg(&config)
        .arg("--dry-run")
        .env("VALENCE_APP_ID", "a")
        .env("VALENCE_APP_KEY", "b")
        .env("VALENCE_USER_ID", "c")
        .env("VALENCE_USER_KEY", "d");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn help_lists_the_sync_command() {
    let mut cmd = Command::cargo_bin("lms-sync").expect("Binary exists");

    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sync"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Collects emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use lms_sync::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Sync {
            config: std::path::PathBuf::from("dummy.yaml"),
            dry_run: true,
        },
    };

    let result = run(cli).await;

    assert!(result.is_err());
    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
