use crate::support::{memory, CannedGenerator, FailingBlobService};
use script_magic::config::SmConfig;
use script_magic::error::ApiError;
use script_magic::provider::ScriptGenerator;
use script_magic::remote::BlobService;
use script_magic::sync::Resolution;
use script_magic::tooling::cli::{CliContext, Commands, OutputFormat};
use std::sync::Arc;
use tempfile::TempDir;

const SCRIPT: &str = "# /// script\n# tags = [\"greeting\"]\n# ///\nprint('hello')\n";

fn context(dir: &TempDir, service: Option<Arc<dyn BlobService>>) -> CliContext {
    let generator: Arc<dyn ScriptGenerator> = Arc::new(CannedGenerator {
        code: SCRIPT.to_string(),
    });
    CliContext::with_services(
        SmConfig::default(),
        Some(dir.path().to_path_buf()),
        service,
        Some(generator),
        &Resolution::PullRemote,
    )
    .unwrap()
}

#[test]
fn create_show_run_delete() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let mut ctx = context(&dir, Some(remote.clone() as Arc<dyn BlobService>));

    let out = ctx
        .execute(&Commands::Create {
            name: "hello".to_string(),
            prompt: vec!["say".to_string(), "hello".to_string()],
            force: false,
        })
        .unwrap();
    assert!(out.text.contains("Created script 'hello'"));
    // mirror + script
    assert_eq!(remote.blob_count(), 2);

    let record = ctx.registry().lookup_script("hello").unwrap();
    assert_eq!(remote.content_of(&record.remote_id).unwrap(), SCRIPT);
    assert_eq!(record.tags(), vec!["greeting"]);
    assert_eq!(record.metadata["prompt"], "say hello");

    let dup = ctx.execute(&Commands::Create {
        name: "hello".to_string(),
        prompt: vec!["again".to_string()],
        force: false,
    });
    assert!(matches!(dup, Err(ApiError::ScriptExists(_))));

    let shown = ctx
        .execute(&Commands::Show {
            name: "hello".to_string(),
            format: OutputFormat::Json,
        })
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&shown.text).unwrap();
    assert_eq!(value["remoteId"], record.remote_id.as_str());

    let run = ctx
        .execute(&Commands::Run {
            name: "hello".to_string(),
            params: vec!["--loud".to_string()],
            refresh: true,
            dry_run: true,
        })
        .unwrap();
    assert!(run.text.starts_with("Would run: uv run "));
    assert!(run.text.ends_with("hello.py --loud"));
    assert_eq!(run.exit_code, 0);

    let deleted = ctx
        .execute(&Commands::Delete {
            name: "hello".to_string(),
            force: true,
        })
        .unwrap();
    assert_eq!(deleted.text, "Deleted script 'hello'");
    assert!(ctx.cache().load("hello").unwrap().is_none());
}

#[cfg(unix)]
#[test]
fn edit_refreshes_tags_but_keeps_created_at() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    let mut ctx = context(&dir, Some(remote.clone() as Arc<dyn BlobService>));
    ctx.execute(&Commands::Create {
        name: "hello".to_string(),
        prompt: vec!["say".to_string(), "hello".to_string()],
        force: false,
    })
    .unwrap();
    let before = ctx.registry().lookup_script("hello").unwrap();

    let script = dir.path().join("retag.sh");
    std::fs::write(
        &script,
        "sed 's/greeting/edited/' \"$1\" > \"$1.tmp\" && mv \"$1.tmp\" \"$1\"\n",
    )
    .unwrap();
    let editor = format!("sh {}", script.display());

    std::thread::sleep(std::time::Duration::from_millis(20));
    let out = ctx
        .execute(&Commands::Edit {
            name: "hello".to_string(),
            editor: Some(editor),
        })
        .unwrap();
    assert!(out.text.starts_with("Updated script 'hello'"));

    let after = ctx.registry().lookup_script("hello").unwrap();
    assert_eq!(after.tags(), vec!["edited"]);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.remote_id, before.remote_id);
    assert_eq!(after.metadata["prompt"], "say hello");
    assert!(remote
        .content_of(&before.remote_id)
        .unwrap()
        .contains("tags = [\"edited\"]"));
}

#[test]
fn lookup_miss_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut ctx = context(&dir, None);
    let err = ctx
        .execute(&Commands::Show {
            name: "ghost".to_string(),
            format: OutputFormat::Text,
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::ScriptNotFound(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn local_only_add_and_list() {
    let dir = TempDir::new().unwrap();
    let mut ctx = context(&dir, None);
    ctx.execute(&Commands::Add {
        name: "alpha".to_string(),
        remote_id: "gistXYZ".to_string(),
        description: Some("demo".to_string()),
        tags: vec!["x".to_string()],
    })
    .unwrap();

    let listed = ctx
        .execute(&Commands::List {
            verbose: true,
            sync: false,
            format: OutputFormat::Text,
        })
        .unwrap();
    assert!(listed.text.contains("alpha"));
    assert!(listed.text.contains("gistXYZ"));

    // Without a remote, sync reports failure but nothing local is lost.
    assert!(ctx.execute(&Commands::Sync).is_err());
    assert!(ctx.registry().lookup_script("alpha").is_some());
}

#[test]
fn status_reports_degraded_remote() {
    let dir = TempDir::new().unwrap();
    let mut ctx = context(&dir, Some(Arc::new(FailingBlobService)));
    let out = ctx
        .execute(&Commands::Status {
            format: OutputFormat::Json,
        })
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out.text).unwrap();
    assert_eq!(value["remote_configured"], true);
    assert_eq!(value["bootstrap"]["github_ok"], false);
    assert_eq!(value["bootstrap"]["action"], "local_only");
    assert_eq!(value["scripts"], 0);

    let listed = ctx
        .execute(&Commands::List {
            verbose: false,
            sync: true,
            format: OutputFormat::Text,
        })
        .unwrap();
    assert!(listed.text.starts_with("Warning: sync failed"));
}

#[test]
fn pull_without_link_fails() {
    let dir = TempDir::new().unwrap();
    let remote = memory();
    remote.set_offline(true);
    let mut ctx = context(&dir, Some(remote.clone() as Arc<dyn BlobService>));
    remote.set_offline(false);

    let err = ctx.execute(&Commands::Pull).unwrap_err();
    assert!(matches!(
        err,
        ApiError::Remote(script_magic::error::RemoteError::NotLinked)
    ));
}
