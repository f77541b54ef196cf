//! Batch runs against the filesystem state store.

use detonator::domain::models::{AttackTechnique, Platform, RunnerOptions, TechniqueState, TerraformConfig};
use detonator::domain::ports::StateStore;
use detonator::infrastructure::FileSystemRunnerFactory;
use detonator::domain::errors::RunnerError;
use detonator::services::{BatchExecutor, BatchOperation};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn factory(root: &std::path::Path) -> Arc<FileSystemRunnerFactory> {
    Arc::new(FileSystemRunnerFactory::new(
        root,
        None,
        TerraformConfig::default(),
        CancellationToken::new(),
    ))
}

fn technique(id: &str, counter: Arc<AtomicUsize>) -> Arc<AttackTechnique> {
    Arc::new(
        AttackTechnique::new(id, Platform::Aws, move |_, providers| {
            anyhow::ensure!(providers.user_agent().starts_with("detonator_"));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .idempotent(false),
    )
}

async fn recorded_state(factory: &FileSystemRunnerFactory, technique: &Arc<AttackTechnique>) -> Option<TechniqueState> {
    factory.state_store(Arc::clone(technique)).get_technique_state().await
}

#[tokio::test]
async fn test_detonate_then_cleanup_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(dir.path());
    let executor = BatchExecutor::new(factory.clone());
    let counter = Arc::new(AtomicUsize::new(0));
    let techniques = vec![
        technique("aws.discovery.a", counter.clone()),
        technique("aws.discovery.b", counter.clone()),
    ];

    let report = executor
        .execute(&techniques, BatchOperation::Detonate { cleanup: false }, &RunnerOptions::default())
        .await;
    assert!(!report.has_failures());
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    for t in &techniques {
        assert_eq!(recorded_state(&factory, t).await, Some(TechniqueState::Detonated));
        let on_disk = std::fs::read_to_string(dir.path().join(&t.id).join(".state")).unwrap();
        assert_eq!(on_disk, "DETONATED");
    }

    // Non-idempotent techniques refuse a second detonation without force.
    let report = executor
        .execute(&techniques, BatchOperation::Detonate { cleanup: false }, &RunnerOptions::default())
        .await;
    assert_eq!(report.failures().count(), 2);
    assert!(report
        .failures()
        .all(|(_, err)| matches!(err, RunnerError::AlreadyDetonated { .. })));
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    let report = executor
        .execute(&techniques, BatchOperation::CleanUp, &RunnerOptions::default())
        .await;
    assert!(!report.has_failures());
    for t in &techniques {
        assert_eq!(recorded_state(&factory, t).await, None);
        assert!(!dir.path().join(&t.id).exists());
    }
}

#[tokio::test]
async fn test_one_bad_technique_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    let factory = factory(dir.path());
    let executor = BatchExecutor::new(factory.clone());
    let counter = Arc::new(AtomicUsize::new(0));
    let broken = Arc::new(AttackTechnique::new("aws.broken", Platform::Aws, |_, _| {
        anyhow::bail!("AccessDenied: not authorized to perform iam:CreateUser")
    }));
    let techniques = vec![
        technique("aws.t1", counter.clone()),
        broken.clone(),
        technique("aws.t3", counter.clone()),
    ];

    let report = executor
        .execute(&techniques, BatchOperation::Detonate { cleanup: false }, &RunnerOptions::default())
        .await;

    assert_eq!(report.outcomes.len(), 3);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "aws.broken");
    assert!(failures[0].1.to_string().contains("AccessDenied"));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(recorded_state(&factory, &broken).await, None);
}

#[tokio::test]
async fn test_cancelled_batch_reports_aborted_techniques() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let factory = Arc::new(FileSystemRunnerFactory::new(
        dir.path(),
        None,
        TerraformConfig::default(),
        token,
    ));
    let executor = BatchExecutor::new(factory);
    let techniques = vec![Arc::new(
        AttackTechnique::new("aws.t1", Platform::Aws, |_, _| Ok(()))
            .with_prerequisites("resource \"null_resource\" \"x\" {}"),
    )];

    let report = executor
        .execute(&techniques, BatchOperation::WarmUp, &RunnerOptions::default())
        .await;

    assert!(report.was_cancelled());
    assert!(report.failures().all(|(_, err)| err.is_cancelled()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_warm_up_drives_terraform_binary() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let bin_dir = tempfile::tempdir().unwrap();
    let script = bin_dir.path().join("terraform");
    std::fs::write(
        &script,
        r#"#!/bin/sh
log="$(dirname "$0")/calls.log"
echo "$1 $TF_APPEND_USER_AGENT" >> "$log"
case "$1" in
  init) mkdir -p .terraform ;;
  output) echo '{"bucket":{"sensitive":false,"type":"string","value":"exfil-target"}}' ;;
esac
exit 0
"#,
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let config = TerraformConfig {
        binary_path: script.to_string_lossy().into_owned(),
        ..Default::default()
    };
    let factory = Arc::new(FileSystemRunnerFactory::new(
        dir.path(),
        Some("6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f".to_string()),
        config,
        CancellationToken::new(),
    ));
    let technique = Arc::new(
        AttackTechnique::new("aws.t1", Platform::Aws, |outputs, _| {
            anyhow::ensure!(outputs.get("bucket").map(String::as_str) == Some("exfil-target"));
            Ok(())
        })
        .with_prerequisites("resource \"null_resource\" \"x\" {}"),
    );
    let executor = BatchExecutor::new(factory.clone());

    let report = executor
        .execute(
            &[technique.clone()],
            BatchOperation::Detonate { cleanup: false },
            &RunnerOptions::default(),
        )
        .await;

    assert!(!report.has_failures(), "{:?}", report.outcomes);
    let technique_dir = dir.path().join("aws.t1");
    assert!(technique_dir.join("main.tf").exists());
    assert!(technique_dir.join(".terraform").exists());
    let outputs = std::fs::read_to_string(technique_dir.join(".terraform-outputs")).unwrap();
    assert!(outputs.contains("exfil-target"));

    let calls = std::fs::read_to_string(bin_dir.path().join("calls.log")).unwrap();
    let subcommands: Vec<_> = calls.lines().filter_map(|l| l.split_whitespace().next()).collect();
    assert_eq!(subcommands, vec!["init", "apply", "output"]);
    assert!(calls
        .lines()
        .all(|l| l.ends_with("detonator_6f1c2d3e-4b5a-4c7d-8e9f-0a1b2c3d4e5f")));
}
