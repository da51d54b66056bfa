//! Key Reconciler Integration Tests
//!
//! Drive the Key reconciler against the in-memory store and forge:
//! - Secret materialization and public key verification
//! - Waiting on the referenced Repository
//! - Remote key creation, drift repair and relocation
//! - Deletion with and without destructive deletes

#[path = "integration/common/mod.rs"]
mod common;

use common::*;
use forge_controller::constants::{KEY_FINALIZER, SECRET_PRIVATE_KEY, SECRET_PUBLIC_KEY};
use forge_controller::controller::reconciler::finalizer::has_finalizer;
use forge_controller::controller::reconciler::ReconcilerError;
use forge_controller::crd::{Key, Phase, SecretTemplate};
use forge_controller::runtime::error_policy::error_action;
use forge_controller::store::WriteKind;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube_runtime::controller::Action;

async fn synced_key_harness(config: forge_controller::config::ControllerConfig) -> Harness {
    let harness = Harness::with_config(config);
    harness.seed_synced_repository("widgets");
    harness.seed_key(&key_object("deploy", "widgets"));
    harness.drive_key_to_synced("deploy").await;
    harness
}

#[tokio::test]
async fn test_first_pass_materializes_secret_before_anything_remote() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    harness.seed_key(&key_object("deploy", "widgets"));

    let action = harness.reconcile_key("deploy").await.unwrap();
    assert_eq!(action, requeue());

    let status = harness.key_status("deploy").await;
    assert_eq!(status.phase, Some(Phase::Creating));
    assert_eq!(status.remote_key_id, 0);
    assert!(!status.public_key.is_empty());

    let secret = harness.secret(NAMESPACE, "deploy").await.unwrap();
    let data = secret.data.clone().unwrap();
    assert_eq!(
        String::from_utf8(data[SECRET_PUBLIC_KEY].0.clone()).unwrap(),
        status.public_key
    );
    assert!(data.contains_key(SECRET_PRIVATE_KEY));

    let owners = secret.metadata.owner_references.unwrap();
    assert_eq!(owners[0].name, "deploy");
    assert_eq!(owners[0].controller, Some(true));

    let key = harness.key("deploy").await.unwrap();
    assert!(!has_finalizer(&key, KEY_FINALIZER));
    assert!(harness.forge.calls().is_empty());
}

#[tokio::test]
async fn test_status_public_key_is_recorded_before_secret_is_created() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    harness.seed_key(&key_object("deploy", "widgets"));

    harness.reconcile_key("deploy").await.unwrap();

    let writes = harness.store.writes();
    let status_write = writes
        .iter()
        .position(|w| w.kind == WriteKind::UpdateStatus && w.resource_kind == "Key")
        .unwrap();
    let secret_create = writes
        .iter()
        .position(|w| w.kind == WriteKind::Create && w.resource_kind == "Secret")
        .unwrap();
    assert!(status_write < secret_create);
}

#[tokio::test]
async fn test_new_key_passes_through_creating_before_synced() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    harness.seed_key(&key_object("deploy", "widgets"));

    let phases = harness.drive_key_to_synced("deploy").await;
    let creating = phases.iter().position(|p| *p == Some(Phase::Creating));
    let synced = phases.iter().position(|p| *p == Some(Phase::Synced));
    assert!(creating.unwrap() < synced.unwrap());

    let status = harness.key_status("deploy").await;
    assert_ne!(status.remote_key_id, 0);
    assert_eq!(status.remote_organization, ORG);
    assert_eq!(status.remote_repository, "widgets");
    assert_eq!(status.url, "https://github.com/acme/widgets/settings/keys");

    let remote = harness
        .forge
        .remote_key(ORG, "widgets", status.remote_key_id)
        .unwrap();
    assert_eq!(remote.title, "deploy");
    assert!(remote.read_only);
    assert_eq!(remote.key, status.public_key);
    assert_eq!(harness.forge.count("create_key"), 1);

    let key = harness.key("deploy").await.unwrap();
    assert!(has_finalizer(&key, KEY_FINALIZER));
}

#[tokio::test]
async fn test_synced_key_without_drift_writes_nothing() {
    let harness = synced_key_harness(test_config()).await;
    harness.store.clear_writes();
    harness.forge.clear_calls();

    let action = harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(action, resync());
    assert!(harness.store.writes().is_empty());
    assert_eq!(harness.forge.count("get_key"), 1);
    assert_eq!(harness.forge.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_repository_requeues_without_finalizer_or_remote_calls() {
    let harness = Harness::new();
    harness.seed_key(&key_object("deploy", "nowhere"));

    harness.reconcile_key("deploy").await.unwrap();
    let action = harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(action, requeue());
    let key = harness.key("deploy").await.unwrap();
    assert!(!has_finalizer(&key, KEY_FINALIZER));
    assert!(harness.forge.calls().is_empty());
}

#[tokio::test]
async fn test_unsynced_repository_puts_key_in_waiting() {
    let harness = Harness::new();
    harness.store.insert(&repository_object("widgets")).unwrap();
    harness.seed_key(&key_object("deploy", "widgets"));

    harness.reconcile_key("deploy").await.unwrap();
    let action = harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(action, requeue());
    assert_eq!(harness.key_status("deploy").await.phase, Some(Phase::Waiting));
    let key = harness.key("deploy").await.unwrap();
    assert!(!has_finalizer(&key, KEY_FINALIZER));
    assert_eq!(harness.forge.count("create_key"), 0);
    assert_eq!(harness.forge.count("get_key"), 0);
}

#[tokio::test]
async fn test_public_key_mismatch_is_terminal_and_never_recreates() {
    let harness = synced_key_harness(test_config()).await;
    harness
        .store
        .modify::<Secret, _>(NAMESPACE, "deploy", |secret| {
            secret.data.get_or_insert_with(Default::default).insert(
                SECRET_PUBLIC_KEY.to_string(),
                ByteString(b"ssh-rsa SOMETHINGELSE".to_vec()),
            );
        })
        .unwrap();
    harness.forge.clear_calls();
    let generated = harness.identities.generated();

    let error = harness.reconcile_key("deploy").await.unwrap_err();

    assert!(matches!(error, ReconcilerError::PublicKeyConflict { .. }));
    assert!(error.is_terminal());
    assert_eq!(
        error_action("Key", NAMESPACE, "deploy", &error, &test_config()),
        Action::await_change()
    );
    assert!(harness.forge.calls().is_empty());
    assert_eq!(harness.identities.generated(), generated);
}

#[tokio::test]
async fn test_remote_key_drift_deletes_then_recreates_next_pass() {
    let harness = synced_key_harness(test_config()).await;
    let original = harness.key_status("deploy").await;
    harness
        .forge
        .set_key_text(ORG, "widgets", original.remote_key_id, "ssh-rsa TAMPERED");
    harness.forge.clear_calls();

    let action = harness.reconcile_key("deploy").await.unwrap();
    assert_eq!(action, requeue());
    assert_eq!(harness.forge.count("delete_key"), 1);
    assert_eq!(harness.forge.count("create_key"), 0);
    assert_eq!(harness.key_status("deploy").await.phase, Some(Phase::Deleting));

    harness.reconcile_key("deploy").await.unwrap();
    assert_eq!(harness.forge.count("create_key"), 1);
    let recreated = harness.key_status("deploy").await;
    assert_eq!(recreated.phase, Some(Phase::Synced));
    assert_ne!(recreated.remote_key_id, original.remote_key_id);
    assert_eq!(recreated.public_key, original.public_key);
}

#[tokio::test]
async fn test_read_only_change_replaces_remote_key() {
    let harness = synced_key_harness(test_config()).await;
    harness
        .store
        .modify::<Key, _>(NAMESPACE, "deploy", |key| key.spec.read_only = false)
        .unwrap();
    harness.forge.clear_calls();

    harness.reconcile_key("deploy").await.unwrap();
    harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(harness.forge.count("delete_key"), 1);
    let status = harness.key_status("deploy").await;
    let remote = harness
        .forge
        .remote_key(ORG, "widgets", status.remote_key_id)
        .unwrap();
    assert!(!remote.read_only);
}

#[tokio::test]
async fn test_repository_ref_change_moves_key_to_new_repository() {
    let harness = synced_key_harness(test_config()).await;
    harness.seed_synced_repository("gadgets");
    let original = harness.key_status("deploy").await;
    harness
        .store
        .modify::<Key, _>(NAMESPACE, "deploy", |key| {
            key.spec.repository_ref = "gadgets".to_string();
        })
        .unwrap();

    harness.reconcile_key("deploy").await.unwrap();
    assert!(harness
        .forge
        .remote_key(ORG, "widgets", original.remote_key_id)
        .is_none());

    harness.reconcile_key("deploy").await.unwrap();
    let moved = harness.key_status("deploy").await;
    assert_eq!(moved.remote_repository, "gadgets");
    assert!(harness
        .forge
        .remote_key(ORG, "gadgets", moved.remote_key_id)
        .is_some());
}

#[tokio::test]
async fn test_lost_secret_deletes_orphaned_key_and_rotates() {
    let harness = synced_key_harness(test_config()).await;
    let original = harness.key_status("deploy").await;
    assert!(harness.store.remove::<Secret>(NAMESPACE, "deploy"));
    harness.forge.clear_calls();

    let action = harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(action, requeue());
    assert_eq!(
        harness.forge.calls(),
        vec![ForgeCall::DeleteKey {
            org: ORG.to_string(),
            repo: "widgets".to_string(),
            id: original.remote_key_id,
        }]
    );
    let rotated = harness.key_status("deploy").await;
    assert_eq!(rotated.phase, Some(Phase::Creating));
    assert_eq!(rotated.remote_key_id, 0);
    assert_ne!(rotated.public_key, original.public_key);
    assert!(harness.secret(NAMESPACE, "deploy").await.is_some());

    harness.drive_key_to_synced("deploy").await;
    let resynced = harness.key_status("deploy").await;
    assert_eq!(resynced.phase, Some(Phase::Synced));
    assert_eq!(harness.forge.key_count(), 1);
}

#[tokio::test]
async fn test_failed_orphan_delete_aborts_before_rotating() {
    let harness = synced_key_harness(test_config()).await;
    let original = harness.key_status("deploy").await;
    let generated = harness.identities.generated();
    assert!(harness.store.remove::<Secret>(NAMESPACE, "deploy"));
    harness.store.clear_writes();
    harness.forge.fail_next("delete_key", 502);

    let error = harness.reconcile_key("deploy").await.unwrap_err();

    assert!(matches!(error, ReconcilerError::Forge(_)));
    assert!(!error.is_terminal());
    assert_eq!(harness.identities.generated(), generated);
    let status = harness.key_status("deploy").await;
    assert_eq!(status.remote_key_id, original.remote_key_id);
    assert_eq!(status.public_key, original.public_key);
    assert!(harness.secret(NAMESPACE, "deploy").await.is_none());
    assert!(harness
        .store
        .writes()
        .iter()
        .all(|w| w.kind != WriteKind::Create));
    assert!(harness
        .forge
        .remote_key(ORG, "widgets", original.remote_key_id)
        .is_some());
}

#[tokio::test]
async fn test_secret_not_visible_surfaces_retryable_error() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    harness.seed_key(&key_object("deploy", "widgets"));
    harness.store.set_create_read_lag(10);

    let error = harness.reconcile_key("deploy").await.unwrap_err();

    assert!(matches!(
        error,
        ReconcilerError::SecretNotVisible { attempts: 3, .. }
    ));
    assert!(!error.is_terminal());
    assert_eq!(
        error_action("Key", NAMESPACE, "deploy", &error, &test_config()),
        requeue()
    );
}

#[tokio::test]
async fn test_secret_in_other_namespace_has_no_owner_reference() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    let mut key = key_object("deploy", "widgets");
    key.spec.secret_template = SecretTemplate {
        target_namespace: Some("ci".to_string()),
        name_override: Some("git-ssh".to_string()),
        ..SecretTemplate::default()
    };
    harness.seed_key(&key);

    harness.reconcile_key("deploy").await.unwrap();

    let secret = harness.secret("ci", "git-ssh").await.unwrap();
    assert!(secret.metadata.owner_references.is_none());
    assert!(harness.secret(NAMESPACE, "deploy").await.is_none());
}

#[tokio::test]
async fn test_deletion_removes_secret_in_other_namespace() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    let mut key = key_object("deploy", "widgets");
    key.spec.secret_template = SecretTemplate {
        target_namespace: Some("ci".to_string()),
        name_override: Some("git-ssh".to_string()),
        ..SecretTemplate::default()
    };
    harness.seed_key(&key);
    harness.drive_key_to_synced("deploy").await;
    assert!(harness.secret("ci", "git-ssh").await.is_some());
    harness
        .store
        .request_deletion::<Key>(NAMESPACE, "deploy")
        .unwrap();

    let action = harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(action, Action::await_change());
    assert!(harness.secret("ci", "git-ssh").await.is_none());
    assert!(harness.key("deploy").await.is_none());
}

#[tokio::test]
async fn test_deletion_leaves_same_namespace_secret_to_its_owner() {
    let harness = synced_key_harness(test_config()).await;
    harness
        .store
        .request_deletion::<Key>(NAMESPACE, "deploy")
        .unwrap();
    harness.store.clear_writes();

    harness.reconcile_key("deploy").await.unwrap();

    assert!(harness.key("deploy").await.is_none());
    assert!(harness.secret(NAMESPACE, "deploy").await.is_some());
    assert!(harness
        .store
        .writes()
        .iter()
        .all(|w| w.kind != WriteKind::Delete));
}

#[tokio::test]
async fn test_transient_forge_error_requeues_and_recovers() {
    let harness = Harness::new();
    harness.seed_synced_repository("widgets");
    harness.seed_key(&key_object("deploy", "widgets"));
    harness.reconcile_key("deploy").await.unwrap();
    harness.reconcile_key("deploy").await.unwrap();
    harness.forge.fail_next("create_key", 502);

    let error = harness.reconcile_key("deploy").await.unwrap_err();
    assert!(matches!(error, ReconcilerError::Forge(_)));
    assert_eq!(
        error_action("Key", NAMESPACE, "deploy", &error, &test_config()),
        requeue()
    );

    harness.reconcile_key("deploy").await.unwrap();
    assert_eq!(harness.key_status("deploy").await.phase, Some(Phase::Synced));
}

#[tokio::test]
async fn test_deletion_leaves_remote_key_when_not_destructive() {
    let harness = synced_key_harness(test_config()).await;
    let status = harness.key_status("deploy").await;
    harness
        .store
        .request_deletion::<Key>(NAMESPACE, "deploy")
        .unwrap();
    harness.forge.clear_calls();

    let action = harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(harness.forge.count("get_key"), 1);
    assert_eq!(harness.forge.count("delete_key"), 0);
    assert!(harness
        .forge
        .remote_key(ORG, "widgets", status.remote_key_id)
        .is_some());
    assert!(harness.key("deploy").await.is_none());
}

#[tokio::test]
async fn test_destructive_deletion_removes_remote_key_before_finalizer() {
    let config = forge_controller::config::ControllerConfig {
        destructive_delete: true,
        ..test_config()
    };
    let harness = synced_key_harness(config).await;
    let status = harness.key_status("deploy").await;
    harness
        .store
        .request_deletion::<Key>(NAMESPACE, "deploy")
        .unwrap();

    harness.reconcile_key("deploy").await.unwrap();

    assert!(harness
        .forge
        .remote_key(ORG, "widgets", status.remote_key_id)
        .is_none());
    assert!(harness.key("deploy").await.is_none());
}

#[tokio::test]
async fn test_deletion_tolerates_already_absent_remote_key() {
    let config = forge_controller::config::ControllerConfig {
        destructive_delete: true,
        ..test_config()
    };
    let harness = synced_key_harness(config).await;
    let status = harness.key_status("deploy").await;
    harness.forge.remove_key(ORG, "widgets", status.remote_key_id);
    harness
        .store
        .request_deletion::<Key>(NAMESPACE, "deploy")
        .unwrap();
    harness.forge.clear_calls();

    harness.reconcile_key("deploy").await.unwrap();

    assert_eq!(harness.forge.count("delete_key"), 0);
    assert!(harness.key("deploy").await.is_none());
}

#[tokio::test]
async fn test_deleted_key_is_ignored() {
    let harness = Harness::new();
    let action = harness.reconcile_key("ghost").await.unwrap();
    assert_eq!(action, Action::await_change());
    assert!(harness.store.writes().is_empty());
}
