use super::*;

#[tokio::test]
async fn creates_fence_for_namespace_policy() {
    let h = Harness::new();
    h.store.with_namespace("ns1", FenceLabel::Enabled);
    h.reconciler
        .reconcile_namespace("ns1")
        .await
        .expect("namespace must reconcile");
    assert!(h.reconciler.policy("ns1").await.enabled);

    // The cached policy is used without consulting the namespace again.
    h.store.fail(Failure::GetNamespace("ns1".to_string()));
    let svc1 = h.store.with_service("ns1", "svc1", FenceLabel::Unset);
    h.reconciler
        .reconcile_service(&svc1)
        .await
        .expect("service must reconcile");
    assert_eq!(h.store.take_mutations(), vec![Mutation::Create(svc1.clone())]);

    let fence = h.store.fence(&svc1).expect("fence must exist");
    assert!(fence.enabled);
    assert_eq!(fence.ownership, Ownership::Controller);
    assert_eq!(fence.revision, None);
}

#[tokio::test]
async fn explicit_label_overrides_namespace() {
    let h = Harness::new();
    h.store.with_namespace("ns", FenceLabel::Disabled);
    let fenced = h.store.with_service("ns", "fenced", FenceLabel::Enabled);
    let unfenced = h.store.with_service("ns", "unfenced", FenceLabel::Unset);

    for id in [&fenced, &unfenced] {
        h.reconciler
            .reconcile_service(id)
            .await
            .expect("service must reconcile");
    }
    assert_eq!(h.store.take_mutations(), vec![Mutation::Create(fenced)]);
    assert!(h.store.fence(&unfenced).is_none());
}

#[tokio::test]
async fn reconcile_is_idempotent() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);

    h.reconciler.reconcile_service(&id).await.expect("first run");
    assert_eq!(h.store.take_mutations(), vec![Mutation::Create(id.clone())]);

    h.reconciler.reconcile_service(&id).await.expect("second run");
    assert_eq!(h.store.take_mutations(), vec![]);
}

#[tokio::test]
async fn disabling_deletes_controller_owned_fence() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);
    h.reconciler.reconcile_service(&id).await.expect("enable");
    h.store.take_mutations();

    h.store.with_service("ns", "svc", FenceLabel::Disabled);
    h.reconciler.reconcile_service(&id).await.expect("disable");
    assert_eq!(h.store.take_mutations(), vec![Mutation::Delete(id.clone())]);
    assert!(h.store.fence(&id).is_none());
}

#[tokio::test]
async fn external_fence_is_never_deleted() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);
    h.reconciler.reconcile_service(&id).await.expect("enable");
    h.store.take_mutations();

    // The record is relabeled so that it is no longer marked as created by
    // the controller.
    let mut fence = h.store.fence(&id).expect("fence must exist");
    fence.ownership = Ownership::External;
    h.store.with_fence(fence.clone());

    h.store.with_service("ns", "svc", FenceLabel::Disabled);
    h.reconciler.reconcile_service(&id).await.expect("disable");
    assert_eq!(h.store.take_mutations(), vec![]);
    assert_eq!(h.store.fence(&id), Some(fence));
}

#[tokio::test]
async fn deleted_service_cleans_up_fence() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);
    h.reconciler.reconcile_service(&id).await.expect("enable");
    h.store.take_mutations();

    h.store.remove_service(&id);
    h.reconciler.reconcile_service(&id).await.expect("cleanup");
    assert_eq!(h.store.take_mutations(), vec![Mutation::Delete(id)]);
}

#[tokio::test]
async fn deleted_service_without_fence_is_noop() {
    let h = Harness::new();
    let id = ResourceId::new("ns", "gone");
    h.reconciler.reconcile_service(&id).await.expect("noop");
    assert_eq!(h.store.take_mutations(), vec![]);
}

#[tokio::test]
async fn foreign_revision_is_ignored() {
    let h = Harness::with_scope(RevisionScope::new("stable", true));
    let id = h.store.with_service("ns", "svc", FenceLabel::Disabled);
    h.store.with_fence(mk_fence(&id, Ownership::Controller, Some("canary")));

    h.reconciler.reconcile_service(&id).await.expect("skip");
    assert_eq!(h.store.take_mutations(), vec![]);
    assert!(h.store.fence(&id).is_some());

    // An unrevisioned record is out of scope for a strict instance.
    h.store.with_fence(mk_fence(&id, Ownership::Controller, None));
    h.reconciler.reconcile_service(&id).await.expect("skip");
    assert_eq!(h.store.take_mutations(), vec![]);
}

#[tokio::test]
async fn created_fence_carries_revision() {
    let h = Harness::with_scope(RevisionScope::new("canary", false));
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);

    h.reconciler.reconcile_service(&id).await.expect("enable");
    let fence = h.store.fence(&id).expect("fence must exist");
    assert_eq!(fence.revision.as_deref(), Some("canary"));

    // The record is in scope, so disabling deletes it.
    h.store.with_service("ns", "svc", FenceLabel::Disabled);
    h.reconciler.reconcile_service(&id).await.expect("disable");
    assert!(h.store.fence(&id).is_none());
}

#[tokio::test]
async fn enabled_fence_refreshes_sidecar() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);

    // Creating the record does not refresh the sidecar; the next
    // reconciliation of the existing record does.
    h.reconciler.reconcile_service(&id).await.expect("create");
    assert_eq!(h.sidecars.take(), vec![]);
    h.reconciler.reconcile_service(&id).await.expect("refresh");
    assert_eq!(h.sidecars.take(), vec![id.clone()]);

    // Neither disabled nor externally created records are refreshed.
    let mut fence = h.store.fence(&id).expect("fence must exist");
    fence.enabled = false;
    h.store.with_fence(fence.clone());
    h.reconciler.reconcile_service(&id).await.expect("disabled");

    fence.enabled = true;
    fence.ownership = Ownership::External;
    h.store.with_fence(fence);
    h.reconciler.reconcile_service(&id).await.expect("external");
    assert_eq!(h.sidecars.take(), vec![]);
}

#[tokio::test]
async fn create_failure_is_returned() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);
    h.store.fail(Failure::CreateFence(id.clone()));

    assert!(h.reconciler.reconcile_service(&id).await.is_err());
    assert!(h.store.fence(&id).is_none());

    h.store.heal(&Failure::CreateFence(id.clone()));
    h.reconciler.reconcile_service(&id).await.expect("retry");
    assert!(h.store.fence(&id).is_some());
}

/// Disabling is best-effort: a failed delete is logged and the
/// reconciliation still succeeds.
#[tokio::test]
async fn delete_failure_is_not_returned() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Disabled);
    h.store.with_fence(mk_fence(&id, Ownership::Controller, None));
    h.store.fail(Failure::DeleteFence(id.clone()));

    h.reconciler
        .reconcile_service(&id)
        .await
        .expect("delete failure must not fail the reconciliation");
    assert!(h.store.fence(&id).is_some());
}

#[tokio::test]
async fn store_read_failures_are_returned() {
    let h = Harness::new();
    let id = h.store.with_service("ns", "svc", FenceLabel::Enabled);

    h.store.fail(Failure::GetService(id.clone()));
    assert!(h.reconciler.reconcile_service(&id).await.is_err());
    h.store.heal(&Failure::GetService(id.clone()));

    h.store.fail(Failure::GetFence(id.clone()));
    assert!(h.reconciler.reconcile_service(&id).await.is_err());
    assert_eq!(h.store.take_mutations(), vec![]);
}
