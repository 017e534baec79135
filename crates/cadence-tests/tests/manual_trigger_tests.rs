//! End-to-end tests for the manual trigger path: mutual exclusion, material
//! update waiting, and failure reporting.

use cadence_core::buildcause::BuildTrigger;
use cadence_core::health::HealthScope;
use cadence_core::options::ScheduleOptions;
use cadence_core::PipelineName;
use cadence_scheduler::MaterialUpdateMessage;
use cadence_core::material::Material;
use cadence_tests::{
    eventually, init_test_logging, MaterialFixture, ModificationFixture, PipelineFixture,
    SchedulerContext,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_manual_trigger_updates_materials_then_schedules_forced_cause() {
    init_test_logging();
    let ctx = SchedulerContext::new().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m1", vec![material.clone()]))
        .await;
    ctx.repository
        .push_modification(&material, ModificationFixture::revision("r5"))
        .await;

    let result = ctx
        .manual_trigger("alice", "m1", ScheduleOptions::new())
        .await;

    assert!(result.is_accepted());
    assert!(result.message().contains("Request to schedule pipeline m1 accepted"));
    assert_eq!(ctx.update_service.updated_materials().await.len(), 1);

    assert!(ctx.wait_for_trigger_cleared("m1").await);
    assert!(
        eventually(Duration::from_secs(2), || async {
            !ctx.scheduled_cause("m1").await.has_never_run()
        })
        .await
    );

    let cause = ctx.scheduled_cause("m1").await;
    assert_eq!(cause.trigger(), BuildTrigger::Forced);
    assert_eq!(cause.approver(), "alice");
    assert!(!ctx.notifier.has_listener_for(&"m1".into()).await);
}

#[tokio::test]
async fn test_manual_trigger_without_material_update_schedules_synchronously() {
    let ctx = SchedulerContext::new().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m2", vec![material.clone()]))
        .await;
    ctx.repository
        .push_modification(&material, ModificationFixture::revision("r5"))
        .await;

    let mut options = ScheduleOptions::new();
    options.set_update_materials_before_scheduling(false);
    let result = ctx.manual_trigger("alice", "m2", options).await;

    assert!(result.is_accepted());
    assert!(ctx.update_service.updated_materials().await.is_empty());
    assert_eq!(ctx.scheduled_cause("m2").await.trigger(), BuildTrigger::Forced);
    assert!(!ctx.monitor.is_already_triggered(&"m2".into()).await);
}

#[tokio::test]
async fn test_overlapping_manual_trigger_gets_a_conflict() {
    let ctx = SchedulerContext::builder().inert_material_updates().build().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m3", vec![material.clone()]))
        .await;

    let first = ctx.manual_trigger("alice", "m3", ScheduleOptions::new()).await;
    let second = ctx.manual_trigger("bob", "m3", ScheduleOptions::new()).await;

    assert!(first.is_accepted());
    assert!(second.is_conflict());
    assert!(second.message().contains("Failed to trigger pipeline: m3"));
    // Only the first trigger requested updates.
    assert_eq!(ctx.update_service.updated_materials().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_manual_triggers_accept_exactly_one() {
    let ctx = SchedulerContext::builder().inert_material_updates().build().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m4", vec![material.clone()]))
        .await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let producer = ctx.producer.clone();
        handles.push(tokio::spawn(async move {
            let mut result = cadence_core::result::OperationResult::new();
            producer
                .manual_schedule_pipeline(
                    &format!("user-{i}"),
                    &PipelineName::new("m4"),
                    ScheduleOptions::new(),
                    &mut result,
                )
                .await;
            result
        }));
    }

    let mut accepted = 0;
    let mut conflicts = 0;
    for handle in handles {
        let result = handle.await.unwrap();
        if result.is_accepted() {
            accepted += 1;
        } else if result.is_conflict() {
            conflicts += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn test_failed_material_update_reports_and_clears_the_flag() {
    let broken = MaterialFixture::git("https://example.com/broken.git");
    let ctx = SchedulerContext::builder()
        .failing_material(broken.clone(), "cannot connect to repository")
        .build()
        .await;
    ctx.add_pipeline(PipelineFixture::with_materials("m5", vec![broken.clone()]))
        .await;

    let result = ctx.manual_trigger("alice", "m5", ScheduleOptions::new()).await;
    assert!(result.is_accepted());

    assert!(ctx.wait_for_trigger_cleared("m5").await);
    assert!(ctx.scheduled_cause("m5").await.has_never_run());

    let errors = ctx
        .health
        .errors_for(&HealthScope::for_pipeline("m5"))
        .await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.contains("Could not trigger pipeline 'm5'"));
    assert!(errors[0].description.contains("broken.git"));
    assert!(errors[0].description.contains("cannot connect to repository"));
}

#[tokio::test]
async fn test_pinned_revision_for_unconfigured_material_fails_via_health() {
    let ctx = SchedulerContext::new().await;
    let configured = MaterialFixture::git("https://example.com/app.git");
    let removed = MaterialFixture::git("https://example.com/removed.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m6", vec![configured.clone()]))
        .await;
    ctx.repository
        .push_modification(&configured, ModificationFixture::revision("r5"))
        .await;

    let mut options =
        ScheduleOptions::new().with_specified_revision(removed.fingerprint(), "r3");
    options.set_update_materials_before_scheduling(false);
    ctx.manual_trigger("alice", "m6", options).await;

    assert!(ctx.scheduled_cause("m6").await.has_never_run());
    let errors = ctx
        .health
        .errors_for(&HealthScope::for_pipeline("m6"))
        .await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .message
        .contains("no compatible revisions were identified"));
    assert!(!ctx.monitor.is_already_triggered(&"m6".into()).await);
}

#[tokio::test]
async fn test_pinned_revision_is_used_for_the_cause() {
    let ctx = SchedulerContext::new().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m7", vec![material.clone()]))
        .await;
    ctx.repository
        .push_modification(&material, ModificationFixture::revision("r3"))
        .await;
    ctx.repository
        .push_modification(&material, ModificationFixture::revision("r5"))
        .await;

    let mut options =
        ScheduleOptions::new().with_specified_revision(material.fingerprint(), "r3");
    options.set_update_materials_before_scheduling(false);
    ctx.manual_trigger("alice", "m7", options).await;

    let cause = ctx.scheduled_cause("m7").await;
    let entry = cause
        .material_revisions()
        .find(&material.fingerprint())
        .unwrap();
    assert_eq!(entry.latest_revision(), Some("r3"));
}

#[tokio::test]
async fn test_pipeline_removed_during_update_is_reported() {
    let ctx = SchedulerContext::builder().inert_material_updates().build().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m8", vec![material.clone()]))
        .await;

    let result = ctx.manual_trigger("alice", "m8", ScheduleOptions::new()).await;
    assert!(result.is_accepted());

    // Configuration vanishes while the update is in flight.
    ctx.config_service.remove(&"m8".into()).await;
    ctx.notifier
        .on_material_update(MaterialUpdateMessage::Completed {
            material: Material::new(material.clone()),
        })
        .await;

    assert!(ctx.wait_for_trigger_cleared("m8").await);
    assert!(ctx.scheduled_cause("m8").await.has_never_run());
    let errors = ctx
        .health
        .errors_for(&HealthScope::for_pipeline("m8"))
        .await;
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .description
        .contains("configuration has been removed"));
}

#[tokio::test]
async fn test_manual_trigger_of_unknown_pipeline_fails_synchronously() {
    let ctx = SchedulerContext::new().await;
    let result = ctx
        .manual_trigger("alice", "no-such-pipeline", ScheduleOptions::new())
        .await;
    assert!(!result.can_continue());
    assert!(result.message().contains("Failed to trigger pipeline"));
}

#[tokio::test]
async fn test_variable_overrides_are_attached_to_the_cause() {
    let ctx = SchedulerContext::new().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    ctx.add_pipeline(PipelineFixture::with_materials("m9", vec![material.clone()]))
        .await;
    ctx.repository
        .push_modification(&material, ModificationFixture::revision("r1"))
        .await;

    let mut options = ScheduleOptions::new().with_variable("DEPLOY_ENV", "staging");
    options.set_update_materials_before_scheduling(false);
    ctx.manual_trigger("alice", "m9", options).await;

    let cause = ctx.scheduled_cause("m9").await;
    assert_eq!(cause.variables()["DEPLOY_ENV"], "staging");
}

#[tokio::test]
async fn test_materials_sharing_a_fingerprint_update_once() {
    let ctx = SchedulerContext::new().await;
    let material = MaterialFixture::git("https://example.com/app.git");
    // Two configured materials with identical defining attributes share a
    // fingerprint and must be updated once.
    ctx.add_pipeline(PipelineFixture::with_materials(
        "m10",
        vec![material.clone(), material.clone()],
    ))
    .await;
    ctx.repository
        .push_modification(&material, ModificationFixture::revision("r1"))
        .await;

    let result = ctx.manual_trigger("alice", "m10", ScheduleOptions::new()).await;
    assert!(result.is_accepted());
    assert!(ctx.wait_for_trigger_cleared("m10").await);
    assert_eq!(ctx.update_service.updated_materials().await.len(), 1);
}

#[tokio::test]
async fn test_retrigger_after_failure_is_allowed() {
    let broken = MaterialFixture::git("https://example.com/broken.git");
    let ctx = SchedulerContext::builder()
        .failing_material(broken.clone(), "transient network failure")
        .build()
        .await;
    ctx.add_pipeline(PipelineFixture::with_materials("m11", vec![broken.clone()]))
        .await;

    let first = ctx.manual_trigger("alice", "m11", ScheduleOptions::new()).await;
    assert!(first.is_accepted());
    assert!(ctx.wait_for_trigger_cleared("m11").await);

    // The flag was cleared on failure, so a new trigger is accepted.
    let second = ctx.manual_trigger("alice", "m11", ScheduleOptions::new()).await;
    assert!(second.is_accepted());
}
