// Integration tests for the deployment orchestrator: cohort selection
// per strategy, lifecycle transitions, and rollback.

mod common;

use farol_api::{DeploymentConfig, DeploymentStatus, DeploymentStrategy, ReleaseChannel, UpdateStatus};
use farol_common::FarolError;
use farol_persistence::OtaPersistence;

use common::{create_release, harness, harness_with_seed, immediate_config};

#[tokio::test]
async fn test_immediate_deployment_targets_all_and_activates() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;
    h.registry.enroll("tmpl-1", ReleaseChannel::Stable, "dev-1");
    h.registry.enroll("tmpl-1", ReleaseChannel::Stable, "dev-2");

    let deployment = h
        .service
        .deploy_release(&release.release_id, &immediate_config(&[], None))
        .await
        .unwrap();

    assert_eq!(deployment.status, DeploymentStatus::Active);
    assert_eq!(deployment.target_devices, vec!["dev-1", "dev-2"]);
    assert_eq!(deployment.failure_threshold, 10);

    let updates = h
        .store
        .list_device_updates(&deployment.deployment_id)
        .await
        .unwrap();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().all(|u| u.status == UpdateStatus::Pending));
}

#[tokio::test]
async fn test_staged_deployment_takes_stable_prefix() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    let config = DeploymentConfig {
        strategy: DeploymentStrategy::Staged,
        target_devices: ["dev-1", "dev-2", "dev-3", "dev-4", "dev-5"]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        rollout_percentage: Some(40),
        failure_threshold: Some(10),
    };
    let deployment = h
        .service
        .deploy_release(&release.release_id, &config)
        .await
        .unwrap();

    // Staged deployments wait for an explicit start
    assert_eq!(deployment.status, DeploymentStatus::Pending);
    assert_eq!(deployment.target_devices.len(), 5);

    let mut cohort: Vec<String> = h
        .store
        .list_device_updates(&deployment.deployment_id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.device_id)
        .collect();
    cohort.sort();
    assert_eq!(cohort, vec!["dev-1", "dev-2"]);
}

#[tokio::test]
async fn test_staged_requires_rollout_percentage() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    for percentage in [None, Some(0), Some(101)] {
        let config = DeploymentConfig {
            strategy: DeploymentStrategy::Staged,
            target_devices: vec!["dev-1".to_string()],
            rollout_percentage: percentage,
            failure_threshold: None,
        };
        let err = h
            .service
            .deploy_release(&release.release_id, &config)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FarolError>(),
            Some(FarolError::Configuration(_))
        ));
    }
}

#[tokio::test]
async fn test_canary_cohort_is_seed_reproducible() {
    let targets: Vec<String> = (1..=10).map(|i| format!("dev-{}", i)).collect();
    let config = DeploymentConfig {
        strategy: DeploymentStrategy::Canary,
        target_devices: targets.clone(),
        rollout_percentage: Some(30),
        failure_threshold: None,
    };

    let mut cohorts = Vec::new();
    for _ in 0..2 {
        let h = harness_with_seed(Some(42)).await;
        let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;
        let deployment = h
            .service
            .deploy_release(&release.release_id, &config)
            .await
            .unwrap();

        let mut cohort: Vec<String> = h
            .store
            .list_device_updates(&deployment.deployment_id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.device_id)
            .collect();
        cohort.sort();

        assert_eq!(cohort.len(), 3);
        assert!(cohort.iter().all(|d| targets.contains(d)));
        cohort.dedup();
        assert_eq!(cohort.len(), 3, "canary cohort must not contain duplicates");
        cohorts.push(cohort);
    }

    assert_eq!(cohorts[0], cohorts[1], "same seed must reproduce the cohort");
}

#[tokio::test]
async fn test_deploy_fails_with_no_target_devices() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    let err = h
        .service
        .deploy_release(&release.release_id, &immediate_config(&[], None))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FarolError>(),
        Some(FarolError::NoTargetDevices)
    ));
}

#[tokio::test]
async fn test_deploy_unknown_release_is_not_found() {
    let h = harness().await;
    let err = h
        .service
        .deploy_release("rel-missing", &immediate_config(&["dev-1"], None))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FarolError>(),
        Some(FarolError::NotFound("release", _))
    ));
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    let config = DeploymentConfig {
        strategy: DeploymentStrategy::Staged,
        target_devices: vec!["dev-1".to_string(), "dev-2".to_string()],
        rollout_percentage: Some(50),
        failure_threshold: None,
    };
    let deployment = h
        .service
        .deploy_release(&release.release_id, &config)
        .await
        .unwrap();
    let id = deployment.deployment_id.as_str();

    // Pending deployments can be started but not paused or resumed
    assert!(h.service.pause_deployment(id).await.is_err());
    assert!(h.service.resume_deployment(id).await.is_err());
    h.service.start_deployment(id).await.unwrap();
    assert_eq!(
        h.service.get_deployment(id).await.unwrap().status,
        DeploymentStatus::Active
    );

    // Starting twice is rejected
    let err = h.service.start_deployment(id).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FarolError>(),
        Some(FarolError::InvalidStateTransition { action: "start", .. })
    ));

    h.service.pause_deployment(id).await.unwrap();
    assert!(h.service.pause_deployment(id).await.is_err());
    h.service.resume_deployment(id).await.unwrap();
    assert_eq!(
        h.service.get_deployment(id).await.unwrap().status,
        DeploymentStatus::Active
    );
}

#[tokio::test]
async fn test_rollback_selects_latest_older_stable_release() {
    let h = harness().await;
    let oldest = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;
    let previous = create_release(&h, "1.1.0", ReleaseChannel::Stable).await;
    let failing = create_release(&h, "2.0.0", ReleaseChannel::Stable).await;

    let deployment = h
        .service
        .deploy_release(
            &failing.release_id,
            &immediate_config(&["dev-1", "dev-2", "dev-3"], Some(20)),
        )
        .await
        .unwrap();

    let rollback = h
        .service
        .rollback_deployment(&deployment.deployment_id)
        .await
        .unwrap();

    // The failing deployment is marked failed first
    let original = h
        .service
        .get_deployment(&deployment.deployment_id)
        .await
        .unwrap();
    assert_eq!(original.status, DeploymentStatus::Failed);

    // Rollback goes to the latest release strictly older than the
    // failing one, immediately, to the original full target list
    assert_eq!(rollback.release_id, previous.release_id);
    assert_ne!(rollback.release_id, oldest.release_id);
    assert_eq!(rollback.strategy, DeploymentStrategy::Immediate);
    assert_eq!(rollback.status, DeploymentStatus::Active);
    assert_eq!(rollback.target_devices, deployment.target_devices);
    assert_eq!(rollback.failure_threshold, 20);

    let updates = h
        .store
        .list_device_updates(&rollback.deployment_id)
        .await
        .unwrap();
    assert_eq!(updates.len(), 3);
}

#[tokio::test]
async fn test_rollback_on_oldest_release_has_no_previous() {
    let h = harness().await;
    let only = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    let deployment = h
        .service
        .deploy_release(&only.release_id, &immediate_config(&["dev-1"], None))
        .await
        .unwrap();

    let err = h
        .service
        .rollback_deployment(&deployment.deployment_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<FarolError>(),
        Some(FarolError::NoPreviousRelease)
    ));

    // The lookup failed before anything was mutated
    let unchanged = h
        .service
        .get_deployment(&deployment.deployment_id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, DeploymentStatus::Active);
}

#[tokio::test]
async fn test_update_for_device_serves_pending_manifest() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    h.service
        .deploy_release(&release.release_id, &immediate_config(&["dev-1"], None))
        .await
        .unwrap();

    let manifest = h
        .service
        .update_for_device("dev-1")
        .await
        .unwrap()
        .expect("pending update expected");
    assert_eq!(manifest.release_id, release.release_id);
    assert_eq!(manifest.binary_hash, release.binary_hash);
    assert_eq!(manifest.binary_size, release.binary_size);
    assert!(manifest.binary_url.contains("/api/v1/ota/binaries/"));
    assert!(manifest.binary_url.contains("token="));

    // Unknown devices have nothing pending
    assert!(h.service.update_for_device("dev-9").await.unwrap().is_none());
}

#[tokio::test]
async fn test_deployment_status_aggregation() {
    let h = harness().await;
    let release = create_release(&h, "1.0.0", ReleaseChannel::Stable).await;

    let deployment = h
        .service
        .deploy_release(
            &release.release_id,
            &immediate_config(&["dev-1", "dev-2", "dev-3", "dev-4"], Some(100)),
        )
        .await
        .unwrap();

    for (device, status) in [
        ("dev-1", UpdateStatus::Completed),
        ("dev-2", UpdateStatus::Completed),
        ("dev-3", UpdateStatus::Downloading),
    ] {
        h.service
            .report_update_status(&farol_api::UpdateStatusReport {
                device_id: device.to_string(),
                release_id: release.release_id.clone(),
                status,
                progress: 100,
                error_message: None,
            })
            .await
            .unwrap();
    }

    let report = h
        .service
        .get_deployment_status(&deployment.deployment_id)
        .await
        .unwrap();
    assert_eq!(report.total_devices, 4);
    assert_eq!(report.completed_count, 2);
    assert_eq!(report.downloading_count, 1);
    assert_eq!(report.pending_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.progress_percentage, 50);
}
