//! Shared test harness: in-memory persistence, static registry, local
//! storage, and a real signing key pair.

use std::sync::{Arc, OnceLock};

use farol_api::{CreateReleaseRequest, DeploymentConfig, DeploymentStrategy, FirmwareRelease, ReleaseChannel};
use farol_common::{ReleaseSigner, generate_key_pair};
use farol_ota::{LocalStorageBackend, OtaService, StaticDeviceRegistry};
use farol_persistence::InMemoryOtaPersistence;

static TEST_KEYS: OnceLock<(String, String)> = OnceLock::new();

pub fn test_keys() -> &'static (String, String) {
    TEST_KEYS.get_or_init(|| generate_key_pair(2048).unwrap())
}

pub struct TestHarness {
    pub service: Arc<OtaService>,
    pub store: Arc<InMemoryOtaPersistence>,
    pub registry: Arc<StaticDeviceRegistry>,
    _storage_dir: tempfile::TempDir,
}

pub async fn harness() -> TestHarness {
    harness_with_seed(None).await
}

pub async fn harness_with_seed(seed: Option<u64>) -> TestHarness {
    let store = Arc::new(InMemoryOtaPersistence::new());
    let registry = Arc::new(StaticDeviceRegistry::new());
    let storage_dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(
        LocalStorageBackend::new(storage_dir.path(), "http://localhost:8080", b"test-secret")
            .await
            .unwrap(),
    );
    let (private_pem, public_pem) = test_keys();
    let signer = Arc::new(ReleaseSigner::new(private_pem, public_pem).unwrap());

    let service = match seed {
        Some(seed) => OtaService::with_canary_seed(
            store.clone(),
            registry.clone(),
            storage,
            signer,
            seed,
        ),
        None => OtaService::new(store.clone(), registry.clone(), storage, signer),
    };

    TestHarness {
        service: Arc::new(service),
        store,
        registry,
        _storage_dir: storage_dir,
    }
}

pub async fn create_release(
    harness: &TestHarness,
    version: &str,
    channel: ReleaseChannel,
) -> FirmwareRelease {
    harness
        .service
        .create_release(CreateReleaseRequest {
            template_id: "tmpl-1".to_string(),
            version: version.to_string(),
            channel,
            binary: format!("firmware image {}", version).into_bytes(),
            release_notes: String::new(),
            created_by: "tester".to_string(),
        })
        .await
        .unwrap()
}

pub fn immediate_config(targets: &[&str], failure_threshold: Option<i32>) -> DeploymentConfig {
    DeploymentConfig {
        strategy: DeploymentStrategy::Immediate,
        target_devices: targets.iter().map(|d| d.to_string()).collect(),
        rollout_percentage: None,
        failure_threshold,
    }
}
