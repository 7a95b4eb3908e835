//! Device registry collaborator
//!
//! The orchestrator resolves implicit deployment targets by asking the
//! registry for the devices enrolled on a (template, channel) pair. The
//! platform's device service implements this trait; a static in-memory
//! registry covers standalone deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use farol_api::ReleaseChannel;

/// Lists devices by firmware template and OTA channel
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn list_devices(
        &self,
        template_id: &str,
        channel: ReleaseChannel,
    ) -> anyhow::Result<Vec<String>>;
}

/// In-memory registry with a fixed enrollment table
#[derive(Default)]
pub struct StaticDeviceRegistry {
    enrollments: DashMap<(String, ReleaseChannel), Vec<String>>,
}

impl StaticDeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a device on a (template, channel) pair
    pub fn enroll(&self, template_id: &str, channel: ReleaseChannel, device_id: &str) {
        self.enrollments
            .entry((template_id.to_string(), channel))
            .or_default()
            .push(device_id.to_string());
    }
}

#[async_trait]
impl DeviceRegistry for StaticDeviceRegistry {
    async fn list_devices(
        &self,
        template_id: &str,
        channel: ReleaseChannel,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self
            .enrollments
            .get(&(template_id.to_string(), channel))
            .map(|devices| devices.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enrollment_is_per_channel() {
        let registry = StaticDeviceRegistry::new();
        registry.enroll("tmpl-1", ReleaseChannel::Stable, "dev-1");
        registry.enroll("tmpl-1", ReleaseChannel::Stable, "dev-2");
        registry.enroll("tmpl-1", ReleaseChannel::Beta, "dev-3");

        let stable = registry
            .list_devices("tmpl-1", ReleaseChannel::Stable)
            .await
            .unwrap();
        assert_eq!(stable, vec!["dev-1", "dev-2"]);

        let alpha = registry
            .list_devices("tmpl-1", ReleaseChannel::Alpha)
            .await
            .unwrap();
        assert!(alpha.is_empty());
    }
}
