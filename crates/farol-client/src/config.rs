//! Update client configuration

/// Configuration for the OTA update client
#[derive(Clone, Debug)]
pub struct UpdateClientConfig {
    /// Base URL of the OTA server (e.g. "https://ota.example.com")
    pub server_url: String,
    /// Device identifier used for polling and status reports
    pub device_id: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Read timeout in milliseconds, bounding the whole download so a
    /// stalled connection cannot hang the update task
    pub read_timeout_ms: u64,
    /// Verify the release signature before installing. Togglable for
    /// non-production testing only; the hash check always runs.
    pub verify_signature: bool,
    /// PKIX PEM public key matching the server's signing key
    pub public_key_pem: Option<String>,
}

impl Default for UpdateClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".to_string(),
            device_id: String::new(),
            connect_timeout_ms: 5000,
            read_timeout_ms: 60000,
            verify_signature: true,
            public_key_pem: None,
        }
    }
}

impl UpdateClientConfig {
    pub fn new(server_url: &str, device_id: &str) -> Self {
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            device_id: device_id.to_string(),
            ..Default::default()
        }
    }

    /// Set connect and read timeouts
    pub fn with_timeouts(mut self, connect_ms: u64, read_ms: u64) -> Self {
        self.connect_timeout_ms = connect_ms;
        self.read_timeout_ms = read_ms;
        self
    }

    /// Set the signing public key used for signature verification
    pub fn with_public_key(mut self, public_key_pem: &str) -> Self {
        self.public_key_pem = Some(public_key_pem.to_string());
        self
    }

    /// Enable or disable signature verification
    pub fn with_signature_verification(mut self, enable: bool) -> Self {
        self.verify_signature = enable;
        self
    }
}
