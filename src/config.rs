use std::time::Duration;

use crate::{HueError, Result};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Time given to physical lights to catch up after a grouped write before the
/// bridge state is read again.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

pub const ENV_BRIDGE_ADDRESS: &str = "HUE_BRIDGE_ADDRESS";
pub const ENV_APPLICATION_KEY: &str = "HUE_APPLICATION_KEY";

// see https://developers.meethue.com/develop/application-design-guidance/using-https/
pub(crate) const HUE_ROOT_CA: &[u8] = b"-----BEGIN CERTIFICATE-----
MIICMjCCAdigAwIBAgIUO7FSLbaxikuXAljzVaurLXWmFw4wCgYIKoZIzj0EAwIw
OTELMAkGA1UEBhMCTkwxFDASBgNVBAoMC1BoaWxpcHMgSHVlMRQwEgYDVQQDDAty
b290LWJyaWRnZTAiGA8yMDE3MDEwMTAwMDAwMFoYDzIwMzgwMTE5MDMxNDA3WjA5
MQswCQYDVQQGEwJOTDEUMBIGA1UECgwLUGhpbGlwcyBIdWUxFDASBgNVBAMMC3Jv
b3QtYnJpZGdlMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEjNw2tx2AplOf9x86
aTdvEcL1FU65QDxziKvBpW9XXSIcibAeQiKxegpq8Exbr9v6LBnYbna2VcaK0G22
jOKkTqOBuTCBtjAPBgNVHRMBAf8EBTADAQH/MA4GA1UdDwEB/wQEAwIBhjAdBgNV
HQ4EFgQUZ2ONTFrDT6o8ItRnKfqWKnHFGmQwdAYDVR0jBG0wa4AUZ2ONTFrDT6o8
ItRnKfqWKnHFGmShPaQ7MDkxCzAJBgNVBAYTAk5MMRQwEgYDVQQKDAtQaGlsaXBz
IEh1ZTEUMBIGA1UEAwwLcm9vdC1icmlkZ2WCFDuxUi22sYpLlwJY81Wrqy11phcO
MAoGCCqGSM49BAMCA0gAMEUCIEBYYEOsa07TH7E5MJnGw557lVkORgit2Rm1h3B2
sFgDAiEA1Fj/C3AN5psFMjo0//mrQebo0eKd3aWRx+pQY08mk48=
-----END CERTIFICATE-----";

/// Which server certificates the client accepts.
///
/// The bridge lives on the local network and does not present a certificate
/// chained to a public CA, so the default trust store can never be used.
/// Every policy here applies only to the one client built from a
/// [`BridgeConfig`], which only ever connects to the configured bridge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Trust only the Hue root CA that signs current bridge certificates.
    /// Host names are not checked: the certificate names the bridge id, not
    /// the address it is reached at.
    #[default]
    BridgeRootCa,
    /// Trust only this PEM certificate (a bridge with its own self-signed
    /// certificate, exported once and pinned).
    PinnedCertificate(Vec<u8>),
    /// Accept whatever certificate the bridge presents. This is a deliberate
    /// trade-off for older bridges on a trusted local network: the channel is
    /// encrypted but the peer is not authenticated.
    AcceptSelfSigned,
}

/// Immutable settings for one bridge, handed to [`crate::Bridge::new`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Host name or IP address of the bridge, optionally with a port.
    pub address: String,
    /// Sent as `hue-application-key` on every request.
    pub application_key: String,
    pub trust: TrustPolicy,
    pub timeout: Duration,
    pub settle_delay: Duration,
    base_url: Option<String>,
}

impl BridgeConfig {
    /// ### Example
    /// ```
    /// let config = hue_home::BridgeConfig::new("192.168.1.110", "rVV05G0i52vQMMLn6BK3dpr0F3uDiqtDjPLPK2uj");
    /// assert_eq!(config.base_url(), "https://192.168.1.110/clip/v2");
    /// ```
    pub fn new(address: impl Into<String>, application_key: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            application_key: application_key.into(),
            trust: TrustPolicy::default(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            base_url: None,
        }
    }

    /// Reads `HUE_BRIDGE_ADDRESS` and `HUE_APPLICATION_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            required_env(ENV_BRIDGE_ADDRESS)?,
            required_env(ENV_APPLICATION_KEY)?,
        ))
    }

    pub fn with_trust(self, trust: TrustPolicy) -> Self {
        Self { trust, ..self }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_settle_delay(self, settle_delay: Duration) -> Self {
        Self {
            settle_delay,
            ..self
        }
    }

    /// Replaces the `https://{address}/clip/v2` root, e.g. to go through a
    /// local proxy or a test server.
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into().trim_end_matches('/').to_string()),
            ..self
        }
    }

    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => format!("https://{}/clip/v2", self.address),
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => Err(HueError::config_err(format!("{name} is empty"))),
        Err(_) => Err(HueError::config_err(format!("{name} is not set"))),
    }
}
