//! Device registration interface.
//!
//! Registering a device identity and fetching the bearer token happen
//! against separate vendor endpoints and are out of scope for this
//! client; callers plug in their own implementation. The trait exists so
//! the client can bootstrap credentials lazily when the store is empty.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Device parameters reported at registration time.
///
/// Defaults mirror a common handset profile; the service does not appear
/// to validate them strictly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceParams {
    /// OS name, e.g. `android`.
    pub os: String,
    /// OS version string.
    pub os_version: String,
    /// Device model.
    pub device_type: String,
    /// Device manufacturer.
    pub device_brand: String,
    /// Screen resolution as `WIDTHxHEIGHT`.
    pub resolution: String,
    /// Locale reported to the service.
    pub language: String,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self {
            os: "android".to_string(),
            os_version: "16".to_string(),
            device_type: "Pixel 7 Pro".to_string(),
            device_brand: "Google".to_string(),
            resolution: "1440x3120".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Outcome of a successful registration: the identity the streaming
/// protocol needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredDevice {
    /// Assigned device identifier.
    pub device_id: String,
    /// Bearer token for streaming requests.
    pub token: String,
}

/// Registers a device and obtains a bearer token.
///
/// This trait abstracts the registration flow, allowing for different
/// implementations (vendor endpoints, test fixtures, pre-provisioned
/// identities).
pub trait DeviceRegistrar: Send + Sync {
    /// Registers a device described by `params` and returns its identity.
    fn register(
        &self,
        params: &DeviceParams,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<RegisteredDevice>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AsrError;

    struct FixedRegistrar;

    impl DeviceRegistrar for FixedRegistrar {
        fn register(
            &self,
            _params: &DeviceParams,
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<RegisteredDevice>> + Send + '_>,
        > {
            Box::pin(async {
                Ok(RegisteredDevice {
                    device_id: "1234567890123456".to_string(),
                    token: "fixture-token".to_string(),
                })
            })
        }
    }

    #[tokio::test]
    async fn test_registrar_trait_is_object_safe() {
        let registrar: Box<dyn DeviceRegistrar> = Box::new(FixedRegistrar);
        let device = registrar.register(&DeviceParams::default()).await.unwrap();
        assert_eq!(device.device_id, "1234567890123456");
        let _ = AsrError::Registration(String::new());
    }

    #[test]
    fn test_default_params_are_plausible() {
        let params = DeviceParams::default();
        assert_eq!(params.os, "android");
        assert!(params.resolution.contains('x'));
    }
}
