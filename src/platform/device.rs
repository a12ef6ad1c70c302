use crate::config::{data_dir, get_platform};
use std::error::Error;
use std::path::Path;

const DEVICE_ID_FILE: &str = ".device_id";

/// Get a stable device ID for installation registration
pub fn get_device_id() -> Result<String, Box<dyn Error + Send + Sync>> {
    #[cfg(any(target_os = "windows", target_os = "macos"))]
    {
        match hardware_device_id() {
            Ok(id) => return Ok(id),
            Err(e) => tracing::warn!(error = %e, "Hardware id unavailable, using stored id"),
        }
    }

    get_or_create_device_id(&data_dir().join(DEVICE_ID_FILE))
}

/// Machine GUID / IOPlatformUUID, hashed
#[cfg(any(target_os = "windows", target_os = "macos"))]
fn hardware_device_id() -> Result<String, Box<dyn Error + Send + Sync>> {
    use machineid_rs::{Encryption, HWIDComponent, IdBuilder};

    let id = IdBuilder::new(Encryption::SHA256)
        .add_component(HWIDComponent::SystemID)
        .build("parentshield")?;

    Ok(id)
}

/// Read the stored device id, generating and persisting one on first use
pub fn get_or_create_device_id(path: &Path) -> Result<String, Box<dyn Error + Send + Sync>> {
    if let Ok(id) = std::fs::read_to_string(path) {
        let id = id.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }

    let device_id = format!("device_{}", uuid::Uuid::new_v4().simple());

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, &device_id)?;
    Ok(device_id)
}

/// Display name sent with the installation, e.g. "LINUX Device"
pub fn device_name() -> String {
    format!("{} Device", get_platform().to_uppercase())
}
