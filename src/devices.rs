/// Device registry for the AquaGuard sensor rig.
///
/// Defines the controllers the service expects heartbeats from. The
/// liveness monitor watches every registered device from startup, so a
/// controller that never comes up is reported offline rather than missing.
/// The registry can be replaced from the `[[devices]]` tables of the config
/// file; `default_devices` is used when the file names none.

use crate::model::{CAMERA_DEVICE_ID, MAIN_DEVICE_ID};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Device metadata
// ---------------------------------------------------------------------------

/// Metadata for one controller on the rig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Identifier carried in heartbeat rows.
    pub device_id: String,
    /// Human-readable name for logs and the status bar.
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// The two controllers of the current rig revision.
pub fn default_devices() -> Vec<Device> {
    vec![
        Device {
            device_id: MAIN_DEVICE_ID.to_string(),
            name: "Main controller".to_string(),
            description: "ESP32 board reading temperature, TDS and light sensors.".to_string(),
        },
        Device {
            device_id: CAMERA_DEVICE_ID.to_string(),
            name: "Camera controller".to_string(),
            description: "ESP32-CAM running motion detection and day/night sensing.".to_string(),
        },
    ]
}

/// Looks up a device by id. Returns `None` if not registered.
pub fn find_device<'a>(devices: &'a [Device], device_id: &str) -> Option<&'a Device> {
    devices.iter().find(|d| d.device_id == device_id)
}

/// Display name for a device id, falling back to the raw id for devices
/// that report without being registered.
pub fn display_name<'a>(devices: &'a [Device], device_id: &'a str) -> &'a str {
    find_device(devices, device_id)
        .map(|d| d.name.as_str())
        .unwrap_or(device_id)
}

/// Checks that every device id is non-empty, free of whitespace, and unique.
pub fn validate_devices(devices: &[Device]) -> Result<(), String> {
    let mut seen = HashSet::new();
    for device in devices {
        if device.device_id.is_empty() {
            return Err(format!("device '{}' has an empty device_id", device.name));
        }
        if device.device_id.chars().any(char::is_whitespace) {
            return Err(format!(
                "device_id '{}' must not contain whitespace",
                device.device_id
            ));
        }
        if !seen.insert(device.device_id.as_str()) {
            return Err(format!("duplicate device_id '{}'", device.device_id));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_is_valid() {
        validate_devices(&default_devices()).expect("default registry should validate");
    }

    #[test]
    fn test_default_registry_contains_main_and_camera() {
        let devices = default_devices();
        assert!(find_device(&devices, MAIN_DEVICE_ID).is_some());
        assert!(find_device(&devices, CAMERA_DEVICE_ID).is_some());
    }

    #[test]
    fn test_find_device_returns_none_for_unknown_id() {
        assert!(find_device(&default_devices(), "pump").is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let devices = default_devices();
        assert_eq!(display_name(&devices, MAIN_DEVICE_ID), "Main controller");
        assert_eq!(display_name(&devices, "pump"), "pump");
    }

    #[test]
    fn test_duplicate_device_ids_are_rejected() {
        let mut devices = default_devices();
        devices.push(devices[0].clone());
        let err = validate_devices(&devices).expect_err("duplicate id should be rejected");
        assert!(err.contains("duplicate"), "error was {:?}", err);
    }

    #[test]
    fn test_empty_or_spaced_device_ids_are_rejected() {
        let empty = vec![Device {
            device_id: String::new(),
            name: "Nameless".to_string(),
            description: String::new(),
        }];
        assert!(validate_devices(&empty).is_err());

        let spaced = vec![Device {
            device_id: "main board".to_string(),
            name: "Main".to_string(),
            description: String::new(),
        }];
        assert!(validate_devices(&spaced).is_err());
    }
}
