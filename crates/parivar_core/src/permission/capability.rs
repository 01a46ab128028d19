//! Device capability declarations for the permission bootstrap.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Device capability requested during first-run bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DeviceCapability {
    Camera,
    Microphone,
    Location,
    Internet,
}

/// Capabilities in the order the platform is prompted for them. Internet is
/// last and never prompted; it is treated as always granted.
pub const BOOTSTRAP_ORDER: &[DeviceCapability] = &[
    DeviceCapability::Camera,
    DeviceCapability::Microphone,
    DeviceCapability::Location,
    DeviceCapability::Internet,
];

impl DeviceCapability {
    /// Stable string id used in the persisted summary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Camera => "camera",
            Self::Microphone => "microphone",
            Self::Location => "location",
            Self::Internet => "internet",
        }
    }

    /// User-facing short description for the consolidated alert.
    pub fn description(self) -> &'static str {
        match self {
            Self::Camera => "Allow camera access for profile photos and family moments.",
            Self::Microphone => "Allow microphone access for voice notes and calls.",
            Self::Location => "Allow location access for nearby-family features.",
            Self::Internet => "Allow network access for syncing your Parivar.",
        }
    }
}

impl Display for DeviceCapability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses one capability from its stable string id.
pub fn parse_device_capability(value: &str) -> Result<DeviceCapability, DeviceCapabilityError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(DeviceCapabilityError::Empty);
    }

    match normalized {
        "camera" => Ok(DeviceCapability::Camera),
        "microphone" => Ok(DeviceCapability::Microphone),
        "location" => Ok(DeviceCapability::Location),
        "internet" => Ok(DeviceCapability::Internet),
        other => Err(DeviceCapabilityError::Unsupported(other.to_string())),
    }
}

/// Capability parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCapabilityError {
    Empty,
    Unsupported(String),
}

impl Display for DeviceCapabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "capability value must not be empty"),
            Self::Unsupported(value) => write!(f, "capability is unsupported: {value}"),
        }
    }
}

impl Error for DeviceCapabilityError {}

/// Result of one platform permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

impl PermissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Undetermined => "undetermined",
        }
    }

    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Persisted 4-valued permission summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PermissionSummary {
    pub camera: PermissionStatus,
    pub microphone: PermissionStatus,
    pub location: PermissionStatus,
    pub internet: PermissionStatus,
}

impl PermissionSummary {
    pub fn status_of(&self, capability: DeviceCapability) -> PermissionStatus {
        match capability {
            DeviceCapability::Camera => self.camera,
            DeviceCapability::Microphone => self.microphone,
            DeviceCapability::Location => self.location,
            DeviceCapability::Internet => self.internet,
        }
    }

    pub fn set_status(&mut self, capability: DeviceCapability, status: PermissionStatus) {
        match capability {
            DeviceCapability::Camera => self.camera = status,
            DeviceCapability::Microphone => self.microphone = status,
            DeviceCapability::Location => self.location = status,
            DeviceCapability::Internet => self.internet = status,
        }
    }

    /// Whether every capability, internet included, is granted.
    pub fn all_granted(&self) -> bool {
        BOOTSTRAP_ORDER
            .iter()
            .all(|capability| self.status_of(*capability).is_granted())
    }

    /// Capabilities that are denied or undetermined, in bootstrap order.
    pub fn pending(&self) -> Vec<DeviceCapability> {
        BOOTSTRAP_ORDER
            .iter()
            .copied()
            .filter(|capability| !self.status_of(*capability).is_granted())
            .collect()
    }
}
