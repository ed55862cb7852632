use serde::{Deserialize, Serialize};
use std::fmt;

/// Power state reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineStatus {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineStatus::On => write!(f, "ON"),
            MachineStatus::Off => write!(f, "OFF"),
            MachineStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A laundrify-connected laundry machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
    pub status: MachineStatus,
    pub mac: Option<String>,
    pub firmware_version: Option<String>,
    /// Fields we don't interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Machine {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_parsing() {
        let json = r#"{
            "_id": "42",
            "name": "Washer",
            "status": "ON",
            "mac": "AA:BB:CC:DD:EE:FF",
            "firmwareVersion": "2.1.0",
            "power": 1200
        }"#;

        let machine: Machine = serde_json::from_str(json).unwrap();
        assert_eq!(machine.id, "42");
        assert_eq!(machine.display_name(), "Washer");
        assert_eq!(machine.status, MachineStatus::On);
        assert_eq!(machine.mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(machine.firmware_version.as_deref(), Some("2.1.0"));
        assert_eq!(machine.extra["power"], 1200);
    }

    #[test]
    fn test_machine_minimal() {
        let machine: Machine = serde_json::from_str(r#"{"_id": "7", "status": "OFF"}"#).unwrap();
        assert_eq!(machine.status, MachineStatus::Off);
        assert_eq!(machine.display_name(), "Unnamed");
        assert!(machine.mac.is_none());
    }

    #[test]
    fn test_unknown_status() {
        let machine: Machine =
            serde_json::from_str(r#"{"_id": "7", "status": "MAINTENANCE"}"#).unwrap();
        assert_eq!(machine.status, MachineStatus::Unknown);
        assert_eq!(machine.status.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_machine_list_parsing() {
        let machines: Vec<Machine> = serde_json::from_str(
            r#"[{"_id": "1", "name": "Washer", "status": "ON"},
                {"_id": "2", "name": "Dryer", "status": "OFF"}]"#,
        )
        .unwrap();
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[1].display_name(), "Dryer");
    }
}
