//! Map machine status onto a contact sensor.

use log::error;
use std::fmt;

use crate::api::LaundrifyApi;
use crate::models::MachineStatus;

/// Contact sensor state, numbered like the HomeKit characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContactSensorState {
    ContactDetected = 0,
    ContactNotDetected = 1,
}

impl ContactSensorState {
    pub fn from_status(status: MachineStatus) -> Option<Self> {
        match status {
            MachineStatus::On => Some(ContactSensorState::ContactDetected),
            MachineStatus::Off => Some(ContactSensorState::ContactNotDetected),
            MachineStatus::Unknown => None,
        }
    }
}

impl fmt::Display for ContactSensorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactSensorState::ContactDetected => write!(f, "contact detected"),
            ContactSensorState::ContactNotDetected => write!(f, "contact not detected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorReading {
    Contact(ContactSensorState),
    /// The backend answered with a status we don't map
    Unknown,
    NotResponding,
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorReading::Contact(state) => write!(f, "{}", state),
            SensorReading::Unknown => write!(f, "unknown"),
            SensorReading::NotResponding => write!(f, "not responding"),
        }
    }
}

impl From<MachineStatus> for SensorReading {
    fn from(status: MachineStatus) -> Self {
        ContactSensorState::from_status(status)
            .map(SensorReading::Contact)
            .unwrap_or(SensorReading::Unknown)
    }
}

/// Read the sensor for machine `id`. Errors are logged and reported as
/// `NotResponding`; callers poll again on their next tick.
pub async fn read_sensor(api: &LaundrifyApi, id: &str) -> SensorReading {
    match api.get_machine(id).await {
        Ok(machine) => machine.status.into(),
        Err(err) => {
            error!("Error while loading Machine {}: {}", id, err);
            SensorReading::NotResponding
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ContactSensorState::from_status(MachineStatus::On),
            Some(ContactSensorState::ContactDetected)
        );
        assert_eq!(
            ContactSensorState::from_status(MachineStatus::Off),
            Some(ContactSensorState::ContactNotDetected)
        );
        assert_eq!(ContactSensorState::from_status(MachineStatus::Unknown), None);
    }

    #[test]
    fn test_characteristic_values() {
        assert_eq!(ContactSensorState::ContactDetected as u8, 0);
        assert_eq!(ContactSensorState::ContactNotDetected as u8, 1);
    }

    #[test]
    fn test_reading_from_status() {
        assert_eq!(
            SensorReading::from(MachineStatus::Off),
            SensorReading::Contact(ContactSensorState::ContactNotDetected)
        );
        assert_eq!(SensorReading::from(MachineStatus::Unknown), SensorReading::Unknown);
        assert_eq!(SensorReading::NotResponding.to_string(), "not responding");
    }
}
