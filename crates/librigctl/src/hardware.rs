use chrono::{DateTime, Utc};
use rigctl_protocol::{FieldSpec, FieldValue};
use tracing::info;

use crate::error::HardwareError;
use crate::schema::FieldSchema;
use crate::session::SessionState;

/// Device-control hooks fired on lifecycle transitions.
///
/// Calls are fire-and-forget and run while the registry lock is held, so
/// implementations must not block.
pub trait HardwareBridge: Send + Sync {
    fn start(&self, test: &str);
    fn stop(&self, test: &str);
    fn pause(&self, test: &str);
    fn unpause(&self, test: &str);
    fn command(&self, test: &str, command: &str);
}

/// Reads device telemetry into a session's fields after every request.
pub trait Telemetry: Send + Sync {
    fn refresh(&self, session: &mut SessionState, now: DateTime<Utc>) -> Result<(), HardwareError>;
}

/// Bridge that only logs under the `hardware` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingBridge;

impl HardwareBridge for LoggingBridge {
    fn start(&self, test: &str) {
        info!(target: "hardware", test = %test, "hardware test start");
    }

    fn stop(&self, test: &str) {
        info!(target: "hardware", test = %test, "hardware test stop");
    }

    fn pause(&self, test: &str) {
        info!(target: "hardware", test = %test, "hardware test pause");
    }

    fn unpause(&self, test: &str) {
        info!(target: "hardware", test = %test, "hardware test unpause");
    }

    fn command(&self, test: &str, command: &str) {
        info!(target: "hardware", test = %test, command = %command, "hardware command accepted");
    }
}

pub const TEMPERATURE: &str = "temperature";
pub const RPM: &str = "rpm";
pub const POWER: &str = "power";

/// Simulated rig with three demo channels, matched by field id.
///
/// While a session is active the values drift with wall-clock seconds;
/// otherwise they sit at idle readings. Fields with other ids are left
/// alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoTelemetry;

impl DemoTelemetry {
    /// Schema exposing the demo channels.
    pub fn schema() -> FieldSchema {
        FieldSchema::new(vec![
            FieldSpec::new(TEMPERATURE, "Temperature", "float"),
            FieldSpec::new(RPM, "RPM", "int"),
            FieldSpec::new(POWER, "Power", "int"),
        ])
        .unwrap_or_default()
    }

    fn reading(id: &str, active: bool, secs: i64) -> Option<FieldValue> {
        let value = match (id, active) {
            (TEMPERATURE, true) => FieldValue::Real(115.2 + secs.rem_euclid(10) as f64 / 10.0),
            (TEMPERATURE, false) => FieldValue::Real(25.0),
            (RPM, true) => FieldValue::Integer(1500 + secs.rem_euclid(100)),
            (POWER, true) => FieldValue::Integer(100 + secs.wrapping_mul(7).rem_euclid(15)),
            (RPM | POWER, false) => FieldValue::Integer(0),
            _ => return None,
        };
        Some(value)
    }
}

impl Telemetry for DemoTelemetry {
    fn refresh(&self, session: &mut SessionState, now: DateTime<Utc>) -> Result<(), HardwareError> {
        let active = session.is_active();
        let secs = now.timestamp();
        let mut mismatched = Vec::new();

        for field in session.fields_mut() {
            let Some(value) = Self::reading(&field.id, active, secs) else {
                continue;
            };
            if value.fits(&field.kind) {
                field.value = value;
            } else {
                mismatched.push(field.id.clone());
            }
        }

        if mismatched.is_empty() {
            Ok(())
        } else {
            Err(HardwareError::KindMismatch(mismatched.join(", ")))
        }
    }
}
