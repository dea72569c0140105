use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate field id in schema: {0}")]
    DuplicateField(String),

    #[error("field id must not be empty (field {0})")]
    EmptyFieldId(usize),
}

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("telemetry kind mismatch for field(s): {0}")]
    KindMismatch(String),

    /// A telemetry source could not produce readings, e.g. a device that
    /// stopped answering. [`crate::DemoTelemetry`] never returns it.
    #[error("telemetry read failed: {0}")]
    ReadFailed(String),
}
