pub mod clock;
pub mod error;
pub mod hardware;
pub mod interpreter;
pub mod registry;
pub mod schema;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{HardwareError, SchemaError};
pub use hardware::{DemoTelemetry, HardwareBridge, LoggingBridge, Telemetry};
pub use interpreter::CommandInterpreter;
pub use registry::{SessionRegistry, Sessions};
pub use schema::FieldSchema;
pub use session::{Phase, SessionState, Transition};
