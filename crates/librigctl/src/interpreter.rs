use std::sync::Arc;

use rigctl_protocol::{Action, DEFAULT_TEST_ID, Request, RequestError, Snapshot};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::hardware::{DemoTelemetry, HardwareBridge, LoggingBridge, Telemetry};
use crate::registry::SessionRegistry;
use crate::session::Transition;

/// Applies client requests to the session registry.
///
/// One call to [`CommandInterpreter::handle`] is one full request cycle:
/// decode, authenticate, resolve the session, transition, fire the hardware
/// hook, refresh telemetry and snapshot, all under the registry lock.
pub struct CommandInterpreter {
    registry: Arc<SessionRegistry>,
    key: String,
    default_test: String,
    bridge: Arc<dyn HardwareBridge>,
    telemetry: Arc<dyn Telemetry>,
    clock: Arc<dyn Clock>,
}

impl CommandInterpreter {
    /// Interpreter with the logging bridge, demo telemetry and wall clock.
    pub fn new(registry: Arc<SessionRegistry>, key: impl Into<String>) -> Self {
        Self {
            registry,
            key: key.into(),
            default_test: DEFAULT_TEST_ID.to_string(),
            bridge: Arc::new(LoggingBridge),
            telemetry: Arc::new(DemoTelemetry),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_default_test(mut self, test: impl Into<String>) -> Self {
        self.default_test = test.into();
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn HardwareBridge>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Decode one inbound message and apply it.
    ///
    /// An `Err` means the message was dropped and nothing was mutated; the
    /// caller must not answer it.
    pub async fn handle(&self, text: &str) -> Result<Snapshot, RequestError> {
        let request = Request::decode(text, &self.key)?;
        Ok(self.apply(request).await)
    }

    /// Apply an already validated request and return the resulting state.
    pub async fn apply(&self, request: Request) -> Snapshot {
        let test = request.test.unwrap_or_else(|| self.default_test.clone());

        debug!(test = %test, action = request.action.name(), "request accepted");

        let mut sessions = self.registry.lock().await;
        let session = sessions.get_or_create(&test);
        let now = self.clock.now();

        match request.action {
            Action::Start => {
                let transition = session.start(now);
                self.fire(&test, "start", transition);
            }
            Action::Pause => {
                let transition = session.pause(now);
                self.fire(&test, "pause", transition);
            }
            Action::Stop => {
                let transition = session.stop();
                self.fire(&test, "stop", transition);
            }
            Action::Status => info!(test = %test, "performing action: status"),
            Action::Ping => debug!(test = %test, "ping"),
            Action::Command(command) => {
                info!(test = %test, "performing action: command");
                self.bridge.command(&test, &command);
            }
            Action::ChangeTest => {
                warn!(test = %test, "changeTest is deprecated; address sessions with the test field");
            }
            Action::Unknown(action) => info!(test = %test, action = %action, "unknown action"),
        }

        if let Err(e) = self.telemetry.refresh(session, now) {
            warn!(test = %test, error = %e, "telemetry refresh failed");
        }

        session.snapshot()
    }

    fn fire(&self, test: &str, action: &str, transition: Transition) {
        match transition {
            Transition::Started => {
                info!(test = %test, "performing action: start (startup)");
                self.bridge.start(test);
            }
            Transition::Resumed => {
                info!(test = %test, "performing action: start (unpause)");
                self.bridge.unpause(test);
            }
            Transition::Paused => {
                info!(test = %test, "performing action: pause");
                self.bridge.pause(test);
            }
            Transition::Stopped => {
                info!(test = %test, "performing action: stop");
                self.bridge.stop(test);
            }
            Transition::Unchanged => {
                debug!(test = %test, action = %action, "transition not applicable in current state");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::HardwareError;
    use crate::schema::FieldSchema;
    use crate::session::SessionState;
    use chrono::{DateTime, TimeDelta, Utc};
    use rigctl_protocol::{FieldSpec, FieldValue};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBridge {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingBridge {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HardwareBridge for RecordingBridge {
        fn start(&self, test: &str) {
            self.record(format!("start:{test}"));
        }
        fn stop(&self, test: &str) {
            self.record(format!("stop:{test}"));
        }
        fn pause(&self, test: &str) {
            self.record(format!("pause:{test}"));
        }
        fn unpause(&self, test: &str) {
            self.record(format!("unpause:{test}"));
        }
        fn command(&self, test: &str, command: &str) {
            self.record(format!("command:{test}:{command}"));
        }
    }

    struct FailingTelemetry;

    impl Telemetry for FailingTelemetry {
        fn refresh(&self, _: &mut SessionState, _: DateTime<Utc>) -> Result<(), HardwareError> {
            Err(HardwareError::ReadFailed("probe offline".to_string()))
        }
    }

    struct Harness {
        interpreter: CommandInterpreter,
        bridge: Arc<RecordingBridge>,
        clock: Arc<ManualClock>,
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn harness() -> Harness {
        let schema = FieldSchema::new(vec![
            FieldSpec::new("t", "Temp", "float"),
            FieldSpec::new("r", "RPM", "int"),
        ])
        .unwrap();
        let registry = Arc::new(SessionRegistry::new(Arc::new(schema), "Bench"));
        let bridge = Arc::new(RecordingBridge::default());
        let clock = Arc::new(ManualClock::new(t0()));
        let interpreter = CommandInterpreter::new(registry, "k")
            .with_bridge(bridge.clone())
            .with_clock(clock.clone());
        Harness {
            interpreter,
            bridge,
            clock,
        }
    }

    async fn send(h: &Harness, msg: Value) -> Result<Snapshot, RequestError> {
        h.interpreter.handle(&msg.to_string()).await
    }

    #[tokio::test]
    async fn scenario_start_then_stop() {
        let h = harness();

        let idle = send(&h, json!({"key": "k", "action": "status"})).await.unwrap();
        assert!(!idle.running);
        assert_eq!(idle.test, "001");
        assert_eq!(idle.name, "Bench");
        assert_eq!(idle.fields[0].id, "t");
        assert_eq!(idle.fields[0].value, FieldValue::Real(0.0));
        assert_eq!(idle.fields[1].id, "r");
        assert_eq!(idle.fields[1].value, FieldValue::Integer(0));

        let started = send(&h, json!({"key": "k", "action": "start"})).await.unwrap();
        assert!(started.running);
        assert_eq!(started.start_time.as_deref(), Some("2025-10-09T08:53:20Z"));

        let stopped = send(&h, json!({"key": "k", "action": "stop"})).await.unwrap();
        assert!(!stopped.running);
        assert!(stopped.start_time.is_none());
        assert_eq!(stopped.fields, idle.fields);

        assert_eq!(h.bridge.calls(), ["start:001", "stop:001"]);
    }

    #[tokio::test]
    async fn pause_and_resume_fire_hooks_and_shift_start() {
        let h = harness();
        send(&h, json!({"key": "k", "action": "start", "test": "A"})).await.unwrap();
        h.clock.advance(TimeDelta::seconds(5));
        let paused = send(&h, json!({"key": "k", "action": "pause", "test": "A"})).await.unwrap();
        assert!(paused.paused);
        h.clock.advance(TimeDelta::seconds(10));
        let resumed = send(&h, json!({"key": "k", "action": "start", "test": "A"})).await.unwrap();
        assert!(!resumed.paused);
        assert_eq!(resumed.start_time.as_deref(), Some("2025-10-09T08:53:30Z"));

        let sessions = h.interpreter.registry().lock().await;
        let elapsed = sessions.get("A").unwrap().elapsed(h.clock.now());
        assert_eq!(elapsed, TimeDelta::seconds(5));
        assert_eq!(h.bridge.calls(), ["start:A", "pause:A", "unpause:A"]);
    }

    #[tokio::test]
    async fn rejected_messages_never_mutate_state() {
        let h = harness();
        for msg in [
            json!({"action": "start"}),
            json!({"key": 7, "action": "start"}),
            json!({"key": "wrong", "action": "start"}),
            json!({"key": "k"}),
            json!({"key": "k", "action": 1}),
            json!({"key": "k", "action": "command"}),
            json!({"key": "k", "action": "command", "command": ""}),
        ] {
            assert!(send(&h, msg).await.is_err());
        }
        assert!(h.interpreter.handle("not json").await.is_err());

        assert!(h.interpreter.registry().lock().await.is_empty());
        assert!(h.bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn sessions_are_addressed_by_test_id() {
        let h = harness();
        send(&h, json!({"key": "k", "action": "start", "test": "A"})).await.unwrap();
        let b = send(&h, json!({"key": "k", "action": "status", "test": "B"})).await.unwrap();
        assert!(!b.running);
        assert_eq!(b.test, "B");

        let a = send(&h, json!({"key": "k", "action": "ping", "test": "A"})).await.unwrap();
        assert!(a.running);

        let fallback = send(&h, json!({"key": "k", "action": "status", "test": ""})).await.unwrap();
        assert_eq!(fallback.test, "001");
        assert_eq!(h.interpreter.registry().lock().await.test_ids(), ["001", "A", "B"]);
    }

    #[tokio::test]
    async fn command_is_forwarded_without_state_change() {
        let h = harness();
        let snap = send(&h, json!({"key": "k", "action": "command", "command": "heater 40"}))
            .await
            .unwrap();
        assert!(!snap.running);
        assert_eq!(h.bridge.calls(), ["command:001:heater 40"]);
    }

    #[tokio::test]
    async fn unknown_and_deprecated_actions_still_answer() {
        let h = harness();
        let snap = send(&h, json!({"key": "k", "action": "calibrate"})).await.unwrap();
        assert_eq!(snap.test, "001");

        let snap = send(&h, json!({"key": "k", "action": "changeTest", "test": "T-2"}))
            .await
            .unwrap();
        assert_eq!(snap.test, "T-2");
        assert!(h.bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn stop_when_idle_resets_without_hook() {
        let h = harness();
        let first = send(&h, json!({"key": "k", "action": "stop"})).await.unwrap();
        let second = send(&h, json!({"key": "k", "action": "stop"})).await.unwrap();
        assert_eq!(first, second);
        assert!(h.bridge.calls().is_empty());
    }

    #[tokio::test]
    async fn telemetry_failure_does_not_block_response() {
        let h = harness();
        let interpreter = CommandInterpreter::new(h.interpreter.registry().clone(), "k")
            .with_telemetry(Arc::new(FailingTelemetry))
            .with_clock(h.clock.clone())
            .with_bridge(h.bridge.clone());
        let snap = interpreter
            .handle(&json!({"key": "k", "action": "start"}).to_string())
            .await
            .unwrap();
        assert!(snap.running);
    }

    #[tokio::test]
    async fn default_test_is_configurable() {
        let h = harness();
        let interpreter =
            CommandInterpreter::new(h.interpreter.registry().clone(), "k").with_default_test("bench");
        let snap = interpreter
            .handle(&json!({"key": "k", "action": "status"}).to_string())
            .await
            .unwrap();
        assert_eq!(snap.test, "bench");
    }

    #[tokio::test]
    async fn concurrent_requests_create_each_session_once() {
        let h = Arc::new(harness());
        let mut tasks = Vec::new();
        for i in 0..16 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                let test = format!("T{}", i % 4);
                send(&h, json!({"key": "k", "action": "start", "test": test}))
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap().running);
        }
        assert_eq!(h.interpreter.registry().lock().await.len(), 4);
        assert_eq!(h.bridge.calls().len(), 4);
    }
}
