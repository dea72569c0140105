use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use rigctl_protocol::TestId;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::schema::FieldSchema;
use crate::session::SessionState;

/// All sessions, keyed by test id, behind one lock.
///
/// The lock is held for a whole request cycle (resolve, transition,
/// telemetry, snapshot), so requests for different tests still serialize.
pub struct SessionRegistry {
    inner: Mutex<Sessions>,
}

impl SessionRegistry {
    pub fn new(schema: Arc<FieldSchema>, display_name: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(Sessions {
                schema,
                display_name: display_name.into(),
                sessions: HashMap::new(),
            }),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.inner.lock().await
    }
}

/// Session map, only reachable through [`SessionRegistry::lock`].
///
/// Sessions are never removed; the map grows by one entry per distinct
/// test id for the life of the process.
pub struct Sessions {
    schema: Arc<FieldSchema>,
    display_name: String,
    sessions: HashMap<TestId, SessionState>,
}

impl Sessions {
    /// Existing session for `test`, or a fresh idle one built from the schema.
    pub fn get_or_create(&mut self, test: &str) -> &mut SessionState {
        let live = self.sessions.len();
        match self.sessions.entry(test.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                info!(test = %test, sessions = live + 1, "session created");
                entry.insert(SessionState::new(
                    test,
                    self.display_name.clone(),
                    Arc::clone(&self.schema),
                ))
            }
        }
    }

    pub fn get(&self, test: &str) -> Option<&SessionState> {
        self.sessions.get(test)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Known test ids, sorted.
    pub fn test_ids(&self) -> Vec<TestId> {
        let mut ids: Vec<_> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }
}
