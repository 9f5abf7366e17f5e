// ABOUTME: Session table - each parent session's current model, tools, and budget.
// ABOUTME: Spawns copy a session's snapshot; later updates never reach them.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::agent::Budgets;
use crate::error::SpawnError;
use crate::model::ModelHandle;
use crate::resolve::ParentSnapshot;
use crate::tool::ToolSet;

#[derive(Default)]
pub(crate) struct SessionTable {
    sessions: RwLock<HashMap<String, ParentSnapshot>>,
}

impl SessionTable {
    pub(crate) fn register(&self, session_id: String, snapshot: ParentSnapshot) {
        self.sessions.write().insert(session_id, snapshot);
    }

    pub(crate) fn snapshot(&self, session_id: &str) -> Option<ParentSnapshot> {
        self.sessions.read().get(session_id).cloned()
    }

    pub(crate) fn set_model(&self, session_id: &str, model: ModelHandle) -> Result<(), SpawnError> {
        self.update(session_id, |s| s.model = model)
    }

    pub(crate) fn set_tools(&self, session_id: &str, tools: ToolSet) -> Result<(), SpawnError> {
        self.update(session_id, |s| s.tools = tools)
    }

    pub(crate) fn set_budgets(&self, session_id: &str, budgets: Budgets) -> Result<(), SpawnError> {
        self.update(session_id, |s| s.budgets = budgets)
    }

    pub(crate) fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    fn update(
        &self,
        session_id: &str,
        change: impl FnOnce(&mut ParentSnapshot),
    ) -> Result<(), SpawnError> {
        let mut sessions = self.sessions.write();
        let snapshot = sessions
            .get_mut(session_id)
            .ok_or_else(|| SpawnError::UnknownSession(session_id.to_string()))?;
        change(snapshot);
        Ok(())
    }
}
