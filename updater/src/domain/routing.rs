//! Map durable-message subjects to handlers.

use updater_common::{
    messenger_rollback_subject, roots, rollback_subject, update_subject, update_subject_v2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AgentUpdate,
    AgentRollback,
    MessengerUpdate,
    MessengerRollback,
}

/// The handler for `subject`, or `None` for subjects this agent does not own.
///
/// Both update subject revisions reach the same handler, and both forms of
/// the messenger rollback subject resolve to a single route.
#[must_use]
pub fn route(subject: &str, agent_id: &str) -> Option<Route> {
    if subject == update_subject(agent_id) || subject == update_subject_v2(agent_id) {
        Some(Route::AgentUpdate)
    } else if subject == rollback_subject(agent_id) {
        Some(Route::AgentRollback)
    } else if subject == roots::MESSENGER_UPDATE {
        Some(Route::MessengerUpdate)
    } else if subject == roots::MESSENGER_ROLLBACK || subject == messenger_rollback_subject(agent_id)
    {
        Some(Route::MessengerRollback)
    } else {
        None
    }
}
