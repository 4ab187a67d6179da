/// Subject roots used by the management server.
pub mod roots {
    /// Agent update request (JetStream).
    /// Format: agent.update.{agent_id}
    /// Payload: JSON-serialized UpdateRequest
    pub const AGENT_UPDATE: &str = "agent.update";

    /// Agent update request, later protocol revision (JetStream).
    /// Format: agentupdate.{agent_id}
    /// Payload: JSON-serialized UpdateRequest
    pub const AGENT_UPDATE_V2: &str = "agentupdate";

    /// Forced restart of the agent service (core request/reply).
    /// Format: agent.restart.{agent_id}
    /// Payload: ignored; the reply is empty
    pub const AGENT_RESTART: &str = "agent.restart";

    /// Restore the previous agent executable (JetStream).
    /// Format: agent.rollback.{agent_id}
    pub const AGENT_ROLLBACK: &str = "agent.rollback";

    /// Messenger release broadcast (JetStream, not agent scoped).
    /// Payload: JSON-serialized Release
    pub const MESSENGER_UPDATE: &str = "agent.update.messenger";

    /// Restore the previous messenger executable (JetStream).
    /// Published both broadcast and as agent.rollback.messenger.{agent_id}
    pub const MESSENGER_ROLLBACK: &str = "agent.rollback.messenger";
}

/// JetStream stream and consumer naming.
pub mod stream {
    /// Shared stream owned by the management server.
    pub const NAME: &str = "AGENTS_STREAM";

    /// Per-agent stream created by the updater itself; the agent id is appended.
    pub const UPDATER_PREFIX: &str = "UPDATER_STREAM_";

    /// Durable consumer name prefix; the agent id is appended.
    pub const CONSUMER_PREFIX: &str = "AgentUpdater";

    /// Durable name prefix of the messenger broadcast consumer.
    pub const MESSENGER_CONSUMER_PREFIX: &str = "AgentUpdaterMessenger";

    /// Queue group shared by every responder of forced restarts.
    pub const RESTART_QUEUE_GROUP: &str = "agent-management";

    /// Upper bound for consumer replicas in a clustered deployment.
    pub const MAX_REPLICAS: usize = 5;
}

/// Redelivery delays and job intervals.
pub mod delays {
    use std::time::Duration;

    /// Nak delay for transient failures that left the install untouched.
    pub const NAK_LONG: Duration = Duration::from_secs(60 * 60);

    /// Nak delay after a failed post-swap start.
    pub const NAK_SHORT: Duration = Duration::from_secs(15 * 60);

    /// Watchdog tick.
    pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5 * 60);

    /// Connection retry period while the channel is unreachable.
    pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(2 * 60);

    /// Upper bound for stream and consumer setup calls.
    pub const SETUP_TIMEOUT: Duration = Duration::from_secs(60 * 60);

    /// Consumer ack wait. A held message must see progress within this window.
    pub const ACK_WAIT: Duration = Duration::from_secs(60);

    /// In-progress heartbeat for held messages; must stay below `ACK_WAIT`.
    pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(20);
}

/// Persisted status keys shared with the agent.
pub mod status_keys {
    /// Local time of the last terminal update outcome (`%Y-%m-%dT%H:%M:%S`).
    pub const LAST_EXECUTION_TIME: &str = "UpdaterLastExecutionTime";

    /// `SUCCESS` or `ERROR`.
    pub const LAST_EXECUTION_STATUS: &str = "UpdaterLastExecutionStatus";

    /// Free text describing the last outcome.
    pub const LAST_EXECUTION_RESULT: &str = "UpdaterLastExecutionResult";

    /// Set by the agent when it needs a deferred restart; cleared by the watchdog.
    pub const RESTART_REQUIRED: &str = "RestartRequired";

    /// Version of the installed messenger.
    pub const MESSENGER_VERSION: &str = "MessengerVersion";
}

pub fn update_subject(agent_id: &str) -> String {
    format!("{}.{}", roots::AGENT_UPDATE, agent_id)
}

pub fn update_subject_v2(agent_id: &str) -> String {
    format!("{}.{}", roots::AGENT_UPDATE_V2, agent_id)
}

pub fn restart_subject(agent_id: &str) -> String {
    format!("{}.{}", roots::AGENT_RESTART, agent_id)
}

pub fn rollback_subject(agent_id: &str) -> String {
    format!("{}.{}", roots::AGENT_ROLLBACK, agent_id)
}

pub fn messenger_rollback_subject(agent_id: &str) -> String {
    format!("{}.{}", roots::MESSENGER_ROLLBACK, agent_id)
}

pub fn consumer_name(agent_id: &str) -> String {
    format!("{}{}", stream::CONSUMER_PREFIX, agent_id)
}

pub fn messenger_consumer_name(agent_id: &str) -> String {
    format!("{}{}", stream::MESSENGER_CONSUMER_PREFIX, agent_id)
}

pub fn updater_stream_name(agent_id: &str) -> String {
    format!("{}{}", stream::UPDATER_PREFIX, agent_id)
}

/// Subjects captured by the per-agent updater stream.
pub fn updater_stream_subjects(agent_id: &str) -> Vec<String> {
    vec![
        update_subject_v2(agent_id),
        messenger_rollback_subject(agent_id),
        rollback_subject(agent_id),
    ]
}

/// Filter of the agent's durable consumer on the shared stream.
pub fn agent_stream_subjects(agent_id: &str) -> Vec<String> {
    vec![update_subject(agent_id)]
}

/// Broadcast subjects every updater consumes from the shared stream.
pub fn messenger_broadcast_subjects() -> Vec<String> {
    vec![
        roots::MESSENGER_UPDATE.to_string(),
        roots::MESSENGER_ROLLBACK.to_string(),
    ]
}

/// Every JetStream subject delivered to the updater, across all consumers.
pub fn filter_subjects(agent_id: &str) -> Vec<String> {
    vec![
        update_subject(agent_id),
        update_subject_v2(agent_id),
        rollback_subject(agent_id),
        roots::MESSENGER_UPDATE.to_string(),
        roots::MESSENGER_ROLLBACK.to_string(),
        messenger_rollback_subject(agent_id),
    ]
}

/// Validate that an agent id is a single subject token: 1-64 chars of
/// `[A-Za-z0-9_-]`.
/// SECURITY: call before building subjects from configuration. A `.`, `*`
/// or `>` would widen the subscription to other agents' subjects.
pub fn validate_agent_id(agent_id: &str) -> Result<(), &'static str> {
    if agent_id.is_empty() {
        return Err("agent id must not be empty");
    }
    if agent_id.len() > 64 {
        return Err("agent id must be at most 64 characters");
    }
    if !agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("agent id may only contain [A-Za-z0-9_-]");
    }
    Ok(())
}
