pub mod subjects;
pub mod types;

pub use subjects::{
    agent_stream_subjects, consumer_name, delays, filter_subjects, messenger_broadcast_subjects,
    messenger_consumer_name, messenger_rollback_subject, restart_subject, roots,
    rollback_subject, status_keys, stream, update_subject, update_subject_v2,
    updater_stream_name, updater_stream_subjects, validate_agent_id,
};
pub use types::*;
