// State replication between participants: delta encoding, the inbound
// reducer, scheduled tasks and the participant state machine.

pub mod delta;
pub mod participant;
pub mod reducer;
pub mod timers;

pub use self::participant::{ConnectionState, Participant};
pub use self::reducer::{apply_remote, Applied, Ignored, Notice};
pub use self::timers::{TimerKey, Timers};
