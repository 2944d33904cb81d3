pub mod clock;
pub mod config;
pub mod daemon;
pub mod error;
pub mod manager;
pub mod memory;
pub mod overrides;
pub mod ports;
pub mod relevance;
pub mod report;
pub mod session;
pub mod sqlite;
pub mod stats;
pub mod templates;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{EngineError, EngineResult, ErrorKind, Failure};
pub use manager::{Collaborators, SessionManager, TaskUpdate};
pub use ports::{
    AlarmName, AlarmScheduler, Alert, AlertPriority, AlertSink, Broadcaster, ContextSource,
    DenyReason, EngineEvent, Enforcement, EnforcementSink,
};
pub use relevance::{KeywordRelevance, RelevanceEvaluator, RelevanceStrategy, Verdict};
pub use session::{GateDecision, SessionPhase};
