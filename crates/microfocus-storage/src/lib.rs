pub mod db;
pub mod migrations;
pub mod models;
pub mod store;

pub use db::Database;
pub use models::{
    BrowsingContext, CapturedContext, EngineState, FinishedBy, HistoryEntry, Override,
    PendingAlarm, ScrollOffset, Session, StatePatch, Statistics, Task, Theme,
    DEFAULT_BREAK_REMINDER_MINUTES, DEFAULT_FOCUS_GOAL_MINUTES,
};
pub use store::{load_state, save_patch, MemoryStore, StateStore, StoreMap};
