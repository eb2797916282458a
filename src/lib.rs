//! calltrack — sales call lifecycle tracking.
//!
//! Tracks a call from calendar booking through outcome across three
//! independent, unreliable event sources (calendar, transcript recorder,
//! payments). The reconciliation core keeps one consistent, audited record
//! per call no matter how late, duplicated, or out of order the events
//! arrive.

pub mod adapters;
pub mod alerts;
pub mod attendance;
pub mod config;
pub mod db;
mod migrations;
pub mod overbooking;
pub mod prospect;
pub mod reconcile;
pub mod state;
pub mod sweeper;
pub mod transcript;
pub mod types;
pub mod util;

pub use attendance::{transition_state, Attendance, ExtraUpdates};
pub use reconcile::{handle_calendar_event, ReconcileAction, ReconcileOutcome};
pub use state::AppState;
pub use sweeper::{SweepSummary, Sweeper};
