#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Emergency dispatch coordination engine.
//!
//! Matches reported emergencies to nearby responder agencies, tracks alerts
//! and response teams, and manages multi-agency coordination sessions.

pub mod api;
pub mod catalog;
pub mod collaborators;
pub mod command;
pub mod error;
pub mod gazetteer;
pub mod geo;
pub mod ledger;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod session;

mod util;

pub use error::{DispatchError, ErrorKind, Result};
pub use geo::Coordinate;
pub use orchestrator::{Collaborators, DispatchConfig, DispatchOutcome, Dispatcher, EmergencyReport};
pub use util::{now_ms, EpochMs};
