//! # Domain Layer
//!
//! Business logic of the measurement flow, independent of HTTP.
//!
//! ## Components
//!
//! - **validation**: identity and measurement field rules
//! - **session**: the identity and measurement steps of one session
//! - **session_service**: template reads and session persistence
//! - **session_registry**: mounted measurement screens by session id
//! - **history**: listing, filtering, editing and deleting saved sessions
//! - **nutrition**: static nutrition reference table
//!
//! Every store access goes through the identity gate first; services never
//! call the store while the anonymous sign-in is failed.

pub mod history;
pub mod keys;
pub mod nutrition;
pub mod session;
pub mod session_registry;
pub mod session_service;
pub mod validation;

pub use history::{filter_entries, DeleteConfirmation, HistoryRepository};
pub use keys::RecordKeyGenerator;
pub use nutrition::{nutrition_table, NutritionItem};
pub use session::{FetchOutcome, FetchTicket, IdentityHandoff, IdentityStep, MeasurementStep};
pub use session_registry::SessionRegistry;
pub use session_service::SessionService;
pub use validation::{parse_measurement, validate_identity, validate_measurements, Measurements};
