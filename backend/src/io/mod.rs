//! # IO Module
//!
//! Interface layer between HTTP clients and the domain services. Translates
//! requests into domain operations and domain results, including errors, into
//! JSON responses.
//!
//! ## Supported Operations
//!
//! - **/api/auth**: anonymous identity state
//! - **/api/identity**: identity form gate
//! - **/api/sessions**: measurement screens (templates, draft, save)
//! - **/api/history**: saved sessions (list, filter, edit, delete)
//! - **/api/nutrition**: nutrition reference table

pub mod rest;

pub use rest::auth_apis::*;
pub use rest::history_apis::*;
pub use rest::nutrition_apis::*;
pub use rest::session_apis::*;
