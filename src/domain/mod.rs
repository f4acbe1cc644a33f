//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, principals, errors, events)
//! - `booking` - Appointment requests and their lifecycle
//! - `client` - Client records materialized by accepted bookings
//! - `conversation` - Two-party conversations and messages
//! - `notes` - Consultation notes with typed clinical payloads
//! - `access` - Role and ownership checks

pub mod access;
pub mod booking;
pub mod client;
pub mod conversation;
pub mod foundation;
pub mod notes;

