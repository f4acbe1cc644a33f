//! NeoCare - Booking lifecycle and real-time conversation core.
//!
//! Backs the consultant portal: clients request appointments, consultants
//! accept or decline them, both sides talk through two-party conversations,
//! and consultants keep consultation notes for the clients they serve.
//! Pending bookings are batched into email notifications.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
