//! Clock port - server-assigned time.
//!
//! Message and booking timestamps come from here, never from the caller,
//! so a participant with a skewed local clock cannot reorder a log.

use crate::domain::foundation::Timestamp;

pub trait Clock: Send + Sync {
    /// Current time. Implementations used for message ordering must never
    /// return a value less than or equal to a previous one.
    fn now(&self) -> Timestamp;
}
