//! Identity adapters.
//!
//! - `jwt` - HS256 bearer tokens carrying role and affiliation claims
//! - `in_memory` - Participant directory for tests and profile lookups

mod in_memory;
mod jwt;

pub use in_memory::InMemoryIdentityProvider;
pub use jwt::{JwtConfig, JwtIdentityProvider};
