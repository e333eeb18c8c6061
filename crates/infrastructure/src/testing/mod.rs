//! Testing utilities for infrastructure tests.
//!
//! Container-backed fixtures for exercising the Redis cache tier against a
//! real server. Tests using them need Docker and are `#[ignore]`d by default.

mod containers;

pub use containers::{ContainerError, RedisContainer, RedisContainerConfig};
