//! Fixture programs and helpers shared by the ptyscript integration tests.

pub mod helpers;
