//! Process-wide helpers.

pub mod bootstrap;
