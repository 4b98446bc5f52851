//! Test doubles for corewalk
//!
//! In-memory images that reproduce the C fixtures the walkers are checked
//! against: the list, red-black tree, per-CPU and utsname/jiffies programs.
//! Each fixture is laid out by a [`FixtureBuilder`] the way a linker would
//! place the globals, so pointers between symbols are real addresses inside
//! the image and the corrupted ones are exactly as wrong as in C.

mod builder;
pub mod lists;
pub mod percpu;
pub mod sys;
pub mod trees;

pub use builder::{Fixture, FixtureBuilder};

use corewalk_core::{Address, ImageError};

/// Errors assembling a fixture.
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("write of {len} bytes at {address} is outside every section")]
    UnmappedWrite { address: Address, len: usize },

    #[error("symbol {0} allocated before any section was opened")]
    NoSection(String),

    #[error("symbol {0} is defined twice")]
    DuplicateSymbol(String),

    #[error("unknown symbol {0}")]
    UnknownSymbol(String),

    #[error("failed to compress fixture data: {0}")]
    Compress(#[from] std::io::Error),
}
