//! Core types for inspecting kernel data structures in a memory image
//!
//! Everything that touches raw memory goes through [`AddressSpace`]. The
//! walkers in the sibling crates only ever see validated [`Address`] values
//! and report problems as [`Fault`] data inside a [`WalkReport`].

pub mod address;
pub mod arch;
pub mod fault;
pub mod image;
pub mod layout;
pub mod report;

pub use address::Address;
pub use arch::{Arch, Endian};
pub use fault::{Fault, LinkField};
pub use image::{AddressSpace, ImageBuilder, ImageError, Segment, SegmentedImage};
pub use layout::{
    ContainerLayout, LayoutError, ListNodeLayout, RbRootLayout, TreeNodeLayout, UtsnameLayout,
};
pub use report::{Entry, Status, TreeReport, WalkReport};
