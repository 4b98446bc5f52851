//! corewalk - consistency checks for kernel data structures
//!
//! Walks the linked lists, red-black trees and per-CPU variables of a
//! captured Linux kernel memory image and reports whether each structure is
//! well formed. The image is only ever read through an [`AddressSpace`], so
//! corrupt pointers become [`Fault`]s instead of host memory accesses.
//!
//! The walker crates can be used directly; this crate adds configuration
//! loading, tracing bootstrap and an [`Inspector`] that applies the
//! configured limits to every walk.

pub mod config;
mod inspector;
pub mod utils;

pub use config::Config;
pub use inspector::Inspector;

pub use corewalk_core::{
    Address, AddressSpace, Arch, ContainerLayout, Endian, Entry, Fault, ImageBuilder, ImageError,
    LayoutError, LinkField, ListNodeLayout, RbRootLayout, Segment, SegmentedImage, Status,
    TreeNodeLayout, TreeReport, UtsnameLayout, WalkReport,
};
pub use corewalk_list::{
    list_is_empty, walk_list, walk_list_entries, walk_list_with, ListWalkOptions, ListWalker,
};
pub use corewalk_percpu::{PerCpuRegion, PerCpuResolver};
pub use corewalk_rbtree::{
    walk_rb_root, walk_rb_root_with, walk_tree, walk_tree_entries, walk_tree_with, RbColor, RbNode,
    TraversalOrder, TreeWalkOptions,
};
pub use corewalk_sys::{
    calculate_loadavg, extract_ikconfig, extract_loadavg, extract_tick_counter, extract_utsname,
    format_loadavg, format_uptime, KernelConfig, SysError, TickClock, UtsField, UtsSnapshot,
};
