//! Faults detected while reading or walking the image
//!
//! Faults are data. Walkers return them inside a report; nothing here
//! aborts the process.

use core::fmt;

use serde::Serialize;

use crate::Address;

/// The link field a fault was found on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkField {
    Next,
    Prev,
    Left,
    Right,
    Parent,
    /// `rb_root.rb_node`
    Root,
}

impl fmt::Display for LinkField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkField::Next => "next",
            LinkField::Prev => "prev",
            LinkField::Left => "rb_left",
            LinkField::Right => "rb_right",
            LinkField::Parent => "parent",
            LinkField::Root => "rb_node",
        };
        f.write_str(name)
    }
}

/// Everything that can go wrong while inspecting a structure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fault {
    /// Read outside all declared segments, straddling two, or of zero length.
    #[error("read of {len} bytes at {address} is outside the image")]
    OutOfRange { address: Address, len: usize },

    /// A link that had to be followed is null or wild.
    #[error("{field} pointer of {node} is {value} and cannot be followed")]
    BadPointer {
        node: Address,
        field: LinkField,
        value: Address,
    },

    /// A back link (`prev`, parent) does not name the actual predecessor.
    #[error("broken {field} link at {node}: expected {expected}, found {found}")]
    InconsistentBackPointer {
        node: Address,
        field: LinkField,
        expected: Address,
        found: Address,
    },

    /// A node was reached twice, or the node budget ran out.
    #[error("cycle detected at {node} after {visited} nodes")]
    Cycle { node: Address, visited: usize },

    #[error("red node {node} has red child {child}")]
    RedRedViolation { node: Address, child: Address },

    /// Two root-to-null paths carry a different number of black nodes.
    ///
    /// Paths list the nodes from the root down to the node whose null child
    /// terminated the path.
    #[error("black height {found} below {node} differs from {expected}")]
    BlackHeightMismatch {
        node: Address,
        expected: u32,
        found: u32,
        expected_path: Vec<Address>,
        found_path: Vec<Address>,
    },

    #[error("cpu {cpu} is out of range (nr_cpus = {nr_cpus})")]
    CpuIndexOutOfRange { cpu: usize, nr_cpus: usize },

    #[error("{address} is not inside the per-cpu region")]
    NotPerCpu { address: Address },

    /// A text field has no NUL within its width. The field is still usable.
    #[error("field {field} at {address} has no terminator within {len} bytes")]
    Truncated {
        field: &'static str,
        address: Address,
        len: usize,
    },
}

impl Fault {
    /// The structure node the fault is attributed to, if any.
    pub fn node(&self) -> Option<Address> {
        match self {
            Fault::BadPointer { node, .. }
            | Fault::InconsistentBackPointer { node, .. }
            | Fault::Cycle { node, .. }
            | Fault::RedRedViolation { node, .. }
            | Fault::BlackHeightMismatch { node, .. } => Some(*node),
            Fault::OutOfRange { .. }
            | Fault::CpuIndexOutOfRange { .. }
            | Fault::NotPerCpu { .. }
            | Fault::Truncated { .. } => None,
        }
    }

    /// Short machine-friendly name of the fault class.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::OutOfRange { .. } => "out_of_range",
            Fault::BadPointer { .. } => "bad_pointer",
            Fault::InconsistentBackPointer { .. } => "inconsistent_back_pointer",
            Fault::Cycle { .. } => "cycle",
            Fault::RedRedViolation { .. } => "red_red_violation",
            Fault::BlackHeightMismatch { .. } => "black_height_mismatch",
            Fault::CpuIndexOutOfRange { .. } => "cpu_index_out_of_range",
            Fault::NotPerCpu { .. } => "not_per_cpu",
            Fault::Truncated { .. } => "truncated",
        }
    }
}
