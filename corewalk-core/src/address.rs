//! Addresses inside the observed image

use core::fmt;

use serde::Serialize;

/// An address in the observed image's address domain.
///
/// This is never a host pointer. It only becomes readable memory by going
/// through an [`AddressSpace`](crate::AddressSpace).
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl Address {
    pub const NULL: Address = Address(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `self + offset`, or `None` if it leaves the address domain.
    pub fn checked_add(self, offset: u64) -> Option<Address> {
        self.0.checked_add(offset).map(Address)
    }

    /// `self - offset`, or `None` below zero.
    pub fn checked_sub(self, offset: u64) -> Option<Address> {
        self.0.checked_sub(offset).map(Address)
    }

    /// Address of a field `offset` bytes into the object at `self`.
    pub fn field(self, offset: usize) -> Option<Address> {
        self.checked_add(offset as u64)
    }

    /// Clear the bits set in `mask`.
    pub const fn mask(self, mask: u64) -> Address {
        Address(self.0 & !mask)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
