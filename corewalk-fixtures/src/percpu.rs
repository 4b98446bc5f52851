//! `test-percpu`: 32 CPUs with page-aligned private copies
//!
//! ```c
//! struct test_struct {
//!     int x;
//!     unsigned long ulong;
//!     void *ptr;
//! };
//! ```
//!
//! Every CPU's copy of `struct_test` has `x == ulong == cpu`; `ulong_test`
//! holds the CPU number, `voidp_test` holds `0xdeadbeef` and the two pointer
//! variables point back into the same CPU's copy.

use corewalk_core::{Address, Arch};

use crate::{Fixture, FixtureBuilder, FixtureError};

pub const NR_CPUS: usize = 32;
pub const PAGE_SIZE: usize = 4096;

/// Base of the static `.data..percpu` template region.
pub const PERCPU_START: u64 = 0x0060_4000;
pub const DATA_START: u64 = 0x0060_6000;
pub const HEAP_START: u64 = 0x0100_0000;

pub const VOIDP_VALUE: u64 = 0xdead_beef;

pub fn test_struct_size(arch: Arch) -> usize {
    3 * arch.word_size()
}

/// `offsetof(struct test_struct, ulong)`
pub fn test_struct_ulong(arch: Arch) -> usize {
    arch.word_size()
}

/// `offsetof(struct test_struct, ptr)`
pub fn test_struct_ptr(arch: Arch) -> usize {
    2 * arch.word_size()
}

/// Build the `test-percpu` image.
pub fn percpu_fixture(arch: Arch) -> Result<Fixture, FixtureError> {
    let word = arch.word_size();

    let mut b = FixtureBuilder::new(arch);
    b.section(".data..percpu", PERCPU_START);
    let start = b.define("__per_cpu_start", Address(PERCPU_START));
    let struct_test = b.alloc("struct_test", test_struct_size(arch), word);
    let ulong_test = b.alloc("ulong_test", word, word);
    let voidp_test = b.alloc("voidp_test", word, word);
    let ptr_to_struct_test = b.alloc("ptr_to_struct_test", word, word);
    let ptr_to_ulong_test = b.alloc("ptr_to_ulong_test", word, word);
    let end = b.here();
    b.define("__per_cpu_end", end);
    let size = (end.0 - start.0) as usize;

    b.section(".data", DATA_START);
    let offsets = b.alloc("__per_cpu_offset", NR_CPUS * word, word);
    let percpu_test = b.alloc("percpu_test", word, word);
    let non_percpu_test = b.alloc("non_percpu_test", word, word);

    b.section("[heap]", HEAP_START);
    let areas: Vec<Address> = (0..NR_CPUS)
        .map(|cpu| b.alloc(&format!("percpu_area[{cpu}]"), size, PAGE_SIZE))
        .collect();

    let per_cpu_ptr = |var: Address, area: Address| Address(var.0 + area.0 - start.0);

    for (cpu, &area) in areas.iter().enumerate() {
        b.word(Address(offsets.0 + (cpu * word) as u64), area.0);

        let f = per_cpu_ptr(struct_test, area);
        b.u32(f, cpu as u32)
            .word(Address(f.0 + test_struct_ulong(arch) as u64), cpu as u64)
            .pointer(Address(f.0 + test_struct_ptr(arch) as u64), Address::NULL)
            .word(per_cpu_ptr(ulong_test, area), cpu as u64)
            .word(per_cpu_ptr(voidp_test, area), VOIDP_VALUE)
            .pointer(per_cpu_ptr(ptr_to_struct_test, area), f)
            .pointer(
                per_cpu_ptr(ptr_to_ulong_test, area),
                Address(f.0 + test_struct_ulong(arch) as u64),
            );
    }

    b.pointer(percpu_test, struct_test);
    b.pointer(non_percpu_test, per_cpu_ptr(struct_test, areas[0]));

    b.build()
}
