//! Per-CPU variable resolution
//!
//! Static per-CPU variables are linked once into the `.data..percpu`
//! template region (`__per_cpu_start`..`__per_cpu_end`). At boot every CPU
//! gets a private copy of that region and `__per_cpu_offset[cpu]` records
//! where it went, so CPU `c`'s instance of `v` lives at
//! `v + __per_cpu_offset[c] - __per_cpu_start`.
//!
//! Resolution only computes addresses. Reading the value is left to the
//! caller, who usually wants a field inside the per-CPU object anyway.

use corewalk_core::{Address, AddressSpace, Arch, Fault};
use serde::Serialize;

/// Address of `variable` inside `cpu`'s private copy of the per-CPU region.
///
/// Arithmetic wraps modulo 2^64, the same as the kernel's `unsigned long`
/// math, so offset tables below the template region resolve correctly.
pub fn resolve(
    variable: Address,
    region_start: Address,
    offsets: &[u64],
    cpu: usize,
) -> Result<Address, Fault> {
    let offset = offsets.get(cpu).ok_or(Fault::CpuIndexOutOfRange {
        cpu,
        nr_cpus: offsets.len(),
    })?;
    Ok(Address(
        variable.0.wrapping_add(offset.wrapping_sub(region_start.0)),
    ))
}

/// Read `nr_cpus` entries of the `__per_cpu_offset` array at `table`.
pub fn load_offsets<S>(
    space: &S,
    table: Address,
    nr_cpus: usize,
    arch: Arch,
) -> Result<Vec<u64>, Fault>
where
    S: AddressSpace + ?Sized,
{
    let word = arch.word_size();
    (0..nr_cpus)
        .map(|cpu| {
            let entry = table
                .checked_add((cpu * word) as u64)
                .ok_or(Fault::OutOfRange { address: table, len: word })?;
            space.read_word(entry, arch)
        })
        .collect()
}

/// The static per-CPU template region.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct PerCpuRegion {
    /// `__per_cpu_start`
    pub start: Address,
    /// `__per_cpu_end - __per_cpu_start`
    pub size: u64,
}

impl PerCpuRegion {
    pub const fn new(start: Address, size: u64) -> Self {
        Self { start, size }
    }

    /// From the `__per_cpu_start` and `__per_cpu_end` symbols.
    pub fn from_bounds(start: Address, end: Address) -> Self {
        Self {
            start,
            size: end.0.saturating_sub(start.0),
        }
    }

    pub fn contains(&self, address: Address) -> bool {
        address.0 >= self.start.0 && address.0 - self.start.0 < self.size
    }
}

/// Resolver bound to one image's per-CPU layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerCpuResolver {
    region: PerCpuRegion,
    offsets: Vec<u64>,
    nr_cpus: usize,
}

impl PerCpuResolver {
    /// Every entry of `offsets` is a usable CPU.
    pub fn new(region: PerCpuRegion, offsets: Vec<u64>) -> Self {
        let nr_cpus = offsets.len();
        Self {
            region,
            offsets,
            nr_cpus,
        }
    }

    /// Limit resolution to the first `nr_cpus` CPUs, e.g. the highest
    /// possible CPU plus one when the offset table is sized for `NR_CPUS`.
    ///
    /// A limit only ever shrinks the usable set.
    pub fn with_nr_cpus(mut self, nr_cpus: usize) -> Self {
        self.nr_cpus = nr_cpus.min(self.nr_cpus);
        self
    }

    /// Build a resolver by reading the offset table out of the image.
    pub fn load<S>(
        space: &S,
        region: PerCpuRegion,
        table: Address,
        nr_cpus: usize,
        arch: Arch,
    ) -> Result<Self, Fault>
    where
        S: AddressSpace + ?Sized,
    {
        let offsets = load_offsets(space, table, nr_cpus, arch)?;
        tracing::debug!(
            table = %table,
            nr_cpus,
            region_start = %region.start,
            "loaded per-cpu offsets"
        );
        Ok(Self::new(region, offsets))
    }

    pub fn region(&self) -> PerCpuRegion {
        self.region
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn nr_cpus(&self) -> usize {
        self.nr_cpus
    }

    /// Whether `variable` is a static per-CPU variable.
    pub fn contains(&self, variable: Address) -> bool {
        self.region.contains(variable)
    }

    /// CPU whose private copy holds the already resolved `address`.
    pub fn owner_cpu(&self, address: Address) -> Option<usize> {
        self.offsets[..self.nr_cpus].iter().position(|&base| {
            let delta = address.0.wrapping_sub(base);
            delta < self.region.size
        })
    }

    pub fn resolve(&self, variable: Address, cpu: usize) -> Result<Address, Fault> {
        if cpu >= self.nr_cpus {
            return Err(Fault::CpuIndexOutOfRange {
                cpu,
                nr_cpus: self.nr_cpus,
            });
        }
        if !self.contains(variable) {
            return Err(Fault::NotPerCpu { address: variable });
        }
        resolve(variable, self.region.start, &self.offsets, cpu)
    }

    /// Resolve `variable` for every configured CPU, indexed by CPU.
    pub fn resolve_all(&self, variable: Address) -> Result<Vec<Address>, Fault> {
        (0..self.nr_cpus).map(|cpu| self.resolve(variable, cpu)).collect()
    }
}

#[cfg(test)]
mod tests {
    use corewalk_core::ImageBuilder;
    use proptest::prelude::*;

    use super::*;

    const START: Address = Address(0x1_0000);

    fn resolver() -> PerCpuResolver {
        PerCpuResolver::new(
            PerCpuRegion::new(START, 0x1000),
            vec![0x10_0000, 0x20_0000, 0x30_0000, 0x40_0000],
        )
    }

    #[test]
    fn test_resolve_formula() {
        let addr = resolve(Address(0x1_0040), START, &[0x10_0000, 0x20_0000], 1).unwrap();
        assert_eq!(addr, Address(0x20_0040));
    }

    #[test]
    fn test_resolve_wraps_below_region() {
        // private copies placed below the template region
        let addr = resolve(Address(0x1_0040), START, &[0x8000], 0).unwrap();
        assert_eq!(addr, Address(0x8040));
    }

    #[test]
    fn test_cpu_out_of_range() {
        assert_eq!(
            resolve(Address(0x1_0040), START, &[0x10_0000], 1),
            Err(Fault::CpuIndexOutOfRange { cpu: 1, nr_cpus: 1 })
        );
    }

    #[test]
    fn test_resolver_checks_region() {
        let resolver = resolver();
        assert!(resolver.contains(Address(0x1_0fff)));
        assert!(!resolver.contains(Address(0x1_1000)));
        assert_eq!(
            resolver.resolve(Address(0x1_1000), 0),
            Err(Fault::NotPerCpu {
                address: Address(0x1_1000)
            })
        );
    }

    #[test]
    fn test_resolver_nr_cpus_limit() {
        let resolver = resolver().with_nr_cpus(2);
        assert_eq!(resolver.nr_cpus(), 2);
        assert!(resolver.resolve(Address(0x1_0010), 1).is_ok());
        assert_eq!(
            resolver.resolve(Address(0x1_0010), 2),
            Err(Fault::CpuIndexOutOfRange { cpu: 2, nr_cpus: 2 })
        );
        assert_eq!(resolver.clone().with_nr_cpus(64).nr_cpus(), 2);
        assert_eq!(resolver.with_nr_cpus(1).nr_cpus(), 1);
    }

    #[test]
    fn test_resolver_nr_cpus_clamped_to_table() {
        assert_eq!(resolver().with_nr_cpus(64).nr_cpus(), 4);
    }

    #[test]
    fn test_resolve_all_and_owner() {
        let resolver = resolver();
        let all = resolver.resolve_all(Address(0x1_0008)).unwrap();
        assert_eq!(
            all,
            vec![
                Address(0x10_0008),
                Address(0x20_0008),
                Address(0x30_0008),
                Address(0x40_0008)
            ]
        );
        assert_eq!(resolver.owner_cpu(Address(0x30_0008)), Some(2));
        assert_eq!(resolver.owner_cpu(Address(0x30_1000)), None);
    }

    #[test]
    fn test_region_from_bounds() {
        let region = PerCpuRegion::from_bounds(START, Address(0x1_2000));
        assert_eq!(region.size, 0x2000);
        assert_eq!(PerCpuRegion::from_bounds(START, Address(0)).size, 0);
    }

    #[test]
    fn test_load_offsets() {
        let mut bytes = Vec::new();
        for base in [0x10_0000u64, 0x20_0000, 0x30_0000] {
            bytes.extend_from_slice(&base.to_le_bytes());
        }
        let image = ImageBuilder::new().segment(0x5000u64, bytes).build().unwrap();

        let offsets = load_offsets(&image, Address(0x5000), 3, Arch::X86_64).unwrap();
        assert_eq!(offsets, vec![0x10_0000, 0x20_0000, 0x30_0000]);

        assert!(matches!(
            load_offsets(&image, Address(0x5000), 4, Arch::X86_64),
            Err(Fault::OutOfRange { .. })
        ));

        let region = PerCpuRegion::new(START, 0x100);
        let resolver =
            PerCpuResolver::load(&image, region, Address(0x5000), 3, Arch::X86_64).unwrap();
        assert_eq!(resolver.nr_cpus(), 3);
    }

    proptest! {
        #[test]
        fn prop_resolve_matches_formula(
            variable in any::<u64>(),
            start in any::<u64>(),
            offsets in proptest::collection::vec(any::<u64>(), 1..64),
            cpu in 0usize..64,
        ) {
            let cpu = cpu % offsets.len();
            let addr = resolve(Address(variable), Address(start), &offsets, cpu).unwrap();
            prop_assert_eq!(addr.0, variable.wrapping_add(offsets[cpu]).wrapping_sub(start));
        }

        #[test]
        fn prop_distinct_offsets_resolve_to_distinct_addresses(
            variable in any::<u64>(),
            start in any::<u64>(),
            offsets in proptest::collection::hash_set(any::<u64>(), 1..64),
        ) {
            let offsets: Vec<u64> = offsets.into_iter().collect();
            let resolved: std::collections::HashSet<Address> = (0..offsets.len())
                .map(|cpu| resolve(Address(variable), Address(start), &offsets, cpu).unwrap())
                .collect();
            prop_assert_eq!(resolved.len(), offsets.len());
        }
    }
}
