//! `test-syscache`: `init_uts_ns`, `jiffies_64`, `avenrun` and the embedded
//! kernel configuration

use std::io::Write;

use corewalk_core::{Address, Arch};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::{Fixture, FixtureBuilder, FixtureError};

pub const DATA_START: u64 = 0x0060_8000;

/// `__NEW_UTS_LEN + 1`
pub const UTS_FIELD_LEN: usize = 65;

/// `sysname`, `nodename`, `release`, `version`, `machine`, `domainname`.
pub const UTSNAME: [&str; 6] = [
    "Linux",
    "linux",
    "4.4.21-default",
    "#7 SMP Wed Nov 2 16:08:46 EDT 2016",
    "x86_64",
    "suse.de",
];

/// Tick rate of the fixture kernel.
pub const FIXTURE_HZ: u32 = 250;

/// `(unsigned long long)(unsigned int)(-300 * HZ) + 154 * HZ`: 154 seconds
/// after boot, counted from `INITIAL_JIFFIES`.
pub const JIFFIES_64: u64 = ((-300i32 * FIXTURE_HZ as i32) as u32 as u64) + 154 * FIXTURE_HZ as u64;

/// `avenrun[]`: 0.17, 0.05 and 0.01 in 11-bit fixed point.
pub const AVENRUN: [u64; 3] = [344, 105, 28];

pub const KERNEL_CONFIG: &str = "
#
# Linux kernel 4.4
#
CONFIG_HZ=250
# CONFIG_HZ_1000 is not set
#

";

/// `IKCFG_ST`, the gzip stream, `IKCFG_ED` and the C string terminator.
pub fn ikconfig_blob(config: &str) -> Result<Vec<u8>, FixtureError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(config.as_bytes())?;
    let mut blob = b"IKCFG_ST".to_vec();
    blob.extend(encoder.finish()?);
    blob.extend_from_slice(b"IKCFG_ED");
    blob.push(0);
    Ok(blob)
}

/// Build the `test-syscache` image.
pub fn sys_fixture(arch: Arch) -> Result<Fixture, FixtureError> {
    let word = arch.word_size();
    let config = ikconfig_blob(KERNEL_CONFIG)?;

    let mut b = FixtureBuilder::new(arch);
    b.section(".data", DATA_START);
    let uts = b.alloc("init_uts_ns", UTSNAME.len() * UTS_FIELD_LEN, 1);
    let jiffies = b.alloc("jiffies_64", 8, 8);
    let avenrun = b.alloc("avenrun", AVENRUN.len() * word, word);
    let kernel_config = b.alloc("kernel_config_data", config.len(), 1);

    for (i, value) in UTSNAME.iter().enumerate() {
        b.bytes(Address(uts.0 + (i * UTS_FIELD_LEN) as u64), value.as_bytes());
    }
    b.u64(jiffies, JIFFIES_64);
    for (i, &metric) in AVENRUN.iter().enumerate() {
        b.word(Address(avenrun.0 + (i * word) as u64), metric);
    }
    b.bytes(kernel_config, &config);

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counter_literal() {
        assert_eq!(JIFFIES_64, 4_294_892_296 + 38_500);
    }
}
