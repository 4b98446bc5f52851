use std::time::Duration;

use corewalk_core::{Address, AddressSpace, Endian, Fault};
use serde::Serialize;

use crate::SysError;

/// `jiffies_64` starts this many seconds before the 32-bit wrap so that
/// wraparound bugs show up five minutes after boot.
pub const INITIAL_JIFFIES_WINDOW: u64 = 300;

/// Read the 64-bit tick counter at `address`.
pub fn extract_tick_counter<S>(space: &S, address: Address, endian: Endian) -> Result<u64, Fault>
where
    S: AddressSpace + ?Sized,
{
    space.read_u64(address, endian)
}

/// Converts raw tick counts into elapsed time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct TickClock {
    hz: u32,
    /// Bias subtracted from every counter value.
    initial_offset: u64,
}

impl TickClock {
    /// Clock for a counter that starts at zero, such as an already adjusted
    /// `jiffies` value.
    pub fn new(hz: u32) -> Result<Self, SysError> {
        if hz == 0 {
            return Err(SysError::ZeroHz);
        }
        Ok(Self {
            hz,
            initial_offset: 0,
        })
    }

    /// Clock for a raw `jiffies_64` value, which starts at `INITIAL_JIFFIES`
    /// (`(u32)(-300 * HZ)`) rather than zero.
    pub fn jiffies_64(hz: u32) -> Result<Self, SysError> {
        let clock = Self::new(hz)?;
        Ok(Self {
            initial_offset: (1u64 << 32).wrapping_sub(INITIAL_JIFFIES_WINDOW * u64::from(hz)),
            ..clock
        })
    }

    pub fn hz(&self) -> u32 {
        self.hz
    }

    pub fn initial_offset(&self) -> u64 {
        self.initial_offset
    }

    /// Ticks since boot.
    pub fn adjusted(&self, ticks: u64) -> u64 {
        ticks.wrapping_sub(self.initial_offset)
    }

    /// Time since boot, rounded down to whole seconds.
    pub fn uptime(&self, ticks: u64) -> Duration {
        Duration::from_secs(self.adjusted(ticks) / u64::from(self.hz))
    }

    pub fn ticks_to_millis(&self, ticks: u64) -> u64 {
        ticks.saturating_mul(1000) / u64::from(self.hz)
    }
}

/// `H:MM:SS`, prefixed with `N day, ` or `N days, ` past 24 hours.
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let rest = secs % 86_400;
    let clock = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}
