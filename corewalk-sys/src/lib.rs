//! Fixed-layout kernel metadata
//!
//! Extraction of structures whose layout never changes shape: the
//! `struct new_utsname` behind `init_uts_ns`, the `jiffies_64` tick counter
//! and the `avenrun` load averages, plus the helpers that turn them into
//! the values users expect (uptime, load average, `CONFIG_HZ`).

mod clock;
mod error;
mod kconfig;
mod loadavg;
mod uts;

pub use clock::{extract_tick_counter, format_uptime, TickClock, INITIAL_JIFFIES_WINDOW};
pub use error::SysError;
pub use kconfig::{extract_ikconfig, KernelConfig, IKCONFIG_END, IKCONFIG_START};
pub use loadavg::{calculate_loadavg, extract_loadavg, format_loadavg, FSHIFT};
pub use uts::{extract_utsname, UtsField, UtsSnapshot};
