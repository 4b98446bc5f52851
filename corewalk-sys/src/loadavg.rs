use corewalk_core::{Address, AddressSpace, Arch, Fault};

/// Bits of fixed-point precision in `avenrun`.
pub const FSHIFT: u32 = 11;

/// Convert one `avenrun` fixed-point value to a load average rounded to two
/// decimals.
pub fn calculate_loadavg(metric: u64) -> f64 {
    let value = metric as f64 / f64::from(1u32 << FSHIFT);
    (value * 100.0).round() / 100.0
}

/// Space separated, the way `/proc/loadavg` starts.
pub fn format_loadavg(metrics: &[f64]) -> String {
    metrics
        .iter()
        .map(|m| {
            if m.fract() == 0.0 {
                format!("{m:.1}")
            } else {
                m.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Read the three-entry `avenrun` array at `address`.
pub fn extract_loadavg<S>(space: &S, address: Address, arch: Arch) -> Result<[f64; 3], Fault>
where
    S: AddressSpace + ?Sized,
{
    let mut metrics = [0.0; 3];
    for (i, metric) in metrics.iter_mut().enumerate() {
        let entry = address
            .field(i * arch.word_size())
            .ok_or(Fault::OutOfRange {
                address,
                len: arch.word_size(),
            })?;
        *metric = calculate_loadavg(space.read_word(entry, arch)?);
    }
    Ok(metrics)
}
