use std::collections::BTreeMap;
use std::io::Read;

use corewalk_core::{Address, AddressSpace};
use flate2::read::GzDecoder;

use crate::SysError;

/// Marker in front of the gzip stream in `kernel_config_data`.
pub const IKCONFIG_START: &[u8] = b"IKCFG_ST";
/// Marker after the gzip stream in `kernel_config_data`.
pub const IKCONFIG_END: &[u8] = b"IKCFG_ED";

/// Parsed `.config` text, as embedded by `CONFIG_IKCONFIG`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelConfig {
    text: String,
    options: BTreeMap<String, String>,
}

impl KernelConfig {
    /// Collect every `CONFIG_NAME=value` line. Comments (`# ...`) are
    /// stripped first, so `# CONFIG_FOO is not set` leaves no entry.
    pub fn parse(text: &str) -> Self {
        let options = text
            .lines()
            .filter_map(|line| {
                let line = line.split('#').next().unwrap_or_default().trim();
                let (name, value) = line.strip_prefix("CONFIG_")?.split_once('=')?;
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Self {
            text: text.to_string(),
            options,
        }
    }

    /// The text this configuration was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value of an option, named with or without the `CONFIG_` prefix.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.strip_prefix("CONFIG_").unwrap_or(name);
        self.options.get(name).map(String::as_str)
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.get(name), Some("y") | Some("m"))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `CONFIG_HZ`
    pub fn hz(&self) -> Result<u32, SysError> {
        let value = self
            .get("HZ")
            .ok_or_else(|| SysError::MissingOption("HZ".to_string()))?;
        value.parse().map_err(|_| SysError::InvalidNumber {
            name: "HZ".to_string(),
            value: value.to_string(),
        })
    }
}

/// Decompress the `kernel_config_data` blob of `len` bytes at `address`.
pub fn extract_ikconfig<S>(
    space: &S,
    address: Address,
    len: usize,
) -> Result<KernelConfig, SysError>
where
    S: AddressSpace + ?Sized,
{
    let blob = space.read(address, len)?;
    if blob.len() < IKCONFIG_START.len() + IKCONFIG_END.len() {
        return Err(SysError::ShortBlob(blob.len()));
    }
    if !blob.starts_with(IKCONFIG_START) {
        return Err(SysError::MissingMarker("IKCFG_ST"));
    }

    // The symbol is a C string, so a NUL may follow the end marker.
    let body = &blob[IKCONFIG_START.len()..];
    let end = body
        .windows(IKCONFIG_END.len())
        .rposition(|w| w == IKCONFIG_END)
        .ok_or(SysError::MissingMarker("IKCFG_ED"))?;

    let mut text = String::new();
    GzDecoder::new(&body[..end]).read_to_string(&mut text)?;
    tracing::debug!(address = %address, bytes = text.len(), "decompressed kernel config");

    Ok(KernelConfig::parse(&text))
}
