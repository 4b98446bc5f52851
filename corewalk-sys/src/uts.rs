use std::borrow::Cow;

use corewalk_core::{Address, AddressSpace, Fault, UtsnameLayout};
use serde::Serialize;

/// One character array of a `struct new_utsname`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtsField {
    pub name: &'static str,
    pub address: Address,
    /// Bytes up to the first NUL, or the whole field if there is none.
    pub raw: Vec<u8>,
    /// No NUL was found within the field.
    pub truncated: bool,
}

impl UtsField {
    fn decode(name: &'static str, address: Address, bytes: &[u8]) -> Self {
        let (raw, truncated) = match bytes.iter().position(|&b| b == 0) {
            Some(nul) => (&bytes[..nul], false),
            None => (bytes, true),
        };
        Self {
            name,
            address,
            raw: raw.to_vec(),
            truncated,
        }
    }

    /// The field as text, if it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.raw).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }
}

/// Decoded `struct new_utsname`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UtsSnapshot {
    fields: Vec<UtsField>,
}

impl UtsSnapshot {
    pub fn fields(&self) -> &[UtsField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UtsField> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn at(&self, index: usize) -> &UtsField {
        &self.fields[index]
    }

    pub fn sysname(&self) -> &UtsField {
        self.at(0)
    }

    pub fn nodename(&self) -> &UtsField {
        self.at(1)
    }

    pub fn release(&self) -> &UtsField {
        self.at(2)
    }

    pub fn version(&self) -> &UtsField {
        self.at(3)
    }

    pub fn machine(&self) -> &UtsField {
        self.at(4)
    }

    pub fn domainname(&self) -> &UtsField {
        self.at(5)
    }

    /// One `Truncated` fault per field that had no terminator.
    pub fn faults(&self) -> Vec<Fault> {
        self.fields
            .iter()
            .filter(|f| f.truncated)
            .map(|f| Fault::Truncated {
                field: f.name,
                address: f.address,
                len: f.raw.len(),
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.fields.iter().all(|f| !f.truncated)
    }
}

/// Read the `struct new_utsname` at `address`.
///
/// The whole structure is read at once, so a snapshot is never assembled from
/// a partially readable range. Unterminated fields are kept and flagged.
pub fn extract_utsname<S>(
    space: &S,
    address: Address,
    layout: &UtsnameLayout,
) -> Result<UtsSnapshot, Fault>
where
    S: AddressSpace + ?Sized,
{
    layout.validate().map_err(|_| Fault::OutOfRange {
        address,
        len: layout.size(),
    })?;
    let bytes = space.read(address, layout.size())?;

    let fields: Vec<UtsField> = UtsnameLayout::FIELDS
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let offset = layout.offset_of(i);
            let field_address = Address(address.0.wrapping_add(offset as u64));
            UtsField::decode(name, field_address, &bytes[offset..offset + layout.field_len])
        })
        .collect();

    for field in fields.iter().filter(|f| f.truncated) {
        tracing::warn!(
            field = field.name,
            address = %field.address,
            "utsname field is not terminated"
        );
    }
    tracing::debug!(address = %address, "extracted utsname");

    Ok(UtsSnapshot { fields })
}

#[cfg(test)]
mod tests {
    use corewalk_core::ImageBuilder;

    use super::*;

    fn utsname(fields: [&[u8]; 6], field_len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; field_len * 6];
        for (i, value) in fields.iter().enumerate() {
            bytes[i * field_len..i * field_len + value.len()].copy_from_slice(value);
        }
        bytes
    }

    #[test]
    fn test_extract_terminated_fields() {
        let bytes = utsname([b"Linux", b"box", b"6.1.0", b"#1 SMP", b"aarch64", b"(none)"], 65);
        let image = ImageBuilder::new().segment(0x4000u64, bytes).build().unwrap();

        let layout = UtsnameLayout::new_utsname();
        let snapshot = extract_utsname(&image, Address(0x4000), &layout).unwrap();
        assert_eq!(snapshot.sysname().text(), Some("Linux"));
        assert_eq!(snapshot.machine().text(), Some("aarch64"));
        assert_eq!(snapshot.release().address, Address(0x4000 + 130));
        assert!(snapshot.is_complete());
        assert!(snapshot.faults().is_empty());
        assert_eq!(
            snapshot.field("domainname").map(UtsField::to_string_lossy),
            Some("(none)".into())
        );
    }

    #[test]
    fn test_unterminated_field_is_flagged() {
        let bytes = utsname([b"Linux", b"abcd", b"", b"", b"", b""], 4);
        let image = ImageBuilder::new().segment(0x4000u64, bytes).build().unwrap();

        let layout = UtsnameLayout { field_len: 4 };
        let snapshot = extract_utsname(&image, Address(0x4000), &layout).unwrap();
        assert_eq!(snapshot.sysname().text(), Some("Linu"));
        assert!(snapshot.sysname().truncated);
        assert_eq!(snapshot.nodename().text(), Some("abcd"));
        assert_eq!(
            snapshot.faults(),
            vec![
                Fault::Truncated {
                    field: "sysname",
                    address: Address(0x4000),
                    len: 4
                },
                Fault::Truncated {
                    field: "nodename",
                    address: Address(0x4004),
                    len: 4
                },
            ]
        );
        assert!(snapshot.version().text().is_some_and(str::is_empty));
    }

    #[test]
    fn test_invalid_utf8_is_preserved() {
        let bytes = utsname([b"Lin\xffux", b"", b"", b"", b"", b""], 65);
        let image = ImageBuilder::new().segment(0x4000u64, bytes).build().unwrap();

        let layout = UtsnameLayout::new_utsname();
        let snapshot = extract_utsname(&image, Address(0x4000), &layout).unwrap();
        assert_eq!(snapshot.sysname().raw, b"Lin\xffux");
        assert_eq!(snapshot.sysname().text(), None);
        assert_eq!(snapshot.sysname().to_string_lossy(), "Lin\u{fffd}ux");
    }

    #[test]
    fn test_short_image_is_out_of_range() {
        let image = ImageBuilder::new().segment(0x4000u64, vec![0u8; 100]).build().unwrap();
        let err = extract_utsname(&image, Address(0x4000), &UtsnameLayout::new_utsname());
        assert!(matches!(err, Err(Fault::OutOfRange { .. })));
    }

    #[test]
    fn test_oversized_layout_is_out_of_range() {
        let image = ImageBuilder::new().segment(0x4000u64, vec![0u8; 100]).build().unwrap();
        let layout = UtsnameLayout {
            field_len: usize::MAX / 4,
        };
        let err = extract_utsname(&image, Address(0x4000), &layout);
        assert!(matches!(err, Err(Fault::OutOfRange { address: Address(0x4000), .. })));
    }
}
