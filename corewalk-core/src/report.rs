//! Validation reports shared by all walkers

use serde::Serialize;

use crate::{Address, Fault};

/// Overall classification of a walked structure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Consistent,
    Corrupt,
}

/// One visited node, plus its owning object for container walks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub node: Address,
    pub container: Option<Address>,
}

impl Entry {
    pub const fn node(node: Address) -> Self {
        Self {
            node,
            container: None,
        }
    }
}

/// Result of one walk: the nodes visited in order and the first fault.
///
/// A walk stops at the first fault, so `entries` is the partial sequence
/// gathered up to that point.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct WalkReport {
    pub entries: Vec<Entry>,
    pub fault: Option<Fault>,
}

impl WalkReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> Status {
        if self.fault.is_some() {
            Status::Corrupt
        } else {
            Status::Consistent
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.fault.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nodes(&self) -> Vec<Address> {
        self.entries.iter().map(|e| e.node).collect()
    }

    /// Container addresses of a container walk; empty otherwise.
    pub fn containers(&self) -> Vec<Address> {
        self.entries.iter().filter_map(|e| e.container).collect()
    }

    /// Convert into a `Result`, discarding the partial sequence on failure.
    pub fn into_result(self) -> Result<Vec<Entry>, Fault> {
        match self.fault {
            Some(fault) => Err(fault),
            None => Ok(self.entries),
        }
    }
}

/// Report of a tree walk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TreeReport {
    pub walk: WalkReport,
    /// Black-height shared by every root-to-null path; `None` if the walk
    /// faulted before it could be established.
    pub black_height: Option<u32>,
}

impl TreeReport {
    pub fn status(&self) -> Status {
        self.walk.status()
    }

    pub fn is_consistent(&self) -> bool {
        self.walk.is_consistent()
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.walk.fault.as_ref()
    }

    pub fn nodes(&self) -> Vec<Address> {
        self.walk.nodes()
    }

    pub fn containers(&self) -> Vec<Address> {
        self.walk.containers()
    }

    pub fn len(&self) -> usize {
        self.walk.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walk.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_follows_fault() {
        let mut report = WalkReport::new();
        report.entries.push(Entry::node(Address(0x10)));
        assert_eq!(report.status(), Status::Consistent);

        report.fault = Some(Fault::Cycle {
            node: Address(0x10),
            visited: 1,
        });
        assert_eq!(report.status(), Status::Corrupt);
        assert_eq!(report.nodes(), vec![Address(0x10)]);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_containers_only_for_container_walks() {
        let report = WalkReport {
            entries: vec![
                Entry {
                    node: Address(0x1008),
                    container: Some(Address(0x1000)),
                },
                Entry {
                    node: Address(0x1020),
                    container: Some(Address(0x1018)),
                },
            ],
            fault: None,
        };
        assert_eq!(report.containers(), vec![Address(0x1000), Address(0x1018)]);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_report_serializes_as_plain_data() {
        let report = TreeReport {
            walk: WalkReport {
                entries: vec![Entry::node(Address(0x40))],
                fault: None,
            },
            black_height: Some(1),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["walk"]["entries"][0]["node"], 0x40);
        assert_eq!(json["black_height"], 1);
        assert!(json["walk"]["fault"].is_null());
    }
}
