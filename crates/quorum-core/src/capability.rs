//! Node capabilities and identity.
//!
//! A node announces a [`NodeInfo`] as the first frame on every connection.
//! Clients route by the capability kinds it lists.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Category of operation a node can take part in.
///
/// Travels as its ordinal; append only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
#[repr(u32)]
pub enum CapabilityKind {
    KeyGeneration = 0,
    Signing = 1,
    Upload = 2,
    BoardManagement = 3,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::KeyGeneration,
        CapabilityKind::Signing,
        CapabilityKind::Upload,
        CapabilityKind::BoardManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::KeyGeneration => "key_generation",
            CapabilityKind::Signing => "signing",
            CapabilityKind::Upload => "upload",
            CapabilityKind::BoardManagement => "board_management",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CapabilityKind> for u32 {
    fn from(kind: CapabilityKind) -> Self {
        kind as u32
    }
}

impl TryFrom<u32> for CapabilityKind {
    type Error = crate::UnknownDiscriminant;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CapabilityKind::ALL
            .into_iter()
            .find(|kind| *kind as u32 == value)
            .ok_or(crate::UnknownDiscriminant {
                kind: "capability",
                value,
            })
    }
}

/// Extra data attached to a capability.
///
/// Nothing interprets details yet; they are reserved for constraint data
/// such as supported algorithms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Detail {
    Text(String),
    Bytes(Vec<u8>),
}

/// A declared capability.
///
/// Equality, ordering and hashing look at the kind only, so a set of
/// capabilities holds at most one entry per kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    kind: CapabilityKind,
    details: Vec<Detail>,
}

impl Capability {
    pub fn new(kind: CapabilityKind) -> Self {
        Self {
            kind,
            details: Vec::new(),
        }
    }

    pub fn with_details(kind: CapabilityKind, details: Vec<Detail>) -> Self {
        Self { kind, details }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.kind
    }

    pub fn details(&self) -> &[Detail] {
        &self.details
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Capability {}

impl Hash for Capability {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
    }
}

impl PartialOrd for Capability {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Capability {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind.cmp(&other.kind)
    }
}

impl From<CapabilityKind> for Capability {
    fn from(kind: CapabilityKind) -> Self {
        Capability::new(kind)
    }
}

/// Identity a node announces when a client connects.
///
/// Decoding goes through [`NodeInfo::new`], so a peer repeating a kind still
/// yields one entry per kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireNodeInfo")]
pub struct NodeInfo {
    /// Logical node name, distinct from its network address.
    name: String,
    capabilities: Vec<Capability>,
}

#[derive(Deserialize)]
struct WireNodeInfo {
    name: String,
    capabilities: Vec<Capability>,
}

impl From<WireNodeInfo> for NodeInfo {
    fn from(wire: WireNodeInfo) -> Self {
        NodeInfo::new(wire.name, wire.capabilities)
    }
}

impl NodeInfo {
    /// Create a node identity. Repeated kinds keep the first declaration.
    pub fn new(name: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let mut seen = BTreeSet::new();
        let capabilities = capabilities
            .into_iter()
            .filter(|cap| seen.insert(cap.kind()))
            .collect();
        Self {
            name: name.into(),
            capabilities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    pub fn declares(&self, kind: CapabilityKind) -> bool {
        self.capabilities.iter().any(|cap| cap.kind() == kind)
    }

    pub fn capability_set(&self) -> BTreeSet<Capability> {
        self.capabilities.iter().cloned().collect()
    }
}

/// Union of the capabilities declared by several nodes.
pub fn union_capabilities<'a>(nodes: impl IntoIterator<Item = &'a NodeInfo>) -> BTreeSet<Capability> {
    nodes
        .into_iter()
        .flat_map(|node| node.capabilities().iter().cloned())
        .collect()
}
