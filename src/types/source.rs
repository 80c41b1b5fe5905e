//! Source types: the closed set of record categories the system indexes

use serde::{Deserialize, Serialize};

/// Category of record an adapter fetches and formats.
///
/// This is a closed set: retrieval only ever runs against the types the
/// caller explicitly requested, and collection names are derived from the
/// same vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Uploaded documents (the only true vector-search source)
    Documents,
    /// Lease contracts
    Leases,
    /// Properties
    Properties,
    /// Live portfolio KPI rollup
    Kpis,
    /// Tenants
    Tenants,
    /// Owners
    Owners,
}

impl SourceType {
    /// All source types, in stable order
    pub const ALL: [SourceType; 6] = [
        SourceType::Documents,
        SourceType::Leases,
        SourceType::Properties,
        SourceType::Kpis,
        SourceType::Tenants,
        SourceType::Owners,
    ];

    /// Wire token for this source type
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Documents => "documents",
            SourceType::Leases => "leases",
            SourceType::Properties => "properties",
            SourceType::Kpis => "kpis",
            SourceType::Tenants => "tenants",
            SourceType::Owners => "owners",
        }
    }

    /// Parse a wire token, tolerating common singular variants.
    /// Unknown tokens return `None`; callers skip them rather than failing
    /// the whole request.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "documents" | "document" => Some(SourceType::Documents),
            "leases" | "lease" => Some(SourceType::Leases),
            "properties" | "property" => Some(SourceType::Properties),
            "kpis" | "kpi" => Some(SourceType::Kpis),
            "tenants" | "tenant" => Some(SourceType::Tenants),
            "owners" | "owner" => Some(SourceType::Owners),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_singular_aliases() {
        assert_eq!(SourceType::parse("kpi"), Some(SourceType::Kpis));
        assert_eq!(SourceType::parse("KPIS"), Some(SourceType::Kpis));
        assert_eq!(SourceType::parse("lease"), Some(SourceType::Leases));
        assert_eq!(SourceType::parse("unknown"), None);
    }

    #[test]
    fn wire_tokens_round_trip() {
        for st in SourceType::ALL {
            assert_eq!(SourceType::parse(st.as_str()), Some(st));
        }
    }
}
