//! Bridge lines, transport classes, and the acquisition pipeline around them.
//!
//! A bridge line is the exact connection string a Tor client puts after the
//! `Bridge` keyword in its torrc. The same bytes are used as the dedup key in
//! persisted sets and as the payload shown to users, so lines are only ever
//! trimmed, never normalized further.

pub mod extract;
pub mod fetch;
pub mod reconcile;
pub mod selector;

pub use extract::extract_bridge_lines;
pub use fetch::{BridgeSource, FetchEngine, FetchError};
pub use reconcile::{reconcile, Reconciliation};
pub use selector::{select_candidate, NoCandidateAvailable};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single transport-specific bridge connection string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BridgeLine(String);

impl BridgeLine {
    /// Build a bridge line from raw text, trimming surrounding whitespace.
    /// Returns `None` for blank input.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The transport keyword at the start of the line (`obfs4`, `webtunnel`, ...).
    pub fn transport_name(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or("")
    }
}

impl fmt::Display for BridgeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BridgeLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BridgeLine {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BridgeLine::new(&value).ok_or_else(|| "bridge line is empty".to_string())
    }
}

impl From<BridgeLine> for String {
    fn from(line: BridgeLine) -> Self {
        line.0
    }
}

/// Transport and IP family of a bridge listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportClass {
    #[serde(rename = "obfs4")]
    Obfs4Ipv4,
    #[serde(rename = "obfs4_ipv6")]
    Obfs4Ipv6,
    #[serde(rename = "webtunnel")]
    WebtunnelIpv4,
    #[serde(rename = "webtunnel_ipv6")]
    WebtunnelIpv6,
}

impl TransportClass {
    /// All classes in their canonical processing order.
    pub const ALL: [TransportClass; 4] = [
        TransportClass::Obfs4Ipv4,
        TransportClass::Obfs4Ipv6,
        TransportClass::WebtunnelIpv4,
        TransportClass::WebtunnelIpv6,
    ];

    /// Stable name used in file names, config keys and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportClass::Obfs4Ipv4 => "obfs4",
            TransportClass::Obfs4Ipv6 => "obfs4_ipv6",
            TransportClass::WebtunnelIpv4 => "webtunnel",
            TransportClass::WebtunnelIpv6 => "webtunnel_ipv6",
        }
    }

    /// Human readable title, e.g. "Obfs4 ipv6".
    pub fn title(&self) -> &'static str {
        match self {
            TransportClass::Obfs4Ipv4 => "Obfs4",
            TransportClass::Obfs4Ipv6 => "Obfs4 ipv6",
            TransportClass::WebtunnelIpv4 => "Webtunnel",
            TransportClass::WebtunnelIpv6 => "Webtunnel ipv6",
        }
    }

    /// Listing URL on the public distributor.
    pub fn default_url(&self) -> &'static str {
        match self {
            TransportClass::Obfs4Ipv4 => "https://bridges.torproject.org/bridges?transport=obfs4",
            TransportClass::Obfs4Ipv6 => {
                "https://bridges.torproject.org/bridges?transport=obfs4&ipv6=yes"
            }
            TransportClass::WebtunnelIpv4 => {
                "https://bridges.torproject.org/bridges?transport=webtunnel"
            }
            TransportClass::WebtunnelIpv6 => {
                "https://bridges.torproject.org/bridges?transport=webtunnel&ipv6=yes"
            }
        }
    }

    /// Name of the file holding the persisted set for this class.
    pub fn file_name(&self) -> String {
        format!("{}_bridges.json", self.as_str())
    }

    /// Whether a line of free text looks like a bridge of this transport.
    /// Used by the text fallback when the page has no bridge-line markup.
    pub fn matches_signature(&self, text: &str) -> bool {
        match self {
            TransportClass::Obfs4Ipv4 | TransportClass::Obfs4Ipv6 => {
                text.contains("obfs4") && text.contains("cert=")
            }
            TransportClass::WebtunnelIpv4 | TransportClass::WebtunnelIpv6 => {
                text.contains("webtunnel") && text.contains("http")
            }
        }
    }
}

impl fmt::Display for TransportClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "obfs4" | "obfs4_ipv4" => Ok(TransportClass::Obfs4Ipv4),
            "obfs4_ipv6" => Ok(TransportClass::Obfs4Ipv6),
            "webtunnel" | "webtunnel_ipv4" => Ok(TransportClass::WebtunnelIpv4),
            "webtunnel_ipv6" => Ok(TransportClass::WebtunnelIpv6),
            other => Err(format!("unknown transport class: {}", other)),
        }
    }
}

/// Bridge lines fetched in one pass, in page order per class.
pub type FetchedBridges = BTreeMap<TransportClass, Vec<BridgeLine>>;

/// Persisted per-class sets. `BTreeSet` keeps them sorted and duplicate free.
pub type BridgeSets = BTreeMap<TransportClass, BTreeSet<BridgeLine>>;

/// Count all lines across classes.
pub fn total_lines<V>(by_class: &BTreeMap<TransportClass, V>) -> usize
where
    for<'a> &'a V: IntoIterator,
{
    by_class
        .values()
        .map(|lines| lines.into_iter().count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_line_trims_and_rejects_blank() {
        let line = BridgeLine::new("  obfs4 1.2.3.4:443 AAAA cert=x iat-mode=0 \n").unwrap();
        assert_eq!(line.as_str(), "obfs4 1.2.3.4:443 AAAA cert=x iat-mode=0");
        assert_eq!(line.transport_name(), "obfs4");
        assert!(BridgeLine::new("   ").is_none());
    }

    #[test]
    fn test_bridge_line_serde_is_transparent_string() {
        let line = BridgeLine::new("webtunnel [2001:db8::1]:443 url=https://a.example").unwrap();
        let json = serde_json::to_string(&line).unwrap();
        assert_eq!(json, "\"webtunnel [2001:db8::1]:443 url=https://a.example\"");
        let back: BridgeLine = serde_json::from_str(&json).unwrap();
        assert_eq!(back, line);
        assert!(serde_json::from_str::<BridgeLine>("\"  \"").is_err());
    }

    #[test]
    fn test_transport_class_names_round_trip() {
        for class in TransportClass::ALL {
            assert_eq!(class.as_str().parse::<TransportClass>().unwrap(), class);
        }
        assert_eq!(
            "obfs4-ipv4".parse::<TransportClass>().unwrap(),
            TransportClass::Obfs4Ipv4
        );
        assert!("snowflake".parse::<TransportClass>().is_err());
    }

    #[test]
    fn test_signatures() {
        let obfs4 = TransportClass::Obfs4Ipv6;
        assert!(obfs4.matches_signature("obfs4 [::1]:80 FP cert=abc iat-mode=0"));
        assert!(!obfs4.matches_signature("obfs4 without certificate"));

        let webtunnel = TransportClass::WebtunnelIpv4;
        assert!(webtunnel.matches_signature("webtunnel 1.1.1.1:443 url=https://x.example/p"));
        assert!(!webtunnel.matches_signature("webtunnel 1.1.1.1:443"));
    }

    #[test]
    fn test_file_names() {
        assert_eq!(TransportClass::Obfs4Ipv4.file_name(), "obfs4_bridges.json");
        assert_eq!(
            TransportClass::WebtunnelIpv6.file_name(),
            "webtunnel_ipv6_bridges.json"
        );
    }

    #[test]
    fn test_total_lines() {
        let mut fetched = FetchedBridges::new();
        fetched.insert(
            TransportClass::Obfs4Ipv4,
            vec![BridgeLine::new("a").unwrap(), BridgeLine::new("b").unwrap()],
        );
        fetched.insert(TransportClass::WebtunnelIpv4, vec![BridgeLine::new("c").unwrap()]);
        assert_eq!(total_lines(&fetched), 3);
    }
}
