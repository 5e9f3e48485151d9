//! What a fetch is for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The purpose of a fetch. Decides the cache namespace and the record shape
/// the extractor must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Navigation,
    Category,
    Product,
    ProductDetail,
    Reviews,
}

impl TargetKind {
    pub const ALL: [TargetKind; 5] = [
        TargetKind::Navigation,
        TargetKind::Category,
        TargetKind::Product,
        TargetKind::ProductDetail,
        TargetKind::Reviews,
    ];

    /// Cache key prefix. Distinct per kind so the same URL fetched for two
    /// purposes never shares an entry.
    pub fn cache_namespace(&self) -> &'static str {
        match self {
            TargetKind::Navigation => "nav",
            TargetKind::Category => "cat",
            TargetKind::Product => "prod",
            TargetKind::ProductDetail => "detail",
            TargetKind::Reviews => "reviews",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Navigation => "navigation",
            TargetKind::Category => "category",
            TargetKind::Product => "product",
            TargetKind::ProductDetail => "product_detail",
            TargetKind::Reviews => "reviews",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown target kind: {}", s))
    }
}
