//! Records produced by a page extractor.
//!
//! Extractor output is a closed set of shapes keyed by [`TargetKind`], so the
//! cache and the deduplicator work on checkable types instead of free-form
//! JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::TargetKind;

/// One entry of the site's navigation menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationItem {
    pub title: String,
    pub url: String,
}

impl NavigationItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }

    /// URL-friendly form of the title ("Rare Books" -> "rare-books").
    pub fn slug(&self) -> String {
        self.title
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("-")
    }
}

/// A product card on a category page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub title: String,
    pub source_url: String,
    pub price: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
}

impl ProductListing {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            price: None,
            author: None,
            image_url: None,
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Cards without a title or link are dropped before deduplication.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.source_url.trim().is_empty()
    }
}

/// A customer review on a product page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub author: String,
    pub rating: u8,
    pub text: String,
}

/// Bibliographic fields found on product pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetadata {
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    pub publication_date: Option<String>,
}

/// Full product detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub rating_avg: f64,
    #[serde(default)]
    pub reviews: Vec<Review>,
    #[serde(default)]
    pub metadata: ProductMetadata,

    /// Caller's identifier for the product, set by `fetch_product_detail`
    pub source_id: Option<String>,
    pub source_url: Option<String>,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

impl ProductDetail {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

/// Category page with its deduplicated product listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPage {
    pub title: String,
    pub url: String,
    pub products: Vec<ProductListing>,
    pub count: usize,
}

/// Output of one extraction, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ExtractedRecord {
    Navigation(Vec<NavigationItem>),
    Listing(Vec<ProductListing>),
    Detail(Box<ProductDetail>),
    Reviews(Vec<Review>),
}

impl ExtractedRecord {
    /// Number of results this record represents: 1 for a detail page,
    /// the entry count for lists.
    pub fn result_count(&self) -> usize {
        match self {
            ExtractedRecord::Navigation(items) => items.len(),
            ExtractedRecord::Listing(products) => products.len(),
            ExtractedRecord::Detail(_) => 1,
            ExtractedRecord::Reviews(reviews) => reviews.len(),
        }
    }

    /// Whether this shape is what a fetch of `kind` must produce.
    pub fn matches_kind(&self, kind: TargetKind) -> bool {
        matches!(
            (self, kind),
            (ExtractedRecord::Navigation(_), TargetKind::Navigation)
                | (ExtractedRecord::Listing(_), TargetKind::Category)
                | (
                    ExtractedRecord::Detail(_),
                    TargetKind::Product | TargetKind::ProductDetail
                )
                | (ExtractedRecord::Reviews(_), TargetKind::Reviews)
        )
    }

    pub fn shape_name(&self) -> &'static str {
        match self {
            ExtractedRecord::Navigation(_) => "navigation",
            ExtractedRecord::Listing(_) => "listing",
            ExtractedRecord::Detail(_) => "detail",
            ExtractedRecord::Reviews(_) => "reviews",
        }
    }

    pub fn into_navigation(self) -> Option<Vec<NavigationItem>> {
        match self {
            ExtractedRecord::Navigation(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_listing(self) -> Option<Vec<ProductListing>> {
        match self {
            ExtractedRecord::Listing(products) => Some(products),
            _ => None,
        }
    }

    pub fn into_detail(self) -> Option<ProductDetail> {
        match self {
            ExtractedRecord::Detail(detail) => Some(*detail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_count_by_shape() {
        let detail = ExtractedRecord::Detail(Box::new(ProductDetail::titled("Dune")));
        assert_eq!(detail.result_count(), 1);

        let listing = ExtractedRecord::Listing(vec![
            ProductListing::new("Dune", "https://x/dune"),
            ProductListing::new("Emma", "https://x/emma"),
        ]);
        assert_eq!(listing.result_count(), 2);

        assert_eq!(ExtractedRecord::Navigation(vec![]).result_count(), 0);
    }

    #[test]
    fn test_matches_kind() {
        let detail = ExtractedRecord::Detail(Box::default());
        assert!(detail.matches_kind(TargetKind::Product));
        assert!(detail.matches_kind(TargetKind::ProductDetail));
        assert!(!detail.matches_kind(TargetKind::Category));

        let listing = ExtractedRecord::Listing(vec![]);
        assert!(listing.matches_kind(TargetKind::Category));
        assert!(!listing.matches_kind(TargetKind::Navigation));
    }

    #[test]
    fn test_tagged_serialization() {
        let record = ExtractedRecord::Navigation(vec![NavigationItem::new("Fiction", "https://x/f")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "navigation");
        assert_eq!(json["data"][0]["title"], "Fiction");
    }

    #[test]
    fn test_listing_completeness_and_slug() {
        assert!(!ProductListing::new("  ", "https://x/a").is_complete());
        assert!(!ProductListing::new("Dune", "").is_complete());
        assert!(ProductListing::new("Dune", "https://x/a").is_complete());

        assert_eq!(NavigationItem::new("Rare  Books", "/rare").slug(), "rare-books");
    }
}
