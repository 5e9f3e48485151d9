//! HTML page extractor.
//!
//! Fetches a page over HTTP and pulls structured fields out of the markup
//! with CSS selectors. Suitable for server-rendered catalog pages; pages
//! that need JavaScript rendering need a different extractor.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ExtractError, ExtractResult};
use crate::traits::extractor::{ExtractRequest, PageExtractor};
use crate::types::kind::TargetKind;
use crate::types::record::{
    ExtractedRecord, NavigationItem, ProductDetail, ProductListing, ProductMetadata, Review,
};

const MAX_NAVIGATION_ITEMS: usize = 20;
const MAX_LISTING_ITEMS: usize = 100;

/// Compiled selector sets.
struct Selectors {
    navigation: Selector,

    product_card: Selector,
    card_title: Selector,
    card_price: Selector,
    card_author: Selector,
    card_link: Selector,
    card_image: Selector,

    detail_title: Selector,
    detail_description: Selector,
    detail_price: Selector,
    detail_image: Selector,
    detail_rating: Selector,

    review: Selector,
    review_author: Selector,
    review_rating: Selector,
    review_text: Selector,

    isbn: Selector,
    publisher: Selector,
    published: Selector,
}

fn compile(css: &str) -> ExtractResult<Selector> {
    Selector::parse(css).map_err(|e| ExtractError::Failed {
        url: String::new(),
        reason: format!("invalid selector {:?}: {}", css, e),
    })
}

impl Selectors {
    fn compile() -> ExtractResult<Self> {
        Ok(Self {
            navigation: compile(r#"nav a, .navbar a, .menu a, [role="navigation"] a"#)?,

            product_card: compile(
                ".product-item, .book-card, [data-product], .product-card, .book-listing, .item-box",
            )?,
            card_title: compile("h2, h3, .title, a.name")?,
            card_price: compile(".price, [data-price], .product-price")?,
            card_author: compile(".author, [data-author], .by")?,
            card_link: compile("a[href]")?,
            card_image: compile("img")?,

            detail_title: compile("h1, .product-title, [data-title]")?,
            detail_description: compile(
                ".description, [data-description], .product-description, .details",
            )?,
            detail_price: compile(".price, [data-price]")?,
            detail_image: compile("img[src], img[data-src]")?,
            detail_rating: compile(".rating, [data-rating], .stars")?,

            review: compile(".review, .customer-review, [data-review]")?,
            review_author: compile(".reviewer-name, .user-name, .author")?,
            review_rating: compile(".review-rating, .stars, [data-rating]")?,
            review_text: compile(".review-text, .comment, .text")?,

            isbn: compile("[data-isbn], .isbn")?,
            publisher: compile("[data-publisher], .publisher")?,
            published: compile("[data-publication], .published")?,
        })
    }
}

/// HTTP + CSS selector extractor.
///
/// # Example
///
/// ```rust,ignore
/// let extractor = HtmlExtractor::new()?.with_user_agent("CatalogBot/1.0");
/// ```
pub struct HtmlExtractor {
    client: reqwest::Client,
    user_agent: String,
    selectors: Selectors,
}

impl HtmlExtractor {
    pub fn new() -> ExtractResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ExtractError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            user_agent: "CatalogScraper/1.0".to_string(),
            selectors: Selectors::compile()?,
        })
    }

    /// Set a custom user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn fetch_html(&self, request: &ExtractRequest) -> ExtractResult<(String, Url)> {
        let url = request.url.as_str();
        debug!(url = %url, "HTTP fetch starting");

        let response = self
            .client
            .get(request.url.clone())
            .header("User-Agent", &self.user_agent)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractError::Timeout {
                        url: url.to_string(),
                        timeout: request.timeout,
                    }
                } else {
                    warn!(url = %url, error = %e, "HTTP request failed");
                    ExtractError::Http(Box::new(e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::UnexpectedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Relative links resolve against the final URL after redirects
        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| ExtractError::Http(Box::new(e)))?;

        Ok((html, final_url))
    }

    /// Parse already-fetched markup into the record for `kind`.
    pub fn parse(&self, kind: TargetKind, page_url: &Url, html: &str) -> ExtractedRecord {
        let document = Html::parse_document(html);
        match kind {
            TargetKind::Navigation => ExtractedRecord::Navigation(self.navigation(&document, page_url)),
            TargetKind::Category => ExtractedRecord::Listing(self.listing(&document, page_url)),
            TargetKind::Product | TargetKind::ProductDetail => {
                ExtractedRecord::Detail(Box::new(self.detail(&document, page_url)))
            }
            TargetKind::Reviews => ExtractedRecord::Reviews(self.reviews(document.root_element())),
        }
    }

    fn navigation(&self, document: &Html, page_url: &Url) -> Vec<NavigationItem> {
        document
            .select(&self.selectors.navigation)
            .take(MAX_NAVIGATION_ITEMS)
            .map(|anchor| NavigationItem {
                title: text_of(anchor),
                url: anchor
                    .value()
                    .attr("href")
                    .and_then(|href| resolve(page_url, href))
                    .unwrap_or_default(),
            })
            .filter(|item| !item.title.is_empty())
            .collect()
    }

    fn listing(&self, document: &Html, page_url: &Url) -> Vec<ProductListing> {
        let s = &self.selectors;
        document
            .select(&s.product_card)
            .take(MAX_LISTING_ITEMS)
            .map(|card| {
                let image = card.select(&s.card_image).next();
                ProductListing {
                    title: first_text(card, &s.card_title).unwrap_or_default(),
                    source_url: card
                        .select(&s.card_link)
                        .next()
                        .and_then(|link| link.value().attr("href"))
                        .and_then(|href| resolve(page_url, href))
                        .unwrap_or_default(),
                    price: first_text(card, &s.card_price),
                    author: first_text(card, &s.card_author),
                    image_url: image.and_then(|img| image_src(img, page_url)),
                }
            })
            .filter(ProductListing::is_complete)
            .collect()
    }

    fn detail(&self, document: &Html, page_url: &Url) -> ProductDetail {
        let s = &self.selectors;
        let root = document.root_element();

        ProductDetail {
            title: first_text(root, &s.detail_title),
            description: first_text(root, &s.detail_description),
            price: first_text(root, &s.detail_price),
            author: first_text(root, &s.card_author),
            image_url: root
                .select(&s.detail_image)
                .next()
                .and_then(|img| image_src(img, page_url)),
            rating_avg: first_text(root, &s.detail_rating)
                .and_then(|text| leading_number(&text))
                .unwrap_or(0.0),
            reviews: self.reviews(root),
            metadata: ProductMetadata {
                isbn: first_text(root, &s.isbn),
                publisher: first_text(root, &s.publisher),
                publication_date: first_text(root, &s.published),
            },
            source_id: None,
            source_url: Some(page_url.to_string()),
            last_scraped_at: None,
        }
    }

    fn reviews(&self, scope: ElementRef<'_>) -> Vec<Review> {
        let s = &self.selectors;
        scope
            .select(&s.review)
            .filter_map(|review| {
                let author = first_text(review, &s.review_author)?;
                let text = first_text(review, &s.review_text)?;
                let rating = first_text(review, &s.review_rating)
                    .and_then(|t| leading_number(&t))
                    .map(|r| r.clamp(0.0, 255.0) as u8)
                    .unwrap_or(0);
                Some(Review { author, rating, text })
            })
            .collect()
    }
}

#[async_trait]
impl PageExtractor for HtmlExtractor {
    async fn extract(&self, request: &ExtractRequest) -> ExtractResult<ExtractedRecord> {
        let (html, final_url) = self.fetch_html(request).await?;
        Ok(self.parse(request.kind, &final_url, &html))
    }

    fn name(&self) -> &str {
        "html"
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trimmed text of the first match, if non-empty.
fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

fn image_src(img: ElementRef<'_>, page_url: &Url) -> Option<String> {
    let attrs = img.value();
    attrs
        .attr("src")
        .or_else(|| attrs.attr("data-src"))
        .and_then(|src| resolve(page_url, src))
}

fn resolve(page_url: &Url, href: &str) -> Option<String> {
    page_url.join(href.trim()).ok().map(String::from)
}

/// First decimal number in `text` ("4.5 out of 5" -> 4.5).
fn leading_number(text: &str) -> Option<f64> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let rest = &text[start..];
    let mut end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    // Only the first decimal point belongs to the number
    if let Some(second_dot) = rest[..end].match_indices('.').nth(1).map(|(i, _)| i) {
        end = second_dot;
    }
    rest[..end].trim_end_matches('.').parse().ok()
}
