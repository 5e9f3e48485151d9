//! Page extractor implementations.

pub mod html;

pub use html::HtmlExtractor;
