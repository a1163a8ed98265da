//! Page extractors, one per listing on ratemyserver.net.
//!
//! All knowledge of the site's markup (CSS classes, table layout) lives in these
//! modules; the driver only sees entries and artifact plans.

use crate::models::{ArtifactPaths, ArtifactPlan};
use scraper::{Html, Selector};
use serde::Serialize;

pub mod item_db;
pub mod mob_db;

pub use item_db::ItemDb;
pub use mob_db::MobDb;

/// A listing whose pages yield entries with downloadable artifacts
pub trait Catalog: Sync {
    /// Fragment extracted from markup, without local paths
    type Entry: Send;
    /// Final record handed to the exporters
    type Record: Serialize + Send;

    fn name(&self) -> &'static str;

    /// Extract entries in document order. Malformed blocks are skipped, never fatal.
    fn extract(&self, document: &Html, page_url: &str) -> Vec<Self::Entry>;

    fn plan(&self, entry: &Self::Entry) -> ArtifactPlan;

    fn finish(&self, entry: Self::Entry, paths: ArtifactPaths) -> Self::Record;

    fn extract_html(&self, html: &str, page_url: &str) -> Vec<Self::Entry> {
        let document = Html::parse_document(html);
        self.extract(&document, page_url)
    }
}

pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {:?}: {:?}", css, e))
}
