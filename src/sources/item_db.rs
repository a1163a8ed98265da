use super::{selector, Catalog};
use crate::error::{ScrapeError, ScrapeResult};
use crate::helpers::{element_text, is_safe_id, text_with_line_breaks};
use crate::models::{path_string, ArtifactLayout, ArtifactPaths, ArtifactPlan, ItemEntry, ItemRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static TABLE: LazyLock<Selector> = LazyLock::new(|| selector("table.content_box_m"));
static TITLE_ROW: LazyLock<Selector> = LazyLock::new(|| selector("tr.lmd"));
static TITLE_DIV: LazyLock<Selector> = LazyLock::new(|| selector(r#"div[style*="padding-left"]"#));
static IMG: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static INFO_ITEM: LazyLock<Selector> = LazyLock::new(|| selector("div.info_grid_item"));
static TH: LazyLock<Selector> = LazyLock::new(|| selector("th"));

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.+?)\s*\[(.+?)\].*Item ID#\s*(\d+)").expect("valid title regex")
});
static LARGE_IMG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^'"\s()]+/items/large/\d+\.gif"#).expect("valid image regex")
});

/// Item database result tables (`page=item_db`)
pub struct ItemDb {
    layout: ArtifactLayout,
}

impl ItemDb {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }
}

/// Split a title like `Red Potion [Consumable] ... Item ID# 501` into
/// `(name, category, id)`.
pub fn parse_item_title(text: &str) -> Option<(String, String, String)> {
    let caps = TITLE_RE.captures(text.trim())?;
    Some((
        caps[1].trim().to_string(),
        caps[2].trim().to_string(),
        caps[3].to_string(),
    ))
}

/// Pull the large card image out of an `onmouseover` tooltip script.
pub fn large_image_url(onmouseover: &str) -> Option<String> {
    LARGE_IMG_RE.find(onmouseover).map(|m| m.as_str().to_string())
}

/// Extract every well-formed item table of a result page.
pub fn extract_items(document: &Html) -> Vec<ItemEntry> {
    let mut entries = Vec::new();
    for (index, table) in document.select(&TABLE).enumerate() {
        match parse_table(table) {
            Ok(Some(entry)) => {
                log::debug!(
                    "{} [{}] (ID {}) - {:?}",
                    entry.item_name,
                    entry.item_category,
                    entry.item_id,
                    entry.large_img_url
                );
                entries.push(entry);
            }
            Ok(None) => log::debug!("Skipping item table #{} without a title row", index + 1),
            Err(e) => log::warn!("Failed to parse item table #{}: {}", index + 1, e),
        }
    }
    entries
}

fn parse_table(table: ElementRef) -> ScrapeResult<Option<ItemEntry>> {
    let Some(title_row) = table.select(&TITLE_ROW).next() else {
        return Ok(None);
    };

    let large_img_url = title_row
        .select(&IMG)
        .next()
        .and_then(|img| img.value().attr("onmouseover"))
        .and_then(large_image_url);

    let title_div = title_row
        .select(&TITLE_DIV)
        .next()
        .ok_or_else(|| ScrapeError::parse("title row has no name element"))?;
    let title_text = element_text(&title_div, " ");
    let (item_name, item_category, item_id) = parse_item_title(&title_text)
        .ok_or_else(|| ScrapeError::parse(format!("unrecognized item title {:?}", title_text)))?;
    if !is_safe_id(&item_id) {
        return Err(ScrapeError::parse(format!("unusable item ID {:?}", item_id)));
    }

    let prefix_suffix = next_row(title_row).and_then(|row| info_grid_value(row, "pre/suffix"));
    let description = description(table).unwrap_or_default();

    Ok(Some(ItemEntry {
        item_name,
        item_category,
        item_id,
        large_img_url,
        prefix_suffix,
        description,
    }))
}

fn next_row(row: ElementRef) -> Option<ElementRef> {
    row.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr")
}

/// The info grid alternates label and value cells; a trailing label without a value is ignored.
fn info_grid_value(row: ElementRef, label: &str) -> Option<String> {
    let cells: Vec<ElementRef> = row.select(&INFO_ITEM).collect();
    cells.chunks_exact(2).find_map(|pair| {
        let key = element_text(&pair[0], "");
        key.eq_ignore_ascii_case(label).then(|| element_text(&pair[1], ""))
    })
}

fn description(table: ElementRef) -> Option<String> {
    let th = table
        .select(&TH)
        .find(|th| element_text(th, "") == "Description")?;
    let td = th
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "td")?;
    Some(text_with_line_breaks(&td))
}

impl Catalog for ItemDb {
    type Entry = ItemEntry;
    type Record = ItemRecord;

    fn name(&self) -> &'static str {
        "items"
    }

    fn extract(&self, document: &Html, _page_url: &str) -> Vec<ItemEntry> {
        extract_items(document)
    }

    fn plan(&self, entry: &ItemEntry) -> ArtifactPlan {
        ArtifactPlan {
            image_url: entry.large_img_url.clone(),
            image_path: self.layout.image_path(&entry.item_id),
            silhouette_path: None,
        }
    }

    fn finish(&self, entry: ItemEntry, paths: ArtifactPaths) -> ItemRecord {
        ItemRecord {
            item_name: entry.item_name,
            item_category: entry.item_category,
            item_id: entry.item_id,
            large_img_url: entry.large_img_url,
            prefix_suffix: entry.prefix_suffix,
            description: entry.description,
            image_path: path_string(paths.image),
        }
    }
}
