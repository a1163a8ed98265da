use super::{selector, Catalog};
use crate::error::{ScrapeError, ScrapeResult};
use crate::helpers::{parse_monster_label, resolve_url};
use crate::models::{path_string, ArtifactLayout, ArtifactPaths, ArtifactPlan, MonsterEntry, MonsterRecord};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static BLOCK: LazyLock<Selector> = LazyLock::new(|| selector("div.mob_grid_container"));
static LABEL: LazyLock<Selector> = LazyLock::new(|| selector(".mob_stat_head span"));
static IMAGE: LazyLock<Selector> = LazyLock::new(|| selector("img.mob_img"));

/// Monster database grid (`page=mob_db`)
pub struct MobDb {
    layout: ArtifactLayout,
    name_delimiter: String,
}

impl MobDb {
    pub fn new(layout: ArtifactLayout, name_delimiter: impl Into<String>) -> Self {
        Self {
            layout,
            name_delimiter: name_delimiter.into(),
        }
    }
}

/// Extract every well-formed monster block of a listing page.
pub fn extract_monsters(document: &Html, page_url: &str, delimiter: &str) -> Vec<MonsterEntry> {
    let mut entries = Vec::new();
    for (index, block) in document.select(&BLOCK).enumerate() {
        match parse_block(block, page_url, delimiter) {
            Ok(Some(entry)) => {
                log::debug!("{} (ID {}) - {}", entry.names.join(", "), entry.id, entry.image_url);
                entries.push(entry);
            }
            Ok(None) => log::debug!("Skipping incomplete monster block #{}", index + 1),
            Err(e) => log::warn!("Failed to parse monster block #{}: {}", index + 1, e),
        }
    }
    entries
}

/// `Ok(None)` when the label or image element is missing.
fn parse_block(block: ElementRef, page_url: &str, delimiter: &str) -> ScrapeResult<Option<MonsterEntry>> {
    let (Some(label), Some(image)) = (block.select(&LABEL).next(), block.select(&IMAGE).next()) else {
        return Ok(None);
    };

    let src = image
        .value()
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ScrapeError::parse("monster image has no src"))?;

    let raw = label.text().collect::<String>();
    let parsed = parse_monster_label(&raw, delimiter)?;

    Ok(Some(MonsterEntry {
        id: parsed.id,
        names: parsed.names,
        image_url: resolve_url(page_url, src),
    }))
}

impl Catalog for MobDb {
    type Entry = MonsterEntry;
    type Record = MonsterRecord;

    fn name(&self) -> &'static str {
        "monsters"
    }

    fn extract(&self, document: &Html, page_url: &str) -> Vec<MonsterEntry> {
        extract_monsters(document, page_url, &self.name_delimiter)
    }

    fn plan(&self, entry: &MonsterEntry) -> ArtifactPlan {
        ArtifactPlan {
            image_url: Some(entry.image_url.clone()),
            image_path: self.layout.image_path(&entry.id),
            silhouette_path: Some(self.layout.silhouette_path(&entry.id)),
        }
    }

    fn finish(&self, entry: MonsterEntry, paths: ArtifactPaths) -> MonsterRecord {
        MonsterRecord {
            id: entry.id,
            names: entry.names,
            image_url: entry.image_url,
            image_path: path_string(paths.image),
            silhouette_path: path_string(paths.silhouette),
        }
    }
}
