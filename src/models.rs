use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A monster as listed on one grid block, before its artifacts exist locally
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MonsterEntry {
    pub id: String,
    pub names: Vec<String>,
    pub image_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MonsterRecord {
    pub id: String,
    pub names: Vec<String>,
    pub image_url: String,
    /// `None` when the image could not be downloaded
    pub image_path: Option<String>,
    /// `None` when no silhouette could be derived
    pub silhouette_path: Option<String>,
}

/// An item card parsed from one result table, before its artifact exists locally
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ItemEntry {
    pub item_name: String,
    pub item_category: String,
    pub item_id: String,
    pub large_img_url: Option<String>,
    /// Only cards that grant a name prefix or suffix carry this; `None` means not applicable
    pub prefix_suffix: Option<String>,
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub item_name: String,
    pub item_category: String,
    pub item_id: String,
    pub large_img_url: Option<String>,
    pub prefix_suffix: Option<String>,
    pub description: String,
    pub image_path: Option<String>,
}

/// Deterministic on-disk locations for a record's artifacts
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    output_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    pub fn image_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.gif", id))
    }

    pub fn silhouette_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{}_silhouette.gif", id))
    }
}

/// What the driver should materialize for one extracted entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    pub image_url: Option<String>,
    pub image_path: PathBuf,
    pub silhouette_path: Option<PathBuf>,
}

/// Local paths that actually exist after the artifact steps ran
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub image: Option<PathBuf>,
    pub silhouette: Option<PathBuf>,
}

pub(crate) fn path_string(path: Option<PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().to_string())
}
