//! CSV and JSON exports of crawled records.

use crate::error::ScrapeResult;
use crate::models::{ItemRecord, MonsterRecord};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// A record that can be flattened into one CSV row.
pub trait CsvRow {
    fn headers() -> &'static [&'static str];

    /// `name_delimiter` joins multi-valued cells such as alternate names.
    fn cells(&self, name_delimiter: &str) -> Vec<String>;
}

impl CsvRow for MonsterRecord {
    fn headers() -> &'static [&'static str] {
        &["id", "names", "image_url", "image_path", "silhouette_path"]
    }

    fn cells(&self, name_delimiter: &str) -> Vec<String> {
        vec![
            self.id.clone(),
            self.names.join(name_delimiter),
            self.image_url.clone(),
            self.image_path.clone().unwrap_or_default(),
            self.silhouette_path.clone().unwrap_or_default(),
        ]
    }
}

impl CsvRow for ItemRecord {
    fn headers() -> &'static [&'static str] {
        &[
            "item_name",
            "item_category",
            "item_id",
            "large_img_url",
            "prefix_suffix",
            "description",
            "image_path",
        ]
    }

    fn cells(&self, _name_delimiter: &str) -> Vec<String> {
        vec![
            self.item_name.clone(),
            self.item_category.clone(),
            self.item_id.clone(),
            self.large_img_url.clone().unwrap_or_default(),
            self.prefix_suffix.clone().unwrap_or_default(),
            self.description.clone(),
            self.image_path.clone().unwrap_or_default(),
        ]
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

pub fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

/// Header row followed by one row per record.
pub fn write_rows<W: Write, R: CsvRow>(mut w: W, records: &[R], name_delimiter: &str) -> io::Result<()> {
    let headers: Vec<String> = R::headers().iter().map(|h| h.to_string()).collect();
    write_row(&mut w, &headers)?;
    for record in records {
        write_row(&mut w, &record.cells(name_delimiter))?;
    }
    w.flush()
}

fn create(path: &Path) -> ScrapeResult<BufWriter<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}

pub fn write_csv<R: CsvRow>(path: &Path, records: &[R], name_delimiter: &str) -> ScrapeResult<()> {
    write_rows(create(path)?, records, name_delimiter)?;
    log::info!("Saved {} rows to {}", records.len(), path.display());
    Ok(())
}

pub fn write_json<R: Serialize>(path: &Path, records: &[R]) -> ScrapeResult<()> {
    let mut w = create(path)?;
    serde_json::to_writer_pretty(&mut w, records).map_err(io::Error::from)?;
    w.flush()?;
    log::info!("Saved {} records to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monster() -> MonsterRecord {
        MonsterRecord {
            id: "1002".into(),
            names: vec!["Poring".into(), "Poring Jr.".into()],
            image_url: "https://file5s.ratemyserver.net/mobs/1002.gif".into(),
            image_path: Some("monster_gifs/1002.gif".into()),
            silhouette_path: None,
        }
    }

    #[test]
    fn test_monster_rows() {
        let mut out = Vec::new();
        write_rows(&mut out, &[monster()], " / ").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "id,names,image_url,image_path,silhouette_path\n\
             1002,Poring / Poring Jr.,https://file5s.ratemyserver.net/mobs/1002.gif,monster_gifs/1002.gif,\n"
        );
    }

    #[test]
    fn test_quotes_multiline_description() {
        let item = ItemRecord {
            item_name: "Poring Card".into(),
            item_category: "Card".into(),
            item_id: "4001".into(),
            large_img_url: None,
            prefix_suffix: Some("of Luck".into()),
            description: "LUK + 2\nSays \"hi\", twice".into(),
            image_path: None,
        };
        let mut out = Vec::new();
        write_rows(&mut out, &[item], " / ").unwrap();
        let text = String::from_utf8(out).unwrap();
        let body = text.lines().skip(1).collect::<Vec<_>>().join("\n");
        assert_eq!(body, "Poring Card,Card,4001,,of Luck,\"LUK + 2\nSays \"\"hi\"\", twice\",");
    }

    #[test]
    fn test_write_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("monsters.json");
        write_json(&path, &[monster()]).unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["id"], "1002");
        assert_eq!(value[0]["names"][1], "Poring Jr.");
        assert!(value[0]["silhouette_path"].is_null());
    }

    #[test]
    fn test_write_csv_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("monsters.csv");
        write_csv(&path, &[monster()], ";").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("1002,Poring;Poring Jr.,"));
    }
}
