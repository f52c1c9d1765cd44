use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::sync::engine::{AppData, Image, ImageTagLink, Tag};

/// First-load document: the three collections the REST API lists.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedDocument {
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default, alias = "links")]
    image_tags: Vec<ImageTagLink>,
}

pub fn parse_snapshot(raw: &str) -> Result<AppData> {
    let doc: SeedDocument = serde_json::from_str(raw).context("invalid seed document")?;
    let data = AppData::new(doc.images, doc.tags, doc.image_tags);

    // The backend is authoritative, so problems are reported but not fatal.
    for problem in data.check_consistency() {
        log::warn!("[SEED] {}", problem);
    }

    log::info!(
        "[SEED] loaded {} images, {} tags, {} links",
        data.images.len(),
        data.tags.len(),
        data.links.len()
    );

    Ok(data)
}

pub fn load_snapshot(path: impl AsRef<Path>) -> Result<AppData> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    parse_snapshot(&raw).with_context(|| format!("failed to load {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SEED: &str = r#"{
        "images": [
            {"id": 1, "source": "media/a.jpg", "description": "dog", "tags": [5]},
            {"id": "2", "source": "media/b.jpg"}
        ],
        "tags": [{"id": 5, "name": "Pets"}],
        "imageTags": [{"id": 9, "image_id": 1, "tag_id": "5"}]
    }"#;

    #[test]
    fn parses_api_collections() {
        let data = parse_snapshot(SEED).unwrap();

        assert_eq!(data.images.len(), 2);
        assert_eq!(data.image(2).unwrap().description, "");
        assert!(data.image(2).unwrap().tags.is_empty());
        assert_eq!(data.tag(5).unwrap().name, "Pets");
        assert_eq!(
            data.links,
            vec![ImageTagLink {
                id: 9,
                image_id: 1,
                tag_id: 5
            }]
        );
        assert!(data.check_consistency().is_empty());
    }

    #[test]
    fn inconsistent_seed_is_still_accepted() {
        let data = parse_snapshot(r#"{"images": [{"id": 1, "tags": [3]}]}"#).unwrap();
        assert_eq!(data.check_consistency().len(), 1);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();

        let data = load_snapshot(file.path()).unwrap();
        assert_eq!(data.images.len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_snapshot(dir.path().join("nope.json")).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read seed file"));
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_snapshot("42").is_err());
        assert!(parse_snapshot("{\"images\": 3}").is_err());
    }
}
