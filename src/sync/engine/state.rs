use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::sync::protocol::wire::{de_id, de_ids};

pub type ImageId = u64;
pub type TagId = u64;
pub type LinkId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(deserialize_with = "de_id")]
    pub id: ImageId,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub description: String,
    /// Denormalized copy of this image's links, in link-creation order.
    #[serde(default, deserialize_with = "de_ids")]
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(deserialize_with = "de_id")]
    pub id: TagId,
    pub name: String,
}

/// One image <-> tag association row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTagLink {
    #[serde(deserialize_with = "de_id")]
    pub id: LinkId,
    #[serde(deserialize_with = "de_id")]
    pub image_id: ImageId,
    #[serde(deserialize_with = "de_id")]
    pub tag_id: TagId,
}

/// The authoritative local mirror: images, tags and their links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppData {
    pub images: Vec<Image>,
    pub tags: Vec<Tag>,
    pub links: Vec<ImageTagLink>,
}

impl AppData {
    pub fn new(images: Vec<Image>, tags: Vec<Tag>, links: Vec<ImageTagLink>) -> Self {
        Self { images, tags, links }
    }

    pub fn image(&self, id: ImageId) -> Option<&Image> {
        self.images.iter().find(|img| img.id == id)
    }

    pub fn tag(&self, id: TagId) -> Option<&Tag> {
        self.tags.iter().find(|tag| tag.id == id)
    }

    pub fn link(&self, id: LinkId) -> Option<&ImageTagLink> {
        self.links.iter().find(|link| link.id == id)
    }

    pub fn links_for_image(&self, image_id: ImageId) -> impl Iterator<Item = &ImageTagLink> {
        self.links.iter().filter(move |link| link.image_id == image_id)
    }

    /// Checks that `Image.tags` and the link collection describe the same
    /// relation, and that every link points at an existing image and tag.
    ///
    /// Returns one human readable line per violation.
    pub fn check_consistency(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for link in &self.links {
            if self.image(link.image_id).is_none() {
                problems.push(format!(
                    "link {} references missing image {}",
                    link.id, link.image_id
                ));
            }
            if self.tag(link.tag_id).is_none() {
                problems.push(format!(
                    "link {} references missing tag {}",
                    link.id, link.tag_id
                ));
            }
        }

        for image in &self.images {
            // Compare as multisets: duplicate links pair with duplicate tag entries.
            let mut from_links: Vec<TagId> =
                self.links_for_image(image.id).map(|l| l.tag_id).collect();
            let mut from_image = image.tags.clone();
            from_links.sort_unstable();
            from_image.sort_unstable();

            if from_links != from_image {
                problems.push(format!(
                    "image {} tags {:?} disagree with links {:?}",
                    image.id, from_image, from_links
                ));
            }
        }

        problems
    }
}

/// Tag ids the user has toggled on, in toggle order. No duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveFilterSet {
    ids: Vec<TagId>,
}

impl ActiveFilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: TagId) -> bool {
        self.ids.contains(&id)
    }

    /// Appends `id` unless already present. Returns whether the set changed.
    pub fn insert(&mut self, id: TagId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Removes the first occurrence of `id`. Returns whether the set changed.
    pub fn remove(&mut self, id: TagId) -> bool {
        match self.ids.iter().position(|f| *f == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[TagId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<TagId> for ActiveFilterSet {
    fn from_iter<I: IntoIterator<Item = TagId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// Immutable state handed out to renderers.
///
/// A new value is built for every applied transition; the engine swaps an
/// `Arc` so readers holding an older snapshot keep a stable view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GallerySnapshot {
    pub data: AppData,
    pub active_filters: ActiveFilterSet,
    /// Last `applyFilters` result. `None` until the backend has sent one.
    pub filter_results: Option<BTreeSet<ImageId>>,
    pub revision: u64,
}

impl GallerySnapshot {
    pub fn seeded(data: AppData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Images to display, in full-collection order.
    pub fn rendered_images(&self) -> Vec<&Image> {
        match &self.filter_results {
            None => self.data.images.iter().collect(),
            Some(results) => self
                .data
                .images
                .iter()
                .filter(|img| results.contains(&img.id))
                .collect(),
        }
    }

    pub fn rendered_ids(&self) -> Vec<ImageId> {
        self.rendered_images().iter().map(|img| img.id).collect()
    }

    pub fn check_consistency(&self) -> Vec<String> {
        self.data.check_consistency()
    }
}

/// State Store: owns the current snapshot.
#[derive(Debug)]
pub struct EngineState {
    pub current: Arc<GallerySnapshot>,
    pub applied: u64,
    pub skipped: u64,
}

impl EngineState {
    pub fn new(initial: GallerySnapshot) -> Self {
        Self {
            current: Arc::new(initial),
            applied: 0,
            skipped: 0,
        }
    }

    /// Replaces the snapshot, stamping the next revision.
    pub fn replace(&mut self, mut next: GallerySnapshot) {
        next.revision = self.current.revision + 1;
        self.current = Arc::new(next);
        self.applied += 1;
    }
}
