use std::collections::BTreeSet;

use crate::sync::engine::state::{GallerySnapshot, ImageId, ImageTagLink, LinkId, TagId};
use crate::sync::engine::types::{EngineCommand, Inconsistency};
use crate::sync::protocol::wire::{FilterState, OutboundMessage, TagRef};

/// Result of one reconciliation step.
///
/// `next` is `None` when the event left the snapshot untouched.
#[derive(Debug, Default)]
pub struct Transition {
    pub next: Option<GallerySnapshot>,
    pub commands: Vec<EngineCommand>,
}

impl Transition {
    fn unchanged() -> Self {
        Self::default()
    }

    fn replaced(next: GallerySnapshot) -> Self {
        Self {
            next: Some(next),
            commands: Vec::new(),
        }
    }

    fn send_only(msg: OutboundMessage) -> Self {
        Self {
            next: None,
            commands: vec![EngineCommand::Send(msg)],
        }
    }
}

pub fn on_filter_change(prev: &GallerySnapshot, filter_id: TagId, state: FilterState) -> Transition {
    let mut filters = prev.active_filters.clone();
    let changed = match state {
        FilterState::On => filters.insert(filter_id),
        FilterState::Off => filters.remove(filter_id),
    };

    if !changed {
        log::debug!("[ENGINE] filter {} already {:?}", filter_id, state);
    }

    // The request always carries the current local set, not just this toggle.
    let request = OutboundMessage::ActiveFilters {
        active_filters: filters.as_slice().to_vec(),
    };

    let next = changed.then(|| GallerySnapshot {
        active_filters: filters,
        ..prev.clone()
    });

    Transition {
        next,
        commands: vec![EngineCommand::Send(request)],
    }
}

pub fn on_apply_filters(prev: &GallerySnapshot, results: &[ImageId]) -> Transition {
    let known: BTreeSet<ImageId> = results
        .iter()
        .copied()
        .filter(|id| {
            let found = prev.data.image(*id).is_some();
            if !found {
                log::debug!("[ENGINE] applyFilters: ignoring unknown image {}", id);
            }
            found
        })
        .collect();

    if known.is_empty() {
        log::info!("[ENGINE] applyFilters: no matching photos");
    }

    if prev.filter_results.as_ref() == Some(&known) {
        return Transition::unchanged();
    }

    Transition::replaced(GallerySnapshot {
        filter_results: Some(known),
        ..prev.clone()
    })
}

pub fn on_tag_added(
    prev: &GallerySnapshot,
    link_id: LinkId,
    image_id: ImageId,
    tag_id: TagId,
) -> Result<Transition, Inconsistency> {
    let pos = prev
        .data
        .images
        .iter()
        .position(|img| img.id == image_id)
        .ok_or(Inconsistency::UnknownImage {
            event: "tagAdded",
            image_id,
        })?;

    if prev.data.tag(tag_id).is_none() {
        return Err(Inconsistency::UnknownTag {
            event: "tagAdded",
            tag_id,
        });
    }

    if prev.data.link(link_id).is_some() {
        return Err(Inconsistency::DuplicateLink { link_id });
    }

    let mut next = prev.clone();
    next.data.images[pos].tags.push(tag_id);
    next.data.links.push(ImageTagLink {
        id: link_id,
        image_id,
        tag_id,
    });

    Ok(Transition::replaced(next))
}

pub fn on_tag_removed(
    prev: &GallerySnapshot,
    link_id: LinkId,
    image_id: ImageId,
    tag_id: TagId,
) -> Result<Transition, Inconsistency> {
    let Some(link) = prev.data.link(link_id) else {
        log::debug!("[ENGINE] tagRemoved: link {} already gone", link_id);
        return Ok(Transition::unchanged());
    };

    if link.image_id != image_id || link.tag_id != tag_id {
        return Err(Inconsistency::LinkMismatch {
            link_id,
            image_id,
            tag_id,
            found_image: link.image_id,
            found_tag: link.tag_id,
        });
    }

    let pos = prev
        .data
        .images
        .iter()
        .position(|img| img.id == image_id)
        .ok_or(Inconsistency::UnknownImage {
            event: "tagRemoved",
            image_id,
        })?;

    let mut next = prev.clone();
    let tags = &mut next.data.images[pos].tags;
    if let Some(tag_pos) = tags.iter().position(|t| *t == tag_id) {
        tags.remove(tag_pos);
    }
    next.data.links.retain(|l| l.id != link_id);

    Ok(Transition::replaced(next))
}

pub fn on_image_deleted(prev: &GallerySnapshot, image_id: ImageId) -> Result<Transition, Inconsistency> {
    if prev.data.image(image_id).is_none() {
        return Err(Inconsistency::UnknownImage {
            event: "imageDeleted",
            image_id,
        });
    }

    let mut next = prev.clone();
    next.data.images.retain(|img| img.id != image_id);

    // cascade
    let before = next.data.links.len();
    next.data.links.retain(|l| l.image_id != image_id);
    log::debug!(
        "[ENGINE] imageDeleted {}: dropped {} links",
        image_id,
        before - next.data.links.len()
    );

    if let Some(results) = next.filter_results.as_mut() {
        results.remove(&image_id);
    }

    Ok(Transition::replaced(next))
}

// ================================
// Local intents (send, do not assume)
// ================================

pub fn on_edit_description(image_id: ImageId, description: String) -> Transition {
    Transition::send_only(OutboundMessage::UpdateDescription {
        image_id,
        description,
    })
}

pub fn on_delete_image(image_id: ImageId) -> Transition {
    Transition::send_only(OutboundMessage::DeleteImage { image_id })
}

pub fn on_update_tags(image_id: ImageId, tag_ids: &[TagId]) -> Transition {
    let mut seen = BTreeSet::new();
    let tag_array = tag_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .map(|id| TagRef { id })
        .collect();

    Transition::send_only(OutboundMessage::UpdateTags {
        image_id,
        tag_array,
    })
}

pub fn on_announce_filter_change(filter_name: String, filter_id: TagId) -> Transition {
    Transition::send_only(OutboundMessage::FilterChange {
        filter_name,
        filter_id,
    })
}
