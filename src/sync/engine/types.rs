use thiserror::Error;

use crate::sync::engine::state::{ImageId, LinkId, TagId};
use crate::sync::protocol::wire::{FilterState, OutboundMessage};

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    FilterChange {
        filter_id: TagId,
        state: FilterState,
    },
    ApplyFilters {
        results: Vec<ImageId>,
    },
    TagAdded {
        link_id: LinkId,
        image_id: ImageId,
        tag_id: TagId,
    },
    TagRemoved {
        link_id: LinkId,
        image_id: ImageId,
        tag_id: TagId,
    },
    ImageDeleted {
        image_id: ImageId,
    },
    /// Informational `message` frame from the backend.
    Notice {
        message: String,
    },
    /// Well-formed frame with a `type` we do not handle.
    Unknown {
        kind: String,
    },
}

impl InboundEvent {
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::FilterChange { .. } => "filterChange",
            InboundEvent::ApplyFilters { .. } => "applyFilters",
            InboundEvent::TagAdded { .. } => "tagAdded",
            InboundEvent::TagRemoved { .. } => "tagRemoved",
            InboundEvent::ImageDeleted { .. } => "imageDeleted",
            InboundEvent::Notice { .. } => "message",
            InboundEvent::Unknown { kind } => kind,
        }
    }
}

/// A local user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalIntent {
    ToggleFilter {
        filter_id: TagId,
        state: FilterState,
    },
    EditDescription {
        image_id: ImageId,
        description: String,
    },
    DeleteImage {
        image_id: ImageId,
    },
    UpdateTags {
        image_id: ImageId,
        tag_ids: Vec<TagId>,
    },
    AnnounceFilterChange {
        filter_name: String,
        filter_id: TagId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Inbound(InboundEvent),
    Local(LocalIntent),
}

impl From<InboundEvent> for EngineEvent {
    fn from(event: InboundEvent) -> Self {
        EngineEvent::Inbound(event)
    }
}

impl From<LocalIntent> for EngineEvent {
    fn from(intent: LocalIntent) -> Self {
        EngineEvent::Local(intent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Fire-and-forget frame for the transport.
    Send(OutboundMessage),
    /// An event did not fit the local mirror and was skipped.
    ReportDrift(Inconsistency),
}

/// The local mirror disagrees with what an event assumes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Inconsistency {
    #[error("{event}: image {image_id} is not in the local mirror")]
    UnknownImage {
        event: &'static str,
        image_id: ImageId,
    },

    #[error("{event}: tag {tag_id} is not in the local mirror")]
    UnknownTag { event: &'static str, tag_id: TagId },

    #[error("tagAdded: link {link_id} already exists")]
    DuplicateLink { link_id: LinkId },

    #[error(
        "tagRemoved: link {link_id} joins image {found_image}/tag {found_tag}, \
         event says image {image_id}/tag {tag_id}"
    )]
    LinkMismatch {
        link_id: LinkId,
        image_id: ImageId,
        tag_id: TagId,
        found_image: ImageId,
        found_tag: TagId,
    },
}
