//! Event Decoder.
//!
//! Turns one raw text frame into an [`InboundEvent`]. Frames are classified by
//! their `type` field first, then the payload for that kind is validated.
//! Unrecognized kinds decode successfully as `Unknown` so the caller can log
//! them; malformed frames are a [`DecodeError`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::sync::engine::state::{ImageId, LinkId, TagId};
use crate::sync::engine::types::InboundEvent;
use crate::sync::protocol::wire::{de_id, de_ids, FilterState};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no string `type` field")]
    MissingType,

    #[error("malformed {kind} frame: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterChangeFrame {
    filter_state: FilterState,
    #[serde(deserialize_with = "de_id")]
    filter_id: TagId,
}

#[derive(Deserialize)]
struct ApplyFiltersFrame {
    #[serde(deserialize_with = "de_ids")]
    results: Vec<ImageId>,
}

/// Shared by `tagAdded` and `tagRemoved`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagLinkFrame {
    #[serde(deserialize_with = "de_id")]
    id: LinkId,
    #[serde(deserialize_with = "de_id")]
    image_id: ImageId,
    #[serde(deserialize_with = "de_id")]
    tag_id: TagId,
}

#[derive(Deserialize)]
struct ImageDeletedFrame {
    #[serde(deserialize_with = "de_id")]
    id: ImageId,
}

#[derive(Deserialize)]
struct NoticeFrame {
    message: String,
}

pub fn decode_frame(frame: &str) -> Result<InboundEvent, DecodeError> {
    let value: Value = serde_json::from_str(frame).map_err(DecodeError::InvalidJson)?;

    let kind = value
        .as_object()
        .ok_or(DecodeError::NotAnObject)?
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?
        .to_string();

    let event = match kind.as_str() {
        "filterChange" => {
            let f: FilterChangeFrame = payload(&kind, value)?;
            InboundEvent::FilterChange {
                filter_id: f.filter_id,
                state: f.filter_state,
            }
        }
        "applyFilters" => {
            let f: ApplyFiltersFrame = payload(&kind, value)?;
            InboundEvent::ApplyFilters { results: f.results }
        }
        "tagAdded" => {
            let f: TagLinkFrame = payload(&kind, value)?;
            InboundEvent::TagAdded {
                link_id: f.id,
                image_id: f.image_id,
                tag_id: f.tag_id,
            }
        }
        "tagRemoved" => {
            let f: TagLinkFrame = payload(&kind, value)?;
            InboundEvent::TagRemoved {
                link_id: f.id,
                image_id: f.image_id,
                tag_id: f.tag_id,
            }
        }
        "imageDeleted" => {
            let f: ImageDeletedFrame = payload(&kind, value)?;
            InboundEvent::ImageDeleted { image_id: f.id }
        }
        "message" => {
            let f: NoticeFrame = payload(&kind, value)?;
            InboundEvent::Notice { message: f.message }
        }
        _ => InboundEvent::Unknown { kind },
    };

    Ok(event)
}

fn payload<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Malformed {
        kind: kind.to_string(),
        source,
    })
}
