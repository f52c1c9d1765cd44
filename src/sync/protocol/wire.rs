//! Wire shapes shared by the decoder and the intent emitter.
//!
//! Ids arrive either as JSON numbers or as numeric strings (`"12"`), so every
//! id field goes through [`de_id`] / [`de_ids`]. Outbound ids are always
//! numbers.

use serde::{Deserialize, Deserializer, Serialize};

use crate::sync::engine::state::{ImageId, TagId};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_id<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            RawId::Number(n) => Ok(n),
            RawId::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| E::custom(format!("invalid id {:?}", s))),
        }
    }
}

pub fn de_id<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer)?.into_id()
}

pub fn de_ids<'de, D>(deserializer: D) -> Result<Vec<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<RawId>::deserialize(deserializer)?
        .into_iter()
        .map(RawId::into_id)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterState {
    On,
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRef {
    pub id: TagId,
}

/// Frames the client sends to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    /// Legacy "checkbox toggled" notice. Same `type` as the inbound kind but a
    /// different field set.
    #[serde(rename = "filterChange", rename_all = "camelCase")]
    FilterChange { filter_name: String, filter_id: TagId },

    #[serde(rename = "activeFilters", rename_all = "camelCase")]
    ActiveFilters { active_filters: Vec<TagId> },

    #[serde(rename = "updateDescription", rename_all = "camelCase")]
    UpdateDescription { image_id: ImageId, description: String },

    #[serde(rename = "deleteImage", rename_all = "camelCase")]
    DeleteImage { image_id: ImageId },

    #[serde(rename = "updateTags", rename_all = "camelCase")]
    UpdateTags { image_id: ImageId, tag_array: Vec<TagRef> },
}

impl OutboundMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::FilterChange { .. } => "filterChange",
            OutboundMessage::ActiveFilters { .. } => "activeFilters",
            OutboundMessage::UpdateDescription { .. } => "updateDescription",
            OutboundMessage::DeleteImage { .. } => "deleteImage",
            OutboundMessage::UpdateTags { .. } => "updateTags",
        }
    }

    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
