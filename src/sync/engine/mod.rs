//! Gallery reconciliation engine.
//!
//! This module implements the **Functional Core** of the gallery mirror.
//! It acts as a pure state machine:
//! - **Input**: `EngineEvent` (decoded inbound frames and local user intents).
//! - **Output**: `Vec<EngineCommand>` (side effects to be executed by the driver).
//!
//! # Architecture guarantees
//! * **No Network**: This module never touches the transport.
//! * **No Async**: Every transition is a single synchronous step.
//! * **Deterministic**: Given the same seed and sequence of events, the snapshots and commands are always identical.
//! * **Atomic**: A transition either produces a whole new snapshot or leaves the previous one in place.

pub mod state;
pub mod logic;
pub mod types;


// Re-export core types for easy access
pub use crate::sync::engine::types::{EngineCommand, EngineEvent, InboundEvent, Inconsistency, LocalIntent};
pub use crate::sync::engine::state::{
    ActiveFilterSet, AppData, GallerySnapshot, Image, ImageId, ImageTagLink, LinkId, Tag, TagId,
};

use std::sync::Arc;

use logic::Transition;
use state::EngineState;

/// Owns the State Store and applies transitions one at a time.
#[derive(Debug)]
pub struct SyncEngine {
    state: EngineState,
}

impl SyncEngine {
    /// Creates an engine seeded with the first-load data.
    pub fn new(seed: AppData) -> Self {
        Self::from_snapshot(GallerySnapshot::seeded(seed))
    }

    pub fn from_snapshot(snapshot: GallerySnapshot) -> Self {
        Self {
            state: EngineState::new(snapshot),
        }
    }

    /// The main event handler.
    ///
    /// Consumes an event and returns the commands the driver must execute.
    /// Inconsistent events are skipped and reported as `ReportDrift`.
    pub fn handle_event(&mut self, event: EngineEvent) -> Vec<EngineCommand> {
        let prev = Arc::clone(&self.state.current);

        let outcome = match event {
            EngineEvent::Inbound(inbound) => Self::reconcile(&prev, inbound),
            EngineEvent::Local(intent) => Ok(Self::intent(&prev, intent)),
        };

        match outcome {
            Ok(Transition { next, commands }) => {
                if let Some(next) = next {
                    self.state.replace(next);
                    log::trace!("[ENGINE] snapshot revision {}", self.state.current.revision);
                }
                commands
            }
            Err(drift) => {
                self.state.skipped += 1;
                vec![EngineCommand::ReportDrift(drift)]
            }
        }
    }

    fn reconcile(prev: &GallerySnapshot, event: InboundEvent) -> Result<Transition, Inconsistency> {
        log::debug!("[ENGINE] inbound {}", event.kind());

        match event {
            InboundEvent::FilterChange { filter_id, state } => {
                Ok(logic::on_filter_change(prev, filter_id, state))
            }
            InboundEvent::ApplyFilters { results } => Ok(logic::on_apply_filters(prev, &results)),
            InboundEvent::TagAdded {
                link_id,
                image_id,
                tag_id,
            } => logic::on_tag_added(prev, link_id, image_id, tag_id),
            InboundEvent::TagRemoved {
                link_id,
                image_id,
                tag_id,
            } => logic::on_tag_removed(prev, link_id, image_id, tag_id),
            InboundEvent::ImageDeleted { image_id } => logic::on_image_deleted(prev, image_id),
            InboundEvent::Notice { message } => {
                log::info!("[ENGINE] backend says: {}", message);
                Ok(Transition::default())
            }
            InboundEvent::Unknown { kind } => {
                log::warn!("[ENGINE] unexpected message type {:?} dropped", kind);
                Ok(Transition::default())
            }
        }
    }

    fn intent(prev: &GallerySnapshot, intent: LocalIntent) -> Transition {
        log::debug!("[ENGINE] local {:?}", intent);

        match intent {
            // Same merge rule as the inbound kind.
            LocalIntent::ToggleFilter { filter_id, state } => {
                logic::on_filter_change(prev, filter_id, state)
            }
            LocalIntent::EditDescription {
                image_id,
                description,
            } => logic::on_edit_description(image_id, description),
            LocalIntent::DeleteImage { image_id } => logic::on_delete_image(image_id),
            LocalIntent::UpdateTags { image_id, tag_ids } => {
                logic::on_update_tags(image_id, &tag_ids)
            }
            LocalIntent::AnnounceFilterChange {
                filter_name,
                filter_id,
            } => logic::on_announce_filter_change(filter_name, filter_id),
        }
    }

    /// Current snapshot. Cheap to clone and never mutated after hand-out.
    pub fn snapshot(&self) -> Arc<GallerySnapshot> {
        Arc::clone(&self.state.current)
    }

    pub fn revision(&self) -> u64 {
        self.state.current.revision
    }

    /// Number of events that produced a new snapshot.
    pub fn applied_count(&self) -> u64 {
        self.state.applied
    }

    /// Number of events skipped as inconsistent.
    pub fn skipped_count(&self) -> u64 {
        self.state.skipped
    }
}
