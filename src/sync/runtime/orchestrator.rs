use crate::sync::engine::{
    EngineCommand, EngineEvent, GallerySnapshot, ImageId, Inconsistency, LocalIntent, SyncEngine,
    TagId,
};
use crate::sync::protocol::api::{GalleryTransport, TransportError};
use crate::sync::protocol::decode::decode_frame;
use crate::sync::protocol::wire::FilterState;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

type ChangeNotifier = Box<dyn FnMut(&Arc<GallerySnapshot>) + Send>;
type DriftNotifier = Box<dyn FnMut(&Inconsistency) + Send>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator already started")]
    AlreadyStarted,

    #[error("orchestrator has been shut down")]
    ShutDown,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Counters for what the driver has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub frames_handled: u64,
    pub decode_errors: u64,
    pub drift_reports: u64,
    pub send_failures: u64,
}

/// **SyncOrchestrator**
///
/// This component acts as the **Imperative Shell** around the engine.
/// It has three main responsibilities:
/// 1. **Own the listener** on the injected transport: subscribe on `start`,
///    unsubscribe on `shutdown` (or drop).
/// 2. **Drive the Logic Core** (SyncEngine) by feeding it decoded frames and
///    local intents, strictly one at a time.
/// 3. **Execute Side Effects** (Commands) emitted by the engine: outbound
///    frames and drift reports.
///
/// It runs on a single thread and never blocks on the network.
pub struct SyncOrchestrator<C: GalleryTransport> {
    /// The functional core that makes decisions.
    engine: SyncEngine,

    /// The Connection Transport.
    transport: C,

    /// Called with the new snapshot after every applied transition.
    on_change: Option<ChangeNotifier>,

    /// Called for every skipped inconsistent event.
    on_drift: Option<DriftNotifier>,

    started: bool,
    shut_down: bool,
    stats: DriverStats,

    /// Start time for logging relative timestamps.
    t0: Instant,
}

impl<C: GalleryTransport> SyncOrchestrator<C> {
    pub fn new(engine: SyncEngine, transport: C) -> Self {
        Self {
            engine,
            transport,
            on_change: None,
            on_drift: None,
            started: false,
            shut_down: false,
            stats: DriverStats::default(),
            t0: Instant::now(),
        }
    }

    /// Register a callback to be called whenever the snapshot is replaced.
    pub fn with_change_notifier<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Arc<GallerySnapshot>) + Send + 'static,
    {
        self.on_change = Some(Box::new(f));
        self
    }

    /// Register a callback to be called whenever an event is skipped as drift.
    pub fn with_drift_notifier<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Inconsistency) + Send + 'static,
    {
        self.on_drift = Some(Box::new(f));
        self
    }

    fn t(&self) -> u128 {
        self.t0.elapsed().as_micros()
    }

    // ================================
    // Lifecycle
    // ================================

    /// Attaches the single inbound listener.
    pub fn start(&mut self) -> Result<(), OrchestratorError> {
        if self.shut_down {
            return Err(OrchestratorError::ShutDown);
        }
        if self.started {
            return Err(OrchestratorError::AlreadyStarted);
        }
        self.transport.subscribe()?;
        self.started = true;
        self.info("listener attached");
        Ok(())
    }

    /// Detaches the listener. Nothing reaches the engine afterwards.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        if self.started {
            self.transport.unsubscribe();
            self.info("listener detached");
        }
        self.shut_down = true;
    }

    pub fn is_running(&self) -> bool {
        self.started && !self.shut_down
    }

    // ================================
    // Inbound
    // ================================

    /// Drains every frame currently queued on the transport, in delivery
    /// order. Returns how many frames were handled.
    pub fn pump(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }

        let mut handled = 0;
        while let Some(frame) = self.transport.poll_frame() {
            self.handle_frame(&frame);
            handled += 1;
        }
        handled
    }

    /// The main blocking loop for live use.
    ///
    /// Pumps frames until the transport reports it is closed, sleeping for
    /// `idle` whenever nothing was queued.
    pub fn run_until_closed(&mut self, idle: Duration) {
        self.info("entering event loop");
        while self.is_running() {
            let handled = self.pump();
            if self.transport.is_closed() {
                self.info("transport closed");
                break;
            }
            if handled == 0 {
                std::thread::sleep(idle);
            }
        }
    }

    /// Decodes one raw frame and feeds it to the engine.
    ///
    /// Decode failures are logged and dropped.
    pub fn handle_frame(&mut self, frame: &str) {
        self.stats.frames_handled += 1;
        self.trace(&format!("frame: {}", frame.trim()));

        match decode_frame(frame) {
            Ok(event) => self.process_engine(EngineEvent::Inbound(event)),
            Err(e) => {
                self.stats.decode_errors += 1;
                log::warn!("[DECODE] dropping frame: {}", e);
            }
        }
    }

    // ================================
    // Local intents (Outbound Intent Emitter)
    // ================================

    /// Updates the active filter set and asks the backend for matching images.
    pub fn toggle_filter(&mut self, filter_id: TagId, state: FilterState) -> Result<(), OrchestratorError> {
        self.local(LocalIntent::ToggleFilter { filter_id, state })
    }

    /// Sends the new description. The local snapshot is left alone.
    pub fn edit_description(
        &mut self,
        image_id: ImageId,
        description: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        self.local(LocalIntent::EditDescription {
            image_id,
            description: description.into(),
        })
    }

    pub fn delete_image(&mut self, image_id: ImageId) -> Result<(), OrchestratorError> {
        self.local(LocalIntent::DeleteImage { image_id })
    }

    /// Asks the backend to make `tag_ids` the image's full tag set.
    pub fn update_tags(&mut self, image_id: ImageId, tag_ids: &[TagId]) -> Result<(), OrchestratorError> {
        self.local(LocalIntent::UpdateTags {
            image_id,
            tag_ids: tag_ids.to_vec(),
        })
    }

    pub fn announce_filter_change(
        &mut self,
        filter_name: impl Into<String>,
        filter_id: TagId,
    ) -> Result<(), OrchestratorError> {
        self.local(LocalIntent::AnnounceFilterChange {
            filter_name: filter_name.into(),
            filter_id,
        })
    }

    fn local(&mut self, intent: LocalIntent) -> Result<(), OrchestratorError> {
        if self.shut_down {
            return Err(OrchestratorError::ShutDown);
        }
        self.process_engine(EngineEvent::Local(intent));
        Ok(())
    }

    // ================================
    // Engine plumbing
    // ================================

    /// Feeds an event into the Engine and executes all resulting commands.
    fn process_engine(&mut self, event: EngineEvent) {
        let before = self.engine.revision();

        // PURE LOGIC STEP: Engine decides what to do
        let cmds = self.engine.handle_event(event);

        if self.engine.revision() != before {
            let snapshot = self.engine.snapshot();
            self.debug(&format!("snapshot -> revision {}", snapshot.revision));
            if let Some(cb) = self.on_change.as_mut() {
                cb(&snapshot);
            }
        }

        // SIDE EFFECT STEP: Driver executes the commands
        for cmd in cmds {
            self.execute_command(cmd);
        }
    }

    /// Executes a single command emitted by the engine.
    fn execute_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Send(msg) => {
                let frame = match msg.to_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::error!("[DRIVER] could not encode {}: {}", msg.kind(), e);
                        return;
                    }
                };

                self.trace(&format!("cmd: Send({})", frame));

                // Fire-and-forget: a failed send never rolls back local state.
                if let Err(e) = self.transport.send_frame(frame) {
                    self.stats.send_failures += 1;
                    log::warn!("[DRIVER] {} not sent: {}", msg.kind(), e);
                }
            }

            EngineCommand::ReportDrift(drift) => {
                self.stats.drift_reports += 1;
                log::warn!("[DRIVER] local mirror drift, event skipped: {}", drift);
                if let Some(cb) = self.on_drift.as_mut() {
                    cb(&drift);
                }
            }
        }
    }

    // ================================
    // Read surface
    // ================================

    pub fn snapshot(&self) -> Arc<GallerySnapshot> {
        self.engine.snapshot()
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    pub fn transport(&self) -> &C {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut C {
        &mut self.transport
    }

    fn info(&self, msg: &str) {
        log::info!("[DRIVER] {:>8}us: {}", self.t(), msg);
    }

    fn debug(&self, msg: &str) {
        log::debug!("[DRIVER] {:>8}us: {}", self.t(), msg);
    }

    fn trace(&self, msg: &str) {
        log::trace!("[DRIVER] {:>8}us: {}", self.t(), msg);
    }
}

impl<C: GalleryTransport> Drop for SyncOrchestrator<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
