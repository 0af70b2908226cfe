use crate::config::EngineConfig;
use crate::error::{MissionError, MissionResult};
use crate::link::{CommandOutcome, FlightMode, VehicleLink};
use crate::mission::translate;
use crate::mission::types::{MissionItem, MissionProgress};
use crate::mission::wire::{self, Target, WireItem};
use crate::timeout::{TimeoutCookie, TimeoutManager};
use mavlink::common::{self, MavMissionResult, MavMissionType};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

pub type ResultCallback = Box<dyn FnOnce(MissionResult<()>) + Send>;
pub type DownloadCallback = Box<dyn FnOnce(MissionResult<Vec<MissionItem>>) + Send>;

/// What the engine is currently busy with. At most one operation runs at a
/// time; a second request while not `Idle` is answered with `Busy`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Activity {
    #[default]
    Idle,
    Uploading,
    Downloading,
    SettingCurrent,
    SendingCommand,
}

#[derive(Debug, Default)]
struct DownloadState {
    expected_count: Option<u16>,
    next_seq: u16,
    items: Vec<WireItem>,
    retries: u8,
}

struct EngineState {
    activity: Activity,
    upload_callback: Option<ResultCallback>,
    download_callback: Option<DownloadCallback>,
    set_current_callback: Option<ResultCallback>,
    set_current_seq: Option<u16>,
    mission_items: Vec<MissionItem>,
    wire_items: Vec<WireItem>,
    index_map: Vec<u32>,
    download: DownloadState,
    last_current_seq: i32,
    last_reached_seq: i32,
    timeout_cookie: Option<TimeoutCookie>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            activity: Activity::Idle,
            upload_callback: None,
            download_callback: None,
            set_current_callback: None,
            set_current_seq: None,
            mission_items: Vec::new(),
            wire_items: Vec::new(),
            index_map: Vec::new(),
            download: DownloadState::default(),
            last_current_seq: -1,
            last_reached_seq: -1,
            timeout_cookie: None,
        }
    }
}

struct EngineInner {
    link: Arc<dyn VehicleLink>,
    config: EngineConfig,
    timeouts: TimeoutManager,
    state: Mutex<EngineState>,
    progress_tx: watch::Sender<MissionProgress>,
    progress_rx: watch::Receiver<MissionProgress>,
}

/// Mission transfer engine for one vehicle connection.
///
/// The engine owns no transport; the host feeds inbound MISSION_* messages
/// through [`MissionEngine::handle_message`] and the engine answers through
/// the [`VehicleLink`]. All results are delivered through the completion
/// callback of the operation that produced them. Clones share state; one
/// engine serves one vehicle.
#[derive(Clone)]
pub struct MissionEngine {
    inner: Arc<EngineInner>,
}

impl MissionEngine {
    pub fn new(link: Arc<dyn VehicleLink>, config: EngineConfig) -> Self {
        let (progress_tx, progress_rx) = watch::channel(MissionProgress {
            current: -1,
            total: 0,
        });
        Self {
            inner: Arc::new(EngineInner {
                link,
                config,
                timeouts: TimeoutManager::new(),
                state: Mutex::new(EngineState::default()),
                progress_tx,
                progress_rx,
            }),
        }
    }

    // --- Operations -------------------------------------------------------

    /// Upload a mission to the vehicle.
    ///
    /// Sends MISSION_COUNT and then serves the vehicle's item pulls until it
    /// acknowledges the transfer. Uploading zero items clears the mission on
    /// the vehicle.
    pub fn upload_mission_async(
        &self,
        items: Vec<MissionItem>,
        callback: impl FnOnce(MissionResult<()>) + Send + 'static,
    ) {
        let callback: ResultCallback = Box::new(callback);
        let mut state = self.lock();
        if state.activity != Activity::Idle {
            drop(state);
            callback(Err(MissionError::Busy));
            return;
        }
        if !self.inner.link.supports_mission_int() {
            warn!("mission int messages not supported by the vehicle");
            drop(state);
            callback(Err(MissionError::Error));
            return;
        }

        let translated = translate::wire_from_mission_items(&items);
        let count = translated.items.len() as u16;
        state.mission_items = items;
        state.wire_items = translated.items;
        state.index_map = translated.index_map;

        if !self
            .inner
            .link
            .send_message(&wire::mission_count(self.target(), count))
        {
            drop(state);
            callback(Err(MissionError::Error));
            return;
        }

        // The autopilot may take seconds before it starts pulling items, so
        // this waits on the longer deadline class.
        state.timeout_cookie =
            Some(self.register_timeout(self.inner.config.retry_policy.process_timeout));
        state.activity = Activity::Uploading;
        state.upload_callback = Some(callback);
    }

    /// Download the mission stored on the vehicle.
    pub fn download_mission_async(
        &self,
        callback: impl FnOnce(MissionResult<Vec<MissionItem>>) + Send + 'static,
    ) {
        let callback: DownloadCallback = Box::new(callback);
        let mut state = self.lock();
        if state.activity != Activity::Idle {
            drop(state);
            callback(Err(MissionError::Busy));
            return;
        }
        if !self
            .inner
            .link
            .send_message(&wire::mission_request_list(self.target()))
        {
            drop(state);
            callback(Err(MissionError::Error));
            return;
        }

        state.download = DownloadState::default();
        state.timeout_cookie =
            Some(self.register_timeout(self.inner.config.retry_policy.retry_timeout));
        state.activity = Activity::Downloading;
        state.download_callback = Some(callback);
    }

    /// Switch the vehicle into mission flight mode.
    pub fn start_mission_async(&self, callback: impl FnOnce(MissionResult<()>) + Send + 'static) {
        self.request_flight_mode(FlightMode::Mission, Box::new(callback));
    }

    /// Hold the vehicle in place, pausing the running mission.
    pub fn pause_mission_async(&self, callback: impl FnOnce(MissionResult<()>) + Send + 'static) {
        self.request_flight_mode(FlightMode::Hold, Box::new(callback));
    }

    /// Jump the running mission to the given user item.
    ///
    /// Resolves the user index to the first wire item it produced and sends
    /// MISSION_SET_CURRENT; completes when the vehicle reports the matching
    /// MISSION_CURRENT.
    pub fn set_current_mission_item_async(
        &self,
        user_index: u32,
        callback: impl FnOnce(MissionResult<()>) + Send + 'static,
    ) {
        let callback: ResultCallback = Box::new(callback);
        let mut state = self.lock();
        if state.activity != Activity::Idle {
            drop(state);
            callback(Err(MissionError::Busy));
            return;
        }

        // The smallest wire seq that maps back to this user item.
        let wire_seq = match state.index_map.iter().position(|&index| index == user_index) {
            Some(position) => position as u16,
            None => {
                drop(state);
                callback(Err(MissionError::InvalidArgument));
                return;
            }
        };

        if !self
            .inner
            .link
            .send_message(&wire::mission_set_current(self.target(), wire_seq))
        {
            drop(state);
            callback(Err(MissionError::Error));
            return;
        }

        state.activity = Activity::SettingCurrent;
        state.set_current_seq = Some(wire_seq);
        state.set_current_callback = Some(callback);
    }

    // --- Awaitable facade -------------------------------------------------

    pub async fn upload_mission(&self, items: Vec<MissionItem>) -> MissionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.upload_mission_async(items, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(MissionError::Error))
    }

    pub async fn download_mission(&self) -> MissionResult<Vec<MissionItem>> {
        let (tx, rx) = oneshot::channel();
        self.download_mission_async(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(MissionError::Error))
    }

    pub async fn start_mission(&self) -> MissionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.start_mission_async(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(MissionError::Error))
    }

    pub async fn pause_mission(&self) -> MissionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.pause_mission_async(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(MissionError::Error))
    }

    pub async fn set_current_mission_item(&self, user_index: u32) -> MissionResult<()> {
        let (tx, rx) = oneshot::channel();
        self.set_current_mission_item_async(user_index, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(MissionError::Error))
    }

    // --- Progress ---------------------------------------------------------

    /// Live mission progress; the receiver observes every change of the
    /// current or reached item.
    pub fn progress(&self) -> watch::Receiver<MissionProgress> {
        self.inner.progress_rx.clone()
    }

    pub fn current_mission_item(&self) -> i32 {
        current_item_index(&self.lock())
    }

    pub fn total_mission_items(&self) -> i32 {
        self.lock().mission_items.len() as i32
    }

    pub fn is_mission_finished(&self) -> bool {
        mission_finished(&self.lock())
    }

    pub fn activity(&self) -> Activity {
        self.lock().activity
    }

    // --- Inbound message dispatch -----------------------------------------

    /// Feed one inbound message to the engine. Non-mission messages are
    /// ignored, so the host may forward its whole receive stream.
    pub fn handle_message(&self, message: &common::MavMessage) {
        match message {
            common::MavMessage::MISSION_REQUEST(data) => self.process_mission_request(data),
            common::MavMessage::MISSION_REQUEST_INT(data) => {
                self.process_mission_request_int(data)
            }
            common::MavMessage::MISSION_ACK(data) => self.process_mission_ack(data),
            common::MavMessage::MISSION_COUNT(data) => self.process_mission_count(data),
            common::MavMessage::MISSION_ITEM_INT(data) => self.process_mission_item_int(data),
            common::MavMessage::MISSION_CURRENT(data) => self.process_mission_current(data),
            common::MavMessage::MISSION_ITEM_REACHED(data) => {
                self.process_mission_item_reached(data)
            }
            _ => {}
        }
    }

    fn process_mission_request(&self, data: &common::MISSION_REQUEST_DATA) {
        if data.mission_type != MavMissionType::MAV_MISSION_TYPE_MISSION {
            return;
        }
        // Int-only: nack the legacy pull so the autopilot switches to the
        // int variant.
        self.inner.link.send_message(&wire::mission_ack(
            self.target(),
            MavMissionResult::MAV_MISSION_UNSUPPORTED,
        ));

        // Still communicating, so the transfer deadline moves out.
        let state = self.lock();
        if let Some(cookie) = state.timeout_cookie {
            self.inner.timeouts.refresh(cookie);
        }
    }

    fn process_mission_request_int(&self, data: &common::MISSION_REQUEST_INT_DATA) {
        if data.mission_type != MavMissionType::MAV_MISSION_TYPE_MISSION {
            return;
        }
        if !self.addressed_to_us(data.target_system, data.target_component) {
            warn!("ignoring mission request int that is not for us");
            return;
        }

        let state = self.lock();
        if state.activity != Activity::Uploading {
            warn!("ignoring mission request int, no upload in progress");
            return;
        }

        match state.wire_items.get(data.seq as usize) {
            Some(item) => {
                debug!(seq = data.seq, "sending mission item");
                match wire::mission_item_int(self.target(), item) {
                    Ok(message) => {
                        self.inner.link.send_message(&message);
                    }
                    Err(_) => warn!(seq = data.seq, "mission item could not be encoded"),
                }
            }
            None => warn!(seq = data.seq, "mission item requested out of range"),
        }

        if let Some(cookie) = state.timeout_cookie {
            self.inner.timeouts.refresh(cookie);
        }
    }

    fn process_mission_ack(&self, data: &common::MISSION_ACK_DATA) {
        if data.mission_type != MavMissionType::MAV_MISSION_TYPE_MISSION {
            return;
        }

        let mut state = self.lock();
        if state.activity != Activity::Uploading {
            warn!("ignoring mission ack, no upload in progress");
            return;
        }
        if !self.addressed_to_us(data.target_system, data.target_component) {
            warn!("ignoring mission ack that is not for us");
            return;
        }

        // A response arrived, so this was not a timeout.
        if let Some(cookie) = state.timeout_cookie.take() {
            self.inner.timeouts.unregister(cookie);
        }
        state.activity = Activity::Idle;
        let callback = state.upload_callback.take();

        let result = match data.mavtype {
            MavMissionResult::MAV_MISSION_ACCEPTED => {
                // Forget current/reached from any earlier mission run.
                state.last_current_seq = -1;
                state.last_reached_seq = -1;
                info!("mission accepted");
                Ok(())
            }
            MavMissionResult::MAV_MISSION_NO_SPACE => {
                warn!("vehicle rejected mission: no space");
                Err(MissionError::TooManyMissionItems)
            }
            other => {
                warn!(ack = ?other, "vehicle rejected mission");
                Err(MissionError::Error)
            }
        };

        drop(state);
        match callback {
            Some(callback) => callback(result),
            None => warn!("mission ack with no upload callback set"),
        }
    }

    fn process_mission_count(&self, data: &common::MISSION_COUNT_DATA) {
        if data.mission_type != MavMissionType::MAV_MISSION_TYPE_MISSION {
            return;
        }

        let mut state = self.lock();
        if state.activity != Activity::Downloading {
            return;
        }

        if data.count == 0 {
            if let Some(cookie) = state.timeout_cookie.take() {
                self.inner.timeouts.unregister(cookie);
            }
            self.inner.link.send_message(&wire::mission_ack(
                self.target(),
                MavMissionResult::MAV_MISSION_ACCEPTED,
            ));
            state.activity = Activity::Idle;
            let callback = state.download_callback.take();
            drop(state);
            if let Some(callback) = callback {
                callback(Err(MissionError::NoMissionAvailable));
            }
            return;
        }

        state.download.expected_count = Some(data.count);
        state.download.next_seq = 0;

        // Items are pulled one by one now, each on the shorter deadline.
        if let Some(cookie) = state.timeout_cookie.take() {
            self.inner.timeouts.unregister(cookie);
        }
        state.timeout_cookie =
            Some(self.register_timeout(self.inner.config.retry_policy.retry_timeout));
        self.request_next_download_item(&state);
    }

    fn process_mission_item_int(&self, data: &common::MISSION_ITEM_INT_DATA) {
        if data.mission_type != MavMissionType::MAV_MISSION_TYPE_MISSION {
            return;
        }

        let mut state = self.lock();
        if state.activity != Activity::Downloading {
            debug!(seq = data.seq, "ignoring mission item, no download in progress");
            return;
        }
        let expected_count = match state.download.expected_count {
            Some(count) => count,
            None => {
                debug!(seq = data.seq, "ignoring mission item before count");
                return;
            }
        };

        if data.seq != state.download.next_seq {
            debug!(
                seq = data.seq,
                expected = state.download.next_seq,
                "out-of-order mission item, requesting again"
            );
            // Our request probably got lost; the peer at least is alive.
            if let Some(cookie) = state.timeout_cookie {
                self.inner.timeouts.refresh(cookie);
            }
            self.request_next_download_item(&state);
            return;
        }

        debug!(seq = data.seq, "received mission item");
        state.download.items.push(wire::wire_item_from_message(data));
        state.download.retries = 0;

        if state.download.next_seq + 1 < expected_count {
            state.download.next_seq += 1;
            if let Some(cookie) = state.timeout_cookie {
                self.inner.timeouts.refresh(cookie);
            }
            self.request_next_download_item(&state);
            return;
        }

        // That was the last item: close the transaction and hand the wire
        // sequence over to translation.
        if let Some(cookie) = state.timeout_cookie.take() {
            self.inner.timeouts.unregister(cookie);
        }
        self.inner.link.send_message(&wire::mission_ack(
            self.target(),
            MavMissionResult::MAV_MISSION_ACCEPTED,
        ));

        let collected = std::mem::take(&mut state.download.items);
        state.activity = Activity::Idle;
        let callback = state.download_callback.take();

        let result = match translate::mission_items_from_wire(&collected) {
            Ok(assembled) => {
                state.mission_items = assembled.items.clone();
                state.index_map = assembled.index_map;
                Ok(assembled.items)
            }
            Err(err) => Err(err),
        };

        drop(state);
        if let Some(callback) = callback {
            callback(result);
        }
    }

    fn process_mission_current(&self, data: &common::MISSION_CURRENT_DATA) {
        let mut state = self.lock();

        let seq = i32::from(data.seq);
        if state.last_current_seq != seq {
            state.last_current_seq = seq;
            self.publish_progress(&state);
        }

        if state.activity == Activity::SettingCurrent && state.set_current_seq == Some(data.seq) {
            state.activity = Activity::Idle;
            state.set_current_seq = None;
            let callback = state.set_current_callback.take();
            drop(state);
            if let Some(callback) = callback {
                callback(Ok(()));
            }
        }
    }

    fn process_mission_item_reached(&self, data: &common::MISSION_ITEM_REACHED_DATA) {
        let mut state = self.lock();
        let seq = i32::from(data.seq);
        if state.last_reached_seq != seq {
            state.last_reached_seq = seq;
            self.publish_progress(&state);
        }
    }

    // --- Timeouts ---------------------------------------------------------

    fn process_timeout(&self) {
        let mut state = self.lock();
        state.timeout_cookie = None;

        match state.activity {
            Activity::Uploading => {
                // Nothing to retry from our side, the autopilot is the one
                // pulling items. No result reaches the caller here.
                warn!("mission upload timed out");
                state.activity = Activity::Idle;
                state.upload_callback = None;
            }
            Activity::Downloading => {
                if state.download.retries < self.inner.config.retry_policy.max_retries {
                    state.download.retries += 1;
                    warn!(
                        retries = state.download.retries,
                        "mission download timed out, requesting item again"
                    );
                    state.timeout_cookie =
                        Some(self.register_timeout(self.inner.config.retry_policy.retry_timeout));
                    self.request_next_download_item(&state);
                } else {
                    warn!("mission download timed out");
                    state.activity = Activity::Idle;
                    state.download = DownloadState::default();
                    let callback = state.download_callback.take();
                    drop(state);
                    if let Some(callback) = callback {
                        callback(Err(MissionError::Timeout));
                    }
                }
            }
            _ => warn!("unexpected mission timeout"),
        }
    }

    fn register_timeout(&self, duration: Duration) -> TimeoutCookie {
        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        self.inner.timeouts.register(duration, move || {
            if let Some(inner) = weak.upgrade() {
                MissionEngine { inner }.process_timeout();
            }
        })
    }

    // --- Helpers ----------------------------------------------------------

    fn request_flight_mode(&self, mode: FlightMode, callback: ResultCallback) {
        {
            let mut state = self.lock();
            if state.activity != Activity::Idle {
                drop(state);
                callback(Err(MissionError::Busy));
                return;
            }
            state.activity = Activity::SendingCommand;
        }

        let weak: Weak<EngineInner> = Arc::downgrade(&self.inner);
        self.inner.link.request_flight_mode(
            mode,
            Box::new(move |outcome| {
                if let Some(inner) = weak.upgrade() {
                    let mut state = inner.state.lock().unwrap();
                    if state.activity == Activity::SendingCommand {
                        state.activity = Activity::Idle;
                    }
                }
                callback(match outcome {
                    CommandOutcome::Success => Ok(()),
                    CommandOutcome::Failed => Err(MissionError::Error),
                });
            }),
        );
    }

    fn request_next_download_item(&self, state: &EngineState) {
        debug!(seq = state.download.next_seq, "requesting mission item");
        self.inner.link.send_message(&wire::mission_request_int(
            self.target(),
            state.download.next_seq,
        ));
    }

    fn publish_progress(&self, state: &EngineState) {
        let _ = self.inner.progress_tx.send(MissionProgress {
            current: current_item_index(state),
            total: state.mission_items.len() as i32,
        });
    }

    fn addressed_to_us(&self, target_system: u8, target_component: u8) -> bool {
        // Deliberately lenient: a message matching either our system id or
        // our component id is accepted. Kept for wire compatibility with
        // autopilots that only fill in one of the two.
        !(target_system != self.inner.config.gcs_system_id
            && target_component != self.inner.config.gcs_component_id)
    }

    fn target(&self) -> Target {
        Target {
            system_id: self.inner.link.system_id(),
            component_id: self.inner.link.component_id(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.inner.state.lock().unwrap()
    }
}

fn mission_finished(state: &EngineState) -> bool {
    // "current" jumps back to 0 once the last item is done, so completion
    // has to be decided on "reached".
    state.last_current_seq >= 0
        && state.last_reached_seq >= 0
        && !state.wire_items.is_empty()
        && (state.last_reached_seq + 1) as usize == state.wire_items.len()
}

fn current_item_index(state: &EngineState) -> i32 {
    // A finished mission reports the total as the current item.
    if mission_finished(state) {
        return state.mission_items.len() as i32;
    }
    if state.last_current_seq < 0 {
        return -1;
    }
    state
        .index_map
        .get(state.last_current_seq as usize)
        .map(|&index| index as i32)
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_wire_count(count: usize) -> EngineState {
        let mut state = EngineState::default();
        state.wire_items = vec![
            WireItem {
                seq: 0,
                frame: crate::mission::wire::WireFrame::GlobalRelativeAltInt,
                command: 16,
                current: true,
                autocontinue: true,
                param1: 0.0,
                param2: 0.0,
                param3: 0.0,
                param4: f32::NAN,
                x: 0,
                y: 0,
                z: 10.0,
            };
            count
        ];
        state
    }

    #[test]
    fn fresh_state_is_not_finished() {
        let state = EngineState::default();
        assert!(!mission_finished(&state));
        assert_eq!(current_item_index(&state), -1);
    }

    #[test]
    fn finished_only_when_last_item_reached() {
        let mut state = state_with_wire_count(3);
        state.mission_items = vec![MissionItem::default(); 2];
        state.index_map = vec![0, 0, 1];
        state.last_current_seq = 2;

        state.last_reached_seq = 1;
        assert!(!mission_finished(&state));
        assert_eq!(current_item_index(&state), 1);

        state.last_reached_seq = 2;
        assert!(mission_finished(&state));
        assert_eq!(current_item_index(&state), 2);
    }

    #[test]
    fn current_item_unmapped_seq_reports_unknown() {
        let mut state = state_with_wire_count(1);
        state.index_map = vec![0];
        state.last_current_seq = 9;
        assert_eq!(current_item_index(&state), -1);
    }
}
