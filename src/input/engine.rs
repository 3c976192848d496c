// Input discovery and injection: map the device's input topology to
// power-key candidates, drive the wake flow, watch the backlight for
// screen power transitions, and inject keys and taps as raw sendevent
// batches.
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::sleep;

use crate::adb::connection::DeviceLink;
use crate::adb::error::{AdbError, AdbResult};
use crate::adb::executor::AdbExecutor;
use crate::config::BridgeConfig;
use crate::events::BridgeEvent;

use super::keylayout::{layout_file_for, parse_input_devices, power_keycode_for};
use super::sendevent::{join_batch, key_event_batch, multi_touch_batch, single_touch_batch};
use super::types::{
    InputCommand, KEYLAYOUT_EXT, OsType, PROC_INPUT_DEVICES, PowerKeyCandidate,
    SYS_LCD_BACKLIGHT, WakePhase,
};

/// A sticky candidate that fails this many wake attempts in a row loses
/// its priority.
const STICKY_FAILURE_LIMIT: u32 = 2;
/// Fallback event device when discovery found nothing. Touch batches
/// also target it; touchscreen nodes are not probed separately.
const DEFAULT_EVENT_DEVICE: u32 = 0;

/// Map an SDK level to the injection dialect. 14 and 15 are ICS, 16 and
/// up behave like JB. Anything unreadable is unknown and gets the
/// legacy single-touch treatment.
pub fn classify_sdk(sdk: Option<u32>) -> OsType {
    match sdk {
        Some(14..=15) => OsType::Ics,
        Some(level) if level >= 16 => OsType::Jb,
        _ => OsType::Unknown,
    }
}

pub struct InputEngine {
    link: Arc<DeviceLink>,
    config: BridgeConfig,
    adb: AdbExecutor,
    command_rx: mpsc::Receiver<InputCommand>,
    event_tx: mpsc::Sender<BridgeEvent>,
    candidates: Vec<PowerKeyCandidate>,
    wake_phase: WakePhase,
    /// Consecutive wake attempts in which the leading sticky candidate
    /// failed.
    sticky_failures: u32,
    /// OS dialect, probed once per session.
    os_type: Option<OsType>,
    /// Whether the device exposes the backlight node; probed once per
    /// session.
    has_lcd_backlight: Option<bool>,
    /// Poller's last reading; the baseline for screen on/off edges.
    lcd_brightness: i32,
    /// Gesture start stored by a press-only click until its release.
    press_pos: Option<(u32, u32)>,
    session_ready: bool,
    should_exit: bool,
}

impl InputEngine {
    pub fn new(
        link: Arc<DeviceLink>,
        config: BridgeConfig,
        command_rx: mpsc::Receiver<InputCommand>,
        event_tx: mpsc::Sender<BridgeEvent>,
    ) -> Self {
        Self {
            link,
            config,
            adb: AdbExecutor::new(),
            command_rx,
            event_tx,
            candidates: Vec::new(),
            wake_phase: WakePhase::Probing,
            sticky_failures: 0,
            os_type: None,
            has_lcd_backlight: None,
            lcd_brightness: 0,
            press_pos: None,
            session_ready: false,
            should_exit: false,
        }
    }

    /// Swap the adb executor, e.g. for a non-default client binary.
    pub fn with_executor(mut self, adb: AdbExecutor) -> Self {
        self.adb = adb;
        self
    }

    pub fn wake_phase(&self) -> WakePhase {
        self.wake_phase
    }

    pub fn power_key_candidates(&self) -> &[PowerKeyCandidate] {
        &self.candidates
    }

    /// Last brightness value recorded by the backlight poller.
    pub fn screen_brightness(&self) -> i32 {
        self.lcd_brightness
    }

    /// Drive the engine until a `Shutdown` command arrives. Commands
    /// preempt the poll cadence; between commands the backlight is
    /// polled at the shared link pace. While no device is attached the
    /// engine parks until the next connect instead of polling.
    pub async fn run(&mut self) {
        info!("input engine starting");
        while !self.should_exit {
            if !self.link.is_connected() && self.session_ready {
                self.end_session();
            }
            let command = tokio::select! {
                maybe = self.command_rx.recv() => match maybe {
                    Some(command) => Some(command),
                    None => break,
                },
                _ = Self::pace(&self.link) => None,
            };
            match command {
                Some(command) => self.handle_command(command).await,
                None => self.poll_cycle().await,
            }
        }
        if self.adb.is_running() {
            let _ = self.adb.kill().await;
        }
        info!("input engine stopped");
    }

    /// Poll pacing: the shared bounded delay while a device is attached,
    /// a park released by the next connect otherwise.
    async fn pace(link: &DeviceLink) {
        if link.is_connected() {
            link.loop_delay().await;
        } else {
            link.wait_until_connected().await;
        }
    }

    async fn handle_command(&mut self, command: InputCommand) {
        match command {
            InputCommand::ProbePowerKeys => {
                if let Err(err) = self.probe_device_power_key().await {
                    warn!("power key probe failed: {err}");
                    if self.adb.is_running() {
                        let _ = self.adb.kill().await;
                    }
                    let _ = self.event_tx.send(BridgeEvent::Error(err.to_string())).await;
                }
            }
            InputCommand::WakeUp => {
                self.wake_up_device_via_power_key().await;
            }
            InputCommand::VirtualKey(keycode) => self.send_virtual_key(keycode).await,
            InputCommand::VirtualClick {
                x,
                y,
                press,
                release,
            } => self.send_virtual_click(x, y, press, release).await,
            InputCommand::Shutdown => self.should_exit = true,
        }
    }

    async fn poll_cycle(&mut self) {
        if !self.link.is_connected() {
            return;
        }
        self.ensure_session().await;
        self.update_device_brightness().await;
    }

    /// One-time per-connection discovery: OS dialect, backlight
    /// presence, power key candidates.
    async fn ensure_session(&mut self) {
        if self.session_ready {
            return;
        }
        info!("input engine: probing a new device session");
        let _ = self.get_device_os_type().await;
        self.probe_device_has_backlight().await;
        match self.probe_device_power_key().await {
            Ok(count) => {
                self.session_ready = true;
                if count == 0 {
                    warn!("no power key candidates found; wake requests will need manual help");
                }
            }
            Err(err) => {
                // Executor-level trouble; leave the session unprobed so
                // the next cycle retries.
                warn!("power key probe failed: {err}");
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                let _ = self.event_tx.send(BridgeEvent::Error(err.to_string())).await;
            }
        }
    }

    fn end_session(&mut self) {
        debug!("input session reset");
        self.session_ready = false;
        self.os_type = None;
        self.has_lcd_backlight = None;
        self.lcd_brightness = 0;
        self.press_pos = None;
        self.wake_phase = WakePhase::Probing;
        self.candidates.clear();
        self.sticky_failures = 0;
    }

    // ---- power key discovery ----

    /// Enumerate input devices and keep those whose key layout maps the
    /// common power keycode. Devices without a usable layout are
    /// skipped, not fatal. Returns the number of candidates found.
    pub async fn probe_device_power_key(&mut self) -> AdbResult<usize> {
        self.wake_phase = WakePhase::Probing;
        self.candidates.clear();
        self.sticky_failures = 0;

        self.adb.run_shell(["cat", PROC_INPUT_DEVICES]).await?;
        if !self.adb.exit_success() {
            return Err(self.adb.exit_failure());
        }
        let listing = self.adb.output_text();
        let entries = parse_input_devices(&listing);
        debug!("input topology: {} device(s)", entries.len());

        for entry in entries {
            let layout_path = layout_file_for(&entry.name);
            self.adb.run_shell(["cat", layout_path.as_str()]).await?;
            if !self.adb.exit_success() {
                debug!("{}: no key layout at {layout_path}", entry.name);
                continue;
            }
            let layout = self.adb.output_text();
            match power_keycode_for(&layout) {
                Some(code) => {
                    info!(
                        "power key candidate: {} (event{}, keycode {code})",
                        entry.name, entry.event_index
                    );
                    self.candidates.push(PowerKeyCandidate::new(
                        format!("{}{KEYLAYOUT_EXT}", entry.name),
                        entry.event_index,
                        code,
                    ));
                }
                None => debug!("{}: layout has no power mapping", entry.name),
            }
        }

        if self.candidates.is_empty() {
            self.wake_phase = WakePhase::Probing;
        } else {
            self.wake_phase = WakePhase::CandidatesReady;
        }
        Ok(self.candidates.len())
    }

    // ---- wake flow ----

    /// Try candidates in sticky-success order until the screen reports
    /// on. Returns whether anything woke the device; exhaustion is
    /// reported upstream and left for the next wake request.
    pub async fn wake_up_device_via_power_key(&mut self) -> bool {
        if self.candidates.is_empty() {
            self.wake_phase = WakePhase::Exhausted;
            let err = AdbError::NoPowerKeyCandidates;
            warn!("wake requested but {err}");
            let _ = self.event_tx.send(BridgeEvent::Error(err.to_string())).await;
            let _ = self
                .event_tx
                .send(BridgeEvent::Prompt(
                    "Please wake the device manually".to_string(),
                ))
                .await;
            return false;
        }
        self.wake_phase = WakePhase::Waking;
        if self.has_lcd_backlight.is_none() {
            // Wake verification needs to know whether the backlight can
            // be read at all.
            self.probe_device_has_backlight().await;
        }

        let mut order: Vec<usize> = (0..self.candidates.len()).collect();
        order.sort_by_key(|&i| !self.candidates[i].wake_succeeded);
        let sticky_leads = self.candidates[order[0]].wake_succeeded;

        for (pos, &idx) in order.iter().enumerate() {
            let (device_index, keycode, layout) = {
                let candidate = &self.candidates[idx];
                (
                    candidate.event_device_index,
                    candidate.power_keycode,
                    candidate.key_layout.clone(),
                )
            };
            debug!("wake attempt via {layout} (event{device_index}, keycode {keycode})");
            let batch = key_event_batch(device_index, keycode);
            if self.dispatch_batch(&batch).await {
                sleep(Duration::from_millis(self.config.wake_settle_ms)).await;
                if self.screen_is_on().await {
                    info!("device woken via {layout} (event{device_index})");
                    self.mark_wake_success(idx);
                    self.wake_phase = WakePhase::Success;
                    if self.has_lcd_backlight == Some(false) {
                        // No backlight to watch; the settled wake is the
                        // only screen-on signal this device will give.
                        let _ = self.event_tx.send(BridgeEvent::ScreenTurnedOn).await;
                    }
                    let _ = self
                        .event_tx
                        .send(BridgeEvent::Prompt(format!("Screen is awake (woken via {layout})")))
                        .await;
                    return true;
                }
            }
            if pos == 0 && sticky_leads {
                self.sticky_failures += 1;
                if self.sticky_failures >= STICKY_FAILURE_LIMIT {
                    warn!(
                        "sticky candidate {layout} failed {STICKY_FAILURE_LIMIT} wake attempts; dropping its priority"
                    );
                    self.candidates[idx].wake_succeeded = false;
                    self.sticky_failures = 0;
                }
            }
        }

        self.wake_phase = WakePhase::Exhausted;
        warn!(
            "all {} power key candidate(s) failed to wake the screen",
            self.candidates.len()
        );
        let _ = self
            .event_tx
            .send(BridgeEvent::Error(
                "no power key candidate woke the screen".to_string(),
            ))
            .await;
        let _ = self
            .event_tx
            .send(BridgeEvent::Prompt(
                "Please press the power button manually".to_string(),
            ))
            .await;
        false
    }

    /// Flag the candidate and move it to the front so the next wake
    /// tries it first.
    fn mark_wake_success(&mut self, idx: usize) {
        self.sticky_failures = 0;
        if idx < self.candidates.len() {
            let mut candidate = self.candidates.remove(idx);
            candidate.wake_succeeded = true;
            self.candidates.insert(0, candidate);
        }
    }

    // ---- injection ----

    /// Inject a key down/up pair for a raw keycode, addressed to the
    /// device that last proved it can deliver keys.
    pub async fn send_virtual_key(&mut self, keycode: u32) {
        let device_index = self.preferred_event_device();
        let batch = key_event_batch(device_index, keycode);
        if !self.dispatch_batch(&batch).await {
            let _ = self
                .event_tx
                .send(BridgeEvent::Error(format!(
                    "virtual key {keycode} was not delivered"
                )))
                .await;
        }
    }

    /// Inject a touch. JB devices speak the type-A multi-touch protocol
    /// and get the whole gesture synthesized at release time; older and
    /// unknown devices get legacy single-touch events per phase. A
    /// positional move (neither press nor release) injects nothing and
    /// keeps an open gesture open.
    pub async fn send_virtual_click(&mut self, x: u32, y: u32, press: bool, release: bool) {
        let os = self.get_device_os_type().await;
        let batch = match os {
            OsType::Jb => {
                if press {
                    self.press_pos = Some((x, y));
                    if !release {
                        return;
                    }
                } else if !release {
                    // The release names the gesture endpoint, so a move
                    // has nothing to add yet.
                    debug!("move to ({x}, {y}) deferred until release");
                    return;
                }
                let from = self.press_pos.take().unwrap_or((x, y));
                multi_touch_batch(DEFAULT_EVENT_DEVICE, from, (x, y))
            }
            OsType::Ics | OsType::Unknown => {
                single_touch_batch(DEFAULT_EVENT_DEVICE, x, y, press, release)
            }
        };
        if !self.dispatch_batch(&batch).await {
            let _ = self
                .event_tx
                .send(BridgeEvent::Error(format!(
                    "touch at ({x}, {y}) was not delivered"
                )))
                .await;
        }
    }

    /// Key injection target: the proven wake device, else the first
    /// discovered, else the default node.
    fn preferred_event_device(&self) -> u32 {
        self.candidates
            .iter()
            .find(|candidate| candidate.wake_succeeded)
            .or_else(|| self.candidates.first())
            .map(|candidate| candidate.event_device_index)
            .unwrap_or(DEFAULT_EVENT_DEVICE)
    }

    /// Run one sendevent batch on the device. A failed injection is
    /// reported by the caller, never retried here. An empty batch never
    /// reaches the shell.
    async fn dispatch_batch(&mut self, batch: &[String]) -> bool {
        if batch.is_empty() {
            return true;
        }
        let joined = join_batch(batch);
        debug!("injecting: {joined}");
        match self.adb.run_shell([joined]).await {
            Ok(()) if self.adb.exit_success() => true,
            Ok(()) => {
                warn!("injection rejected: {}", self.adb.exit_failure());
                false
            }
            Err(err) => {
                warn!("injection failed: {err}");
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                false
            }
        }
    }

    // ---- screen state ----

    /// Whether the screen is lit right now. Devices without the
    /// backlight node cannot be checked; after a wake sequence has
    /// settled they are assumed on. Reads the node directly and leaves
    /// `lcd_brightness` alone: that value is the poller's transition
    /// baseline.
    pub async fn screen_is_on(&mut self) -> bool {
        if self.has_lcd_backlight == Some(false) {
            return true;
        }
        match self.read_brightness().await {
            Ok(value) => value > 0,
            Err(err) => {
                debug!("brightness read failed ({err}); using last known value");
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                self.lcd_brightness > 0
            }
        }
    }

    /// Poll the backlight and emit screen power transitions on the zero
    /// crossings.
    pub async fn update_device_brightness(&mut self) {
        if self.has_lcd_backlight != Some(true) {
            return;
        }
        let previous = self.lcd_brightness;
        match self.read_brightness().await {
            Ok(value) => {
                self.lcd_brightness = value;
                if previous == 0 && value > 0 {
                    info!("screen turned on (brightness {value})");
                    let _ = self.event_tx.send(BridgeEvent::ScreenTurnedOn).await;
                } else if previous > 0 && value == 0 {
                    info!("screen turned off");
                    let _ = self.event_tx.send(BridgeEvent::ScreenTurnedOff).await;
                }
            }
            Err(err) => {
                debug!("brightness poll failed: {err}");
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
            }
        }
    }

    /// A missing backlight node is a device trait, not an error; it
    /// turns off brightness-based screen checks for the session.
    pub async fn probe_device_has_backlight(&mut self) {
        match self.read_brightness().await {
            Ok(value) => {
                self.lcd_brightness = value;
                self.has_lcd_backlight = Some(true);
                info!("lcd backlight present, brightness {value}");
            }
            Err(err) => {
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                info!("no readable lcd backlight ({err}); screen checks fall back to wake timing");
                self.has_lcd_backlight = Some(false);
            }
        }
    }

    async fn read_brightness(&mut self) -> AdbResult<i32> {
        self.adb.run_shell(["cat", SYS_LCD_BACKLIGHT]).await?;
        if !self.adb.exit_success() {
            return Err(self.adb.exit_failure());
        }
        let text = self.adb.output_text();
        let trimmed = text.trim();
        trimmed.parse::<i32>().map_err(|_| AdbError::UnexpectedOutput {
            command: self.adb.command_line(),
            output: trimmed.to_string(),
        })
    }

    // ---- os dialect ----

    /// Classify the device OS from its SDK level, probed once per
    /// session.
    pub async fn get_device_os_type(&mut self) -> OsType {
        if let Some(os) = self.os_type {
            return os;
        }
        let os = match self.read_sdk_version().await {
            Ok(sdk) => classify_sdk(Some(sdk)),
            Err(err) => {
                warn!("sdk level probe failed: {err}");
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                classify_sdk(None)
            }
        };
        info!("device os type: {os}");
        self.os_type = Some(os);
        os
    }

    async fn read_sdk_version(&mut self) -> AdbResult<u32> {
        self.adb
            .run_shell(["getprop", "ro.build.version.sdk"])
            .await?;
        if !self.adb.exit_success() {
            return Err(self.adb.exit_failure());
        }
        let text = self.adb.output_text();
        let trimmed = text.trim();
        trimmed.parse::<u32>().map_err(|_| AdbError::UnexpectedOutput {
            command: self.adb.command_line(),
            output: trimmed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::channels::create_input_channels;
    use crate::input::types::POWER_KEY_COMMON;

    fn test_engine() -> (
        InputEngine,
        mpsc::Sender<InputCommand>,
        mpsc::Receiver<BridgeEvent>,
    ) {
        let (event_tx, event_rx) = crate::events::create_event_channel();
        let link = DeviceLink::new(event_tx.clone());
        let (cmd_tx, cmd_rx) = create_input_channels();
        let config = BridgeConfig {
            wake_settle_ms: 10,
            ..BridgeConfig::default()
        };
        let engine = InputEngine::new(link, config, cmd_rx, event_tx)
            .with_executor(AdbExecutor::with_program("definitely-not-an-adb-install"));
        (engine, cmd_tx, event_rx)
    }

    fn candidate(name: &str, index: u32) -> PowerKeyCandidate {
        PowerKeyCandidate::new(format!("{name}.kl"), index, POWER_KEY_COMMON)
    }

    fn drain(rx: &mut mpsc::Receiver<BridgeEvent>) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_classify_sdk_matrix() {
        assert_eq!(classify_sdk(None), OsType::Unknown, "unreadable sdk");
        assert_eq!(classify_sdk(Some(10)), OsType::Unknown, "pre-ICS sdk");
        assert_eq!(classify_sdk(Some(14)), OsType::Ics);
        assert_eq!(classify_sdk(Some(15)), OsType::Ics);
        assert_eq!(classify_sdk(Some(16)), OsType::Jb);
        assert_eq!(classify_sdk(Some(25)), OsType::Jb, "newer levels stay JB");
    }

    #[tokio::test]
    async fn test_mark_wake_success_promotes_and_flags() {
        let (mut engine, _cmd_tx, _event_rx) = test_engine();
        engine.candidates = vec![
            candidate("qwerty", 0),
            candidate("pwrkey", 4),
            candidate("gpio-keys", 2),
        ];
        engine.sticky_failures = 1;

        engine.mark_wake_success(1);
        assert_eq!(
            engine.candidates[0].key_layout, "pwrkey.kl",
            "the successful candidate must move to the front"
        );
        assert!(engine.candidates[0].wake_succeeded);
        assert_eq!(engine.sticky_failures, 0, "success resets the failure run");

        engine.mark_wake_success(2);
        assert_eq!(
            engine.candidates[0].key_layout, "gpio-keys.kl",
            "a later success takes over the front"
        );
        assert!(
            engine.candidates[1].wake_succeeded,
            "earlier successes keep their historical flag"
        );
    }

    #[tokio::test]
    async fn test_sticky_demotion_after_two_failed_wakes() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        let mut sticky = candidate("pwrkey", 4);
        sticky.wake_succeeded = true;
        engine.candidates = vec![sticky, candidate("qwerty", 0)];

        assert!(
            !engine.wake_up_device_via_power_key().await,
            "no adb client, so nothing can wake"
        );
        assert_eq!(engine.wake_phase(), WakePhase::Exhausted);
        assert_eq!(engine.sticky_failures, 1);
        assert!(
            engine.candidates[0].wake_succeeded,
            "one failed attempt must not demote the sticky candidate"
        );

        assert!(!engine.wake_up_device_via_power_key().await);
        assert!(
            !engine.candidates[0].wake_succeeded,
            "the second consecutive failure drops the sticky priority"
        );
        assert_eq!(engine.sticky_failures, 0, "demotion restarts the count");

        let events = drain(&mut event_rx);
        let errors = events
            .iter()
            .filter(|event| matches!(event, BridgeEvent::Error(_)))
            .count();
        let prompts = events
            .iter()
            .filter(|event| matches!(event, BridgeEvent::Prompt(_)))
            .count();
        assert_eq!(errors, 2, "each exhausted wake reports upstream");
        assert_eq!(prompts, 2, "each exhausted wake asks for manual help");
    }

    #[tokio::test]
    async fn test_wake_with_no_candidates_reports_exhaustion() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        assert!(!engine.wake_up_device_via_power_key().await);
        assert_eq!(engine.wake_phase(), WakePhase::Exhausted);

        let events = drain(&mut event_rx);
        assert!(
            events.iter().any(|e| matches!(e, BridgeEvent::Error(_))),
            "an empty candidate set must be reported"
        );
        assert!(
            events.iter().any(|e| matches!(e, BridgeEvent::Prompt(_))),
            "the operator gets asked to step in"
        );
    }

    #[tokio::test]
    async fn test_preferred_event_device_fallbacks() {
        let (mut engine, _cmd_tx, _event_rx) = test_engine();
        assert_eq!(
            engine.preferred_event_device(),
            DEFAULT_EVENT_DEVICE,
            "no candidates falls back to the default node"
        );

        engine.candidates = vec![candidate("qwerty", 3), candidate("pwrkey", 7)];
        assert_eq!(
            engine.preferred_event_device(),
            3,
            "without a proven candidate the first discovered wins"
        );

        engine.candidates[1].wake_succeeded = true;
        assert_eq!(
            engine.preferred_event_device(),
            7,
            "a proven candidate wins regardless of position"
        );
    }

    #[tokio::test]
    async fn test_jb_press_stores_gesture_start() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        engine.os_type = Some(OsType::Jb);

        engine.send_virtual_click(10, 20, true, false).await;
        assert_eq!(
            engine.press_pos,
            Some((10, 20)),
            "a press-only click starts a gesture"
        );
        assert!(
            drain(&mut event_rx).is_empty(),
            "nothing is injected until the release"
        );

        engine.send_virtual_click(30, 40, false, true).await;
        assert_eq!(engine.press_pos, None, "the release consumes the start");
        assert!(
            drain(&mut event_rx)
                .iter()
                .any(|e| matches!(e, BridgeEvent::Error(_))),
            "a failed gesture dispatch must be reported"
        );
    }

    #[tokio::test]
    async fn test_jb_move_keeps_gesture_open() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        engine.os_type = Some(OsType::Jb);

        engine.send_virtual_click(10, 20, true, false).await;
        engine.send_virtual_click(15, 25, false, false).await;
        assert_eq!(
            engine.press_pos,
            Some((10, 20)),
            "a mid-gesture move must not consume the press origin"
        );
        assert!(
            drain(&mut event_rx).is_empty(),
            "a mid-gesture move injects nothing"
        );

        engine.send_virtual_click(30, 40, false, true).await;
        assert_eq!(
            engine.press_pos, None,
            "the real release still closes the gesture"
        );
    }

    #[tokio::test]
    async fn test_single_touch_click_failure_reports() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        engine.os_type = Some(OsType::Ics);

        engine.send_virtual_click(5, 6, true, true).await;
        assert!(
            drain(&mut event_rx)
                .iter()
                .any(|e| matches!(e, BridgeEvent::Error(_))),
            "a failed tap dispatch must be reported"
        );
    }

    #[tokio::test]
    async fn test_single_touch_move_injects_nothing() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        engine.os_type = Some(OsType::Ics);

        engine.send_virtual_click(5, 6, false, false).await;
        assert!(
            drain(&mut event_rx).is_empty(),
            "a phase with no events must not reach the shell"
        );
    }

    #[tokio::test]
    async fn test_screen_assumed_on_without_backlight() {
        let (mut engine, _cmd_tx, _event_rx) = test_engine();
        engine.has_lcd_backlight = Some(false);
        assert!(
            engine.screen_is_on().await,
            "no backlight node means the settled wake counts as on"
        );

        engine.has_lcd_backlight = Some(true);
        assert!(
            !engine.screen_is_on().await,
            "an unreadable backlight falls back to the last known value"
        );
        engine.lcd_brightness = 120;
        assert!(engine.screen_is_on().await);
    }

    #[tokio::test]
    async fn test_wake_screen_check_leaves_poll_baseline() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        let state = std::env::temp_dir().join(format!("backlight-{}", std::process::id()));
        std::fs::write(&state, "120\n").expect("seed brightness file");
        engine.adb = AdbExecutor::scripted("backlight", &format!("cat {}", state.display()));
        engine.has_lcd_backlight = Some(true);
        engine.lcd_brightness = 0;

        assert!(engine.screen_is_on().await, "a lit backlight reads as on");
        assert_eq!(
            engine.screen_brightness(),
            0,
            "a wake-time check must not move the poller's baseline"
        );

        engine.update_device_brightness().await;
        assert!(
            drain(&mut event_rx)
                .iter()
                .any(|e| matches!(e, BridgeEvent::ScreenTurnedOn)),
            "the poller still owns the off-to-on transition"
        );
        assert_eq!(engine.screen_brightness(), 120);

        std::fs::write(&state, "0\n").expect("rewrite brightness file");
        assert!(!engine.screen_is_on().await, "a dark backlight reads as off");
        engine.update_device_brightness().await;
        assert!(
            drain(&mut event_rx)
                .iter()
                .any(|e| matches!(e, BridgeEvent::ScreenTurnedOff)),
            "the poller still owns the on-to-off transition"
        );
        let _ = std::fs::remove_file(&state);
    }

    #[tokio::test]
    async fn test_brightness_update_skipped_without_backlight() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        engine.update_device_brightness().await;
        assert!(
            drain(&mut event_rx).is_empty(),
            "an unprobed backlight must not be polled"
        );
    }

    #[tokio::test]
    async fn test_probe_failure_leaves_session_unready() {
        let (mut engine, _cmd_tx, mut event_rx) = test_engine();
        engine.link.set_connected(true).await;
        let _ = event_rx.recv().await; // DeviceFound

        engine.ensure_session().await;
        assert!(
            !engine.session_ready,
            "a failed power key probe must be retried next cycle"
        );
        assert!(
            drain(&mut event_rx)
                .iter()
                .any(|e| matches!(e, BridgeEvent::Error(_))),
            "probe transport trouble must be reported"
        );
    }

    #[tokio::test]
    async fn test_shutdown_command_stops_run() {
        let (mut engine, cmd_tx, _event_rx) = test_engine();
        cmd_tx
            .send(InputCommand::Shutdown)
            .await
            .expect("command channel open");
        engine.run().await;
        assert!(engine.should_exit, "run must return once Shutdown is seen");
    }
}
