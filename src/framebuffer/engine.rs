// Framebuffer acquisition pipeline: wait for a device, probe what its
// screencap build and this host can do, then stream normalized frames
// until told to pause or the device goes away.
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::adb::command::HostCommand;
use crate::adb::connection::DeviceLink;
use crate::adb::error::{AdbError, AdbResult};
use crate::adb::executor::AdbExecutor;
use crate::config::BridgeConfig;
use crate::events::BridgeEvent;

use super::convert::{pack_rgb888, parse_fb_header};
use super::types::{CaptureCommand, CaptureState, FB_HEADER_BYTES, FbDescriptor, Frame};

/// Host-side temp file for a compressed capture payload.
pub const GZ_FILE: &str = "/dev/shm/android-fb.gz";
/// `GZ_FILE` after the decompressor strips the suffix.
pub const GZ_PLAIN_FILE: &str = "/dev/shm/android-fb";

/// Bound for one `wait-for-device` attempt.
const DEVICE_WAIT_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound for one capture round trip.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct FbEngine {
    link: Arc<DeviceLink>,
    config: BridgeConfig,
    adb: AdbExecutor,
    command_rx: mpsc::Receiver<CaptureCommand>,
    event_tx: mpsc::Sender<BridgeEvent>,
    state: CaptureState,
    descriptor: Option<FbDescriptor>,
    /// Host decompressor availability; probed once per engine lifetime.
    compress_available: Option<bool>,
    /// Device screencap accepts -q / -s; probed per connection.
    opt_quality: bool,
    opt_speed: bool,
    paused: bool,
    failure_streak: u32,
    frame_index: u64,
    should_exit: bool,
}

impl FbEngine {
    pub fn new(
        link: Arc<DeviceLink>,
        config: BridgeConfig,
        command_rx: mpsc::Receiver<CaptureCommand>,
        event_tx: mpsc::Sender<BridgeEvent>,
    ) -> Self {
        Self {
            link,
            config,
            adb: AdbExecutor::new(),
            command_rx,
            event_tx,
            state: CaptureState::WaitingForDevice,
            descriptor: None,
            compress_available: None,
            opt_quality: false,
            opt_speed: false,
            paused: false,
            failure_streak: 0,
            frame_index: 0,
            should_exit: false,
        }
    }

    /// Swap the adb executor, e.g. for a non-default client binary.
    pub fn with_executor(mut self, adb: AdbExecutor) -> Self {
        self.adb = adb;
        self
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn descriptor(&self) -> Option<FbDescriptor> {
        self.descriptor
    }

    /// Drive the pipeline until a `Shutdown` command arrives.
    pub async fn run(&mut self) {
        info!("framebuffer pipeline starting");
        while !self.should_exit {
            self.drain_commands();
            if self.should_exit {
                break;
            }
            match self.state {
                CaptureState::WaitingForDevice => self.wait_for_device_cycle().await,
                CaptureState::ProbingCapabilities => self.probe_cycle().await,
                CaptureState::Streaming | CaptureState::Paused => self.stream_cycle().await,
                CaptureState::Disconnected => self.reset_session(),
            }
        }
        if self.adb.is_running() {
            let _ = self.adb.kill().await;
        }
        info!("framebuffer pipeline stopped");
    }

    /// Pause is coarse-grained: commands are taken at the top of a cycle,
    /// so an in-flight capture always completes.
    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                CaptureCommand::SetPaused(paused) => {
                    debug!("capture pause -> {paused}");
                    self.paused = paused;
                }
                CaptureCommand::Shutdown => {
                    self.should_exit = true;
                }
            }
        }
    }

    fn change_state(&mut self, next: CaptureState) {
        if self.state != next {
            debug!("capture state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    // ---- device wait ----

    async fn wait_for_device_cycle(&mut self) {
        match self.wait_for_device().await {
            Ok(true) => {}
            Ok(false) => {
                // The wait ran out without a device showing up.
                self.link.report_wait_timeout().await;
                self.link.increase_delay();
                self.link.loop_delay().await;
            }
            Err(err) => {
                warn!("device wait failed: {err}");
                let _ = self.event_tx.send(BridgeEvent::Error(err.to_string())).await;
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                self.link.increase_delay();
                self.link.loop_delay().await;
            }
        }
    }

    async fn wait_for_device(&mut self) -> AdbResult<bool> {
        debug!("waiting for a device");
        self.adb.clear();
        self.adb.arg("wait-for-device");
        self.adb.start()?;
        if !self.adb.wait(DEVICE_WAIT_TIMEOUT).await? {
            // Scrap this waiter; the next cycle starts a fresh one.
            self.adb.kill().await?;
            return Ok(false);
        }
        if !self.adb.exit_success() {
            return Err(self.adb.exit_failure());
        }
        self.failure_streak = 0;
        self.link.set_connected(true).await;
        self.link.set_delay(self.config.capture_delay_ms);
        self.change_state(CaptureState::ProbingCapabilities);
        Ok(true)
    }

    // ---- capability probing ----

    async fn probe_cycle(&mut self) {
        if self.compress_available.is_none() {
            self.check_compress_support().await;
        }
        self.check_screencap_options().await;
        match self.probe_fb_info().await {
            Ok(()) => {
                let next = if self.paused {
                    CaptureState::Paused
                } else {
                    CaptureState::Streaming
                };
                self.change_state(next);
            }
            Err(err) => {
                if self.adb.is_running() {
                    let _ = self.adb.kill().await;
                }
                self.note_capture_failure(err).await;
                self.link.loop_delay().await;
            }
        }
    }

    /// Compression needs the host decompressor and a device-side gzip for
    /// the capture pipe. Absence of either downgrades the session for
    /// good; that is a capability, not an error.
    async fn check_compress_support(&mut self) {
        if !self.config.enable_compress {
            self.compress_available = Some(false);
            return;
        }
        let host_ok = probe_decompressor(&self.config.decompressor).await;
        let device_ok = if host_ok { self.device_has_gzip().await } else { false };
        let available = host_ok && device_ok;
        if available {
            info!("compressed captures enabled via {}", self.config.decompressor);
        } else if !host_ok {
            warn!(
                "host decompressor '{}' not usable; captures stay uncompressed",
                self.config.decompressor
            );
        } else {
            warn!("device has no gzip; captures stay uncompressed");
        }
        self.compress_available = Some(available);
    }

    async fn device_has_gzip(&mut self) -> bool {
        if self.adb.run_shell(["ls", "/system/bin/gzip"]).await.is_err() {
            return false;
        }
        // Old clients exit 0 either way; the error text lands on stdout.
        self.adb.output_has("gzip") && !self.adb.output_has("No such")
    }

    async fn check_screencap_options(&mut self) {
        self.opt_quality = false;
        self.opt_speed = false;
        if self.adb.run_shell(["screencap", "-h"]).await.is_err() {
            return;
        }
        // Usage text lands on stdout or stderr depending on the build.
        let help = format!("{}\n{}", self.adb.output_text(), self.adb.error_text());
        self.opt_quality = help.contains("-q");
        self.opt_speed = help.contains("-s");
        info!(
            "screencap options: quality={} speed={}",
            self.opt_quality, self.opt_speed
        );
    }

    async fn probe_fb_info(&mut self) -> AdbResult<()> {
        let bytes = self.capture_raw().await?;
        let desc = parse_fb_header(&bytes)?;
        info!(
            "framebuffer: {}x{} {} ({} bpp)",
            desc.width,
            desc.height,
            desc.format,
            desc.bytes_per_pixel()
        );
        self.descriptor = Some(desc);
        self.failure_streak = 0;
        let _ = self
            .event_tx
            .send(BridgeEvent::FramebufferFound {
                width: desc.width,
                height: desc.height,
                format: desc.format,
            })
            .await;
        Ok(())
    }

    // ---- streaming ----

    async fn stream_cycle(&mut self) {
        if self.paused {
            self.change_state(CaptureState::Paused);
        } else {
            self.change_state(CaptureState::Streaming);
            match self.read_frame().await {
                Ok(()) => {
                    self.failure_streak = 0;
                    self.link.set_delay(self.config.capture_delay_ms);
                }
                Err(err) => {
                    if self.adb.is_running() {
                        let _ = self.adb.kill().await;
                    }
                    if matches!(err, AdbError::FrameLengthMismatch { .. }) {
                        // Geometry changed under us (rotation, format
                        // switch); re-probe before the next frame.
                        self.descriptor = None;
                        self.change_state(CaptureState::ProbingCapabilities);
                    }
                    self.note_capture_failure(err).await;
                }
            }
        }
        self.link.loop_delay().await;
    }

    async fn read_frame(&mut self) -> AdbResult<()> {
        let Some(desc) = self.descriptor else {
            self.change_state(CaptureState::ProbingCapabilities);
            return Ok(());
        };
        let started = Instant::now();
        let bytes = self.capture_raw().await?;
        let expected = FB_HEADER_BYTES + desc.frame_len();
        if bytes.len() != expected {
            return Err(AdbError::FrameLengthMismatch {
                got: bytes.len(),
                expected,
            });
        }
        let pixels = &bytes[FB_HEADER_BYTES..];
        let rgb = if desc.format.has_filler_byte() {
            pack_rgb888(pixels)
        } else {
            pixels.to_vec()
        };
        self.frame_index += 1;
        let frame = Frame {
            bytes: rgb,
            width: desc.width,
            height: desc.height,
            duration_ms: started.elapsed().as_millis(),
            index: self.frame_index,
        };
        debug!(
            "frame #{} {}x{} in {}ms",
            frame.index, frame.width, frame.height, frame.duration_ms
        );
        let _ = self.event_tx.send(BridgeEvent::NewFrame(frame)).await;
        Ok(())
    }

    /// One capture round trip: run screencap (with whatever flags the
    /// session supports), undo CRLF cooking, gunzip when compressed.
    async fn capture_raw(&mut self) -> AdbResult<Vec<u8>> {
        let compress = self.compress_available == Some(true);
        let device_cmd = self.build_device_command(compress);
        self.adb.shell([device_cmd]);
        self.adb.run_within(CAPTURE_TIMEOUT).await?;
        if !self.adb.exit_success() {
            return Err(self.adb.exit_failure());
        }
        self.adb.fix_newlines();
        let bytes = self.adb.take_stdout();
        if compress {
            self.decompress(bytes).await
        } else {
            Ok(bytes)
        }
    }

    fn build_device_command(&self, compress: bool) -> String {
        let mut cmd = String::from("screencap");
        if self.opt_quality {
            cmd.push_str(&format!(" -q {}", self.config.screencap_quality));
        }
        if self.opt_speed {
            cmd.push_str(&format!(" -s {}", self.config.screencap_speed));
        }
        if compress {
            cmd.push_str(" | gzip");
        }
        cmd
    }

    async fn decompress(&mut self, bytes: Vec<u8>) -> AdbResult<Vec<u8>> {
        tokio::fs::write(GZ_FILE, &bytes).await?;
        let mut gunzip = HostCommand::new(self.config.decompressor.as_str());
        gunzip.arg("-d").arg(GZ_FILE);
        gunzip.run().await?;
        if !gunzip.exit_success() {
            return Err(AdbError::DecompressFailed {
                program: self.config.decompressor.clone(),
                description: gunzip.error_text().trim().to_string(),
            });
        }
        Ok(tokio::fs::read(GZ_PLAIN_FILE).await?)
    }

    /// Failure policy: payload problems are quietly retried, transport
    /// problems also go out as error events; either way the pace backs
    /// off, and a long streak means the device is gone.
    async fn note_capture_failure(&mut self, err: AdbError) {
        self.failure_streak += 1;
        if err.is_protocol() {
            warn!("capture payload problem ({err}); retrying");
        } else {
            warn!("capture transport problem ({err})");
            let _ = self.event_tx.send(BridgeEvent::Error(err.to_string())).await;
        }
        self.link.increase_delay();
        if self.failure_streak >= self.config.max_capture_failures {
            warn!(
                "{} consecutive capture failures; treating the device as lost",
                self.failure_streak
            );
            self.link.set_connected(false).await;
            self.change_state(CaptureState::Disconnected);
        }
    }

    fn reset_session(&mut self) {
        self.descriptor = None;
        self.opt_quality = false;
        self.opt_speed = false;
        self.failure_streak = 0;
        self.change_state(CaptureState::WaitingForDevice);
    }
}

/// True when the host decompressor can be started at all.
pub async fn probe_decompressor(program: &str) -> bool {
    let mut probe = HostCommand::new(program);
    probe.arg("-h");
    match probe.run().await {
        Ok(()) => true,
        Err(err) => {
            if !err.is_program_missing() {
                debug!("decompressor probe failed: {err}");
            }
            false
        }
    }
}
