use std::time::Duration;

use tokio::sync::mpsc;

use android_adb_screen::adb::{DeviceLink, ensure_adb_available};
use android_adb_screen::args::{Args, Mode};
use android_adb_screen::config::BridgeConfig;
use android_adb_screen::events::{BridgeEvent, create_event_channel};
use android_adb_screen::framebuffer::{CaptureCommand, FbEngine, create_capture_channels};
use android_adb_screen::input::{InputCommand, InputEngine, create_input_channels};
use android_adb_screen::png::save_frame_png;

fn main() {
    let Some(args) = Args::parse() else {
        return;
    };
    init_logging(args.debug_mode);

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run_bridge(args));
}

fn init_logging(debug_mode: bool) {
    let default_filter = if debug_mode { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

async fn run_bridge(args: Args) {
    match ensure_adb_available().await {
        Ok(banner) => println!("🔌 {banner}"),
        Err(err) => {
            println!("❌ {err}");
            return;
        }
    }

    let mut config = BridgeConfig::default();
    if let Some(delay) = args.capture_delay_ms {
        config.capture_delay_ms = delay;
    }
    if args.no_compress {
        config.enable_compress = false;
    }
    if let Some(program) = args.decompressor {
        config.decompressor = program;
    }

    let (event_tx, event_rx) = create_event_channel();
    let link = DeviceLink::new(event_tx.clone());
    let (capture_tx, capture_rx) = create_capture_channels();
    let (input_tx, input_rx) = create_input_channels();

    let mut fb_engine = FbEngine::new(link.clone(), config.clone(), capture_rx, event_tx.clone());
    let mut input_engine = InputEngine::new(link, config, input_rx, event_tx);
    let fb_task = tokio::spawn(async move { fb_engine.run().await });
    let input_task = tokio::spawn(async move { input_engine.run().await });

    let session = drive_mode(args.mode, event_rx, &input_tx);
    match args.timeout_secs {
        Some(secs) => {
            if tokio::time::timeout(Duration::from_secs(secs), session)
                .await
                .is_err()
            {
                println!("⏰ Timeout after {secs}s, shutting down");
            }
        }
        None => session.await,
    }

    let _ = capture_tx.send(CaptureCommand::Shutdown).await;
    let _ = input_tx.send(InputCommand::Shutdown).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), fb_task).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), input_task).await;
    println!("👋 Bridge stopped");
}

async fn drive_mode(
    mode: Mode,
    mut event_rx: mpsc::Receiver<BridgeEvent>,
    input_tx: &mpsc::Sender<InputCommand>,
) {
    match mode {
        Mode::Run => {
            println!("🚀 Streaming bridge events (Ctrl-C to stop)...");
            while let Some(event) = event_rx.recv().await {
                print_event(&event);
            }
        }
        Mode::Screenshot => {
            println!("📸 Waiting for the first frame...");
            while let Some(event) = event_rx.recv().await {
                if let BridgeEvent::NewFrame(frame) = &event {
                    match save_frame_png(frame, "cli-screenshot.png").await {
                        Ok(()) => println!(
                            "✅ Screenshot #{} ({}ms) saved to cli-screenshot.png",
                            frame.index, frame.duration_ms
                        ),
                        Err(err) => println!("❌ Screenshot save failed: {err}"),
                    }
                    break;
                }
                print_event(&event);
            }
        }
        Mode::Wake => {
            println!("🔑 Waking the device once it connects...");
            let mut requested = false;
            while let Some(event) = event_rx.recv().await {
                match &event {
                    BridgeEvent::DeviceFound => {
                        print_event(&event);
                        let _ = input_tx.send(InputCommand::ProbePowerKeys).await;
                        let _ = input_tx.send(InputCommand::WakeUp).await;
                        requested = true;
                    }
                    BridgeEvent::Prompt(_) if requested => {
                        print_event(&event);
                        break;
                    }
                    BridgeEvent::Error(_) if requested => {
                        print_event(&event);
                        break;
                    }
                    other => print_event(other),
                }
            }
        }
        Mode::Tap { x, y } => {
            println!("👉 Tapping ({x}, {y}) once the device connects...");
            let mut sent = false;
            loop {
                match tokio::time::timeout(Duration::from_secs(2), event_rx.recv()).await {
                    Ok(Some(event)) => match &event {
                        BridgeEvent::DeviceFound => {
                            print_event(&event);
                            let _ = input_tx
                                .send(InputCommand::VirtualClick {
                                    x,
                                    y,
                                    press: true,
                                    release: true,
                                })
                                .await;
                            sent = true;
                        }
                        BridgeEvent::Error(_) if sent => {
                            print_event(&event);
                            break;
                        }
                        other => print_event(other),
                    },
                    Ok(None) => break,
                    // Two quiet seconds after the tap means it went out.
                    Err(_) if sent => {
                        println!("✅ Tap delivered");
                        break;
                    }
                    Err(_) => {}
                }
            }
        }
    }
}

fn print_event(event: &BridgeEvent) {
    match event {
        BridgeEvent::DeviceFound => println!("📱 Device connected"),
        BridgeEvent::DeviceWaitTimeout => println!("⏳ Still waiting for a device..."),
        BridgeEvent::DeviceDisconnected => println!("🔌 Device disconnected"),
        BridgeEvent::ScreenTurnedOn => println!("💡 Screen turned on"),
        BridgeEvent::ScreenTurnedOff => println!("🌑 Screen turned off"),
        BridgeEvent::FramebufferFound {
            width,
            height,
            format,
        } => println!("🖼️ Framebuffer: {width}x{height} {format}"),
        BridgeEvent::NewFrame(frame) => println!(
            "📸 Frame #{} {}x{} ({} bytes, {}ms)",
            frame.index,
            frame.width,
            frame.height,
            frame.bytes.len(),
            frame.duration_ms
        ),
        BridgeEvent::Error(msg) => println!("❌ {msg}"),
        BridgeEvent::Prompt(msg) => println!("💬 {msg}"),
    }
}
