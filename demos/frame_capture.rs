/// Stream framebuffer frames from an attached device, save the first one
/// as a PNG, and report the capture rate
/// Run with: cargo run --example frame_capture
use std::time::{Duration, Instant};

use android_adb_screen::adb::{DeviceLink, ensure_adb_available};
use android_adb_screen::config::BridgeConfig;
use android_adb_screen::events::{BridgeEvent, create_event_channel};
use android_adb_screen::framebuffer::{CaptureCommand, FbEngine, create_capture_channels};
use android_adb_screen::png::save_frame_png;
use tokio::time::timeout;

const FRAME_GOAL: u64 = 20;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("📸 Framebuffer Capture Demo\n");

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run());
}

async fn run() {
    // Step 1: Check the adb client is reachable
    println!("🔍 Checking for the adb client...");
    match ensure_adb_available().await {
        Ok(banner) => println!("✅ {banner}\n"),
        Err(e) => {
            println!("❌ {e}");
            return;
        }
    }

    // Step 2: Start the capture pipeline; it waits for the device itself
    let (event_tx, mut event_rx) = create_event_channel();
    let (capture_tx, capture_rx) = create_capture_channels();
    let link = DeviceLink::new(event_tx.clone());
    let mut engine = FbEngine::new(link.clone(), BridgeConfig::default(), capture_rx, event_tx);
    let engine_task = tokio::spawn(async move { engine.run().await });

    println!("📱 Waiting for a device (USB debugging on)...");

    // Step 3: Collect frames off the event stream
    let mut frames = 0u64;
    let mut streaming_since: Option<Instant> = None;
    let mut paused_once = false;
    loop {
        let event = match timeout(Duration::from_secs(60), event_rx.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                println!("❌ Event stream closed early");
                break;
            }
            Err(_) => {
                println!("⏰ Nothing happened for 60s, giving up");
                break;
            }
        };
        match event {
            BridgeEvent::DeviceFound => println!("✅ Device detected"),
            BridgeEvent::DeviceWaitTimeout => println!("⏳ Still waiting for a device..."),
            BridgeEvent::DeviceDisconnected => {
                println!("🔌 Device disconnected, stopping");
                break;
            }
            BridgeEvent::FramebufferFound {
                width,
                height,
                format,
            } => {
                println!("🖼️  Framebuffer probed: {width}x{height} {format}\n");
                streaming_since = Some(Instant::now());
            }
            BridgeEvent::NewFrame(frame) => {
                frames += 1;
                if frames == 1 && !paused_once {
                    println!(
                        "1️⃣  First frame: {}x{}, {} bytes, {}ms",
                        frame.width,
                        frame.height,
                        frame.bytes.len(),
                        frame.duration_ms
                    );
                    match save_frame_png(&frame, "demo_frame.png").await {
                        Ok(()) => println!("   💾 Saved to: demo_frame.png"),
                        Err(e) => println!("   ⚠️  Could not save: {e}"),
                    }
                }
                if frames == FRAME_GOAL {
                    if let Some(since) = streaming_since {
                        let elapsed = since.elapsed().as_secs_f32();
                        println!(
                            "📊 {FRAME_GOAL} frames in {:.1}s ({:.1} frames/s)",
                            elapsed,
                            FRAME_GOAL as f32 / elapsed
                        );
                    }
                    // Step 4: Exercise pause/resume before leaving
                    if !paused_once {
                        paused_once = true;
                        println!("⏸️  Pausing capture for 2s...");
                        let _ = capture_tx.send(CaptureCommand::SetPaused(true)).await;
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        println!("▶️  Resuming...");
                        let _ = capture_tx.send(CaptureCommand::SetPaused(false)).await;
                        frames = 0;
                        streaming_since = Some(Instant::now());
                        continue;
                    }
                    break;
                }
            }
            BridgeEvent::Error(text) => println!("❌ {text}"),
            BridgeEvent::Prompt(text) => println!("💬 {text}"),
            _ => {}
        }
    }

    // Step 5: Shut the pipeline down
    let _ = capture_tx.send(CaptureCommand::Shutdown).await;
    let _ = timeout(Duration::from_secs(5), engine_task).await;
    println!("\n👋 Done");
}
