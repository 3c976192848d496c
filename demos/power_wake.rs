/// Probe the power key layouts on an attached device and wake its screen
/// Run with: cargo run --example power_wake
use std::time::Duration;

use android_adb_screen::adb::{AdbExecutor, DeviceLink, ensure_adb_available};
use android_adb_screen::config::BridgeConfig;
use android_adb_screen::events::{BridgeEvent, create_event_channel};
use android_adb_screen::input::{InputCommand, InputEngine, create_input_channels};
use tokio::time::timeout;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("🔋 Power Key Wake Demo\n");

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

    // Step 2: Wait for a device
    println!("📱 Waiting for a device (USB debugging on, 30s limit)...");
    let mut adb = AdbExecutor::new();
    adb.clear().arg("wait-for-device");
    match adb.run_within(Duration::from_secs(30)).await {
        Ok(()) => println!("✅ Device detected\n"),
        Err(e) => {
            if adb.is_running() {
                let _ = adb.kill().await;
            }
            println!("❌ No device showed up: {e}");
            return;
        }
    }

    // Step 3: Start the input engine and hand it the connection
    let (event_tx, mut event_rx) = create_event_channel();
    let (input_tx, input_rx) = create_input_channels();
    let link = DeviceLink::new(event_tx.clone());
    let mut engine = InputEngine::new(link.clone(), BridgeConfig::default(), input_rx, event_tx);
    let engine_task = tokio::spawn(async move { engine.run().await });
    link.set_connected(true).await;

    // Step 4: Ask for discovery, then for the wake itself
    println!("🔎 Probing /proc/bus/input/devices for power-capable layouts...");
    let _ = input_tx.send(InputCommand::ProbePowerKeys).await;
    let _ = input_tx.send(InputCommand::WakeUp).await;

    // Step 5: Watch the event stream until the wake resolves
    loop {
        match timeout(Duration::from_secs(20), event_rx.recv()).await {
            Ok(Some(BridgeEvent::DeviceFound)) => println!("📱 Device session opened"),
            Ok(Some(BridgeEvent::ScreenTurnedOn)) => println!("💡 Screen reported on"),
            Ok(Some(BridgeEvent::Prompt(text))) => {
                println!("💬 {text}");
                break;
            }
            Ok(Some(BridgeEvent::Error(text))) => {
                println!("❌ {text}");
                break;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                println!("❌ Event stream closed early");
                break;
            }
            Err(_) => {
                println!("⏰ No wake verdict within 20s, giving up");
                break;
            }
        }
    }

    // Step 6: Shut the engine down
    let _ = input_tx.send(InputCommand::Shutdown).await;
    let _ = timeout(Duration::from_secs(5), engine_task).await;
    println!("\n👋 Done");
}
