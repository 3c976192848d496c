/// Inject a raw sendevent tap at the given screen coordinates
/// Run with: cargo run --example send_tap -- 540 960
use std::time::Duration;

use android_adb_screen::adb::{AdbExecutor, DeviceLink, ensure_adb_available};
use android_adb_screen::config::BridgeConfig;
use android_adb_screen::events::{BridgeEvent, create_event_channel};
use android_adb_screen::input::{InputCommand, InputEngine, create_input_channels};
use tokio::time::timeout;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    println!("👆 Raw Tap Injection Demo\n");

    let mut args = std::env::args().skip(1);
    let (x, y) = match (
        args.next().and_then(|v| v.parse::<u32>().ok()),
        args.next().and_then(|v| v.parse::<u32>().ok()),
    ) {
        (Some(x), Some(y)) => (x, y),
        _ => {
            println!("❌ Usage: cargo run --example send_tap -- <x> <y>");
            return;
        }
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run(x, y));
}

async fn run(x: u32, y: u32) {
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

    // Step 4: Send the tap
    println!("👆 Tapping at ({x}, {y})...");
    let _ = input_tx
        .send(InputCommand::VirtualClick {
            x,
            y,
            press: true,
            release: true,
        })
        .await;

    // Step 5: A quiet event stream means the tap went out; an Error event
    // means the dispatch failed on the device
    loop {
        match timeout(Duration::from_secs(2), event_rx.recv()).await {
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
                println!("✅ Tap delivered");
                break;
            }
        }
    }

    // Step 6: Shut the engine down
    let _ = input_tx.send(InputCommand::Shutdown).await;
    let _ = timeout(Duration::from_secs(5), engine_task).await;
    println!("\n👋 Done");
}
