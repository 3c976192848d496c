use std::env;

#[derive(Debug, Clone)]
pub enum Mode {
    Run,
    Screenshot,
    Wake,
    Tap { x: u32, y: u32 },
}

#[derive(Debug)]
pub struct Args {
    pub mode: Mode,
    pub debug_mode: bool,
    pub capture_delay_ms: Option<u64>,
    pub no_compress: bool,
    pub decompressor: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Args {
    pub fn parse() -> Option<Self> {
        let args: Vec<String> = env::args().collect();

        let mut mode: Option<Mode> = None;
        let mut debug_mode: bool = false;
        let mut capture_delay_ms: Option<u64> = None;
        let mut no_compress: bool = false;
        let mut decompressor: Option<String> = None;
        let mut timeout_secs: Option<u64> = None;

        for arg in args.iter().skip(1) {
            if arg == "--help" || arg == "-h" {
                print_help();
                return None;
            } else if arg == "--version" || arg == "-v" {
                println!("Android ADB Screen v{}", env!("APP_VERSION_DISPLAY"));
                return None;
            } else if arg == "--debug" {
                debug_mode = true;
            } else if arg == "--screenshot" || arg == "-s" {
                mode = Some(Mode::Screenshot);
            } else if arg == "--wake" {
                mode = Some(Mode::Wake);
            } else if let Some(val) = arg.strip_prefix("--tap=") {
                match parse_tap(val) {
                    Some((x, y)) => mode = Some(Mode::Tap { x, y }),
                    None => {
                        eprintln!("❌ Invalid tap position: {} (expected --tap=X,Y)", val);
                        return None;
                    }
                }
            } else if let Some(val) = arg.strip_prefix("--delay=") {
                match val.parse::<u64>() {
                    Ok(ms) => capture_delay_ms = Some(ms),
                    Err(_) => {
                        eprintln!("❌ Invalid delay value: {}", val);
                        return None;
                    }
                }
            } else if arg == "--no-compress" {
                no_compress = true;
            } else if let Some(val) = arg.strip_prefix("--decompressor=") {
                if val.is_empty() {
                    eprintln!("❌ Invalid decompressor (expected --decompressor=PROGRAM)");
                    return None;
                }
                decompressor = Some(val.to_string());
            } else if let Some(val) = arg.strip_prefix("--timeout=") {
                match val.parse::<u64>() {
                    Ok(secs) => timeout_secs = Some(secs),
                    Err(_) => {
                        eprintln!("❌ Invalid timeout value: {}", val);
                        return None;
                    }
                }
            } else {
                eprintln!("❌ Unknown argument: {}", arg);
                print_help();
                return None;
            }
        }

        Some(Args {
            mode: mode.unwrap_or(Mode::Run),
            debug_mode,
            capture_delay_ms,
            no_compress,
            decompressor,
            timeout_secs,
        })
    }
}

/// Parse the `X,Y` payload of a `--tap=` flag.
fn parse_tap(value: &str) -> Option<(u32, u32)> {
    let (x, y) = value.split_once(',')?;
    let x = x.trim().parse().ok()?;
    let y = y.trim().parse().ok()?;
    Some((x, y))
}

fn print_help() {
    println!("🤖 Android Screen Bridge");
    println!();
    println!("USAGE:");
    println!("    android-adb-screen [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("    (no flags)          Stream bridge events to stdout");
    println!("    --screenshot, -s    Capture one frame and save it to cli-screenshot.png");
    println!("    --wake              Wake the device screen via its power key");
    println!("    --tap=X,Y           Send a single tap at the given position");
    println!("    --delay=MS          Capture pacing delay in milliseconds");
    println!("    --no-compress       Never pipe captures through gzip");
    println!("    --decompressor=P    Host program that inflates captures (default: minigzip)");
    println!("    --debug             Enable debug logging");
    println!("    --timeout=N         Auto-exit after N seconds (for testing)");
    println!("    --help, -h          Show this help message");
    println!("    --version, -v       Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    android-adb-screen --screenshot");
    println!("    android-adb-screen --wake");
    println!("    android-adb-screen --tap=240,400");
    println!("    android-adb-screen --delay=200 --debug");
}
