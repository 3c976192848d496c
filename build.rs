use std::env;
use std::process::Command;
use time::OffsetDateTime;

fn build_year() -> i32 {
    env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .map(|dt| dt.year())
        .unwrap_or_else(|| OffsetDateTime::now_utc().year())
}

/// Returns the exact tag name when HEAD sits on one.
fn git_exact_tag() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--exact-match"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");

    println!("cargo:rustc-env=APP_BUILD_YEAR={}", build_year());

    let version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    // Untagged working trees get a -dev marker so field reports are unambiguous.
    let display = if git_exact_tag().as_deref() == Some(&format!("v{version}")) {
        version.clone()
    } else {
        format!("{version}-dev")
    };

    println!("cargo:rustc-env=APP_VERSION_DISPLAY={display}");
    println!("cargo:rustc-env=APP_VERSION_SEMVER={version}");
}
