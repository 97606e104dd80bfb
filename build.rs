use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let git_hash = capture("git", &["rev-parse", "--short", "HEAD"]).unwrap_or_else(unknown);
    println!("cargo:rustc-env=TXN_SUMMARY_BUILD_HASH={git_hash}");

    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    println!("cargo:rustc-env=TXN_SUMMARY_BUILD_TIMESTAMP={timestamp}");

    let profile = env::var("PROFILE").unwrap_or_else(|_| unknown());
    println!("cargo:rustc-env=TXN_SUMMARY_BUILD_PROFILE={profile}");

    let rustc = capture("rustc", &["--version"]).unwrap_or_else(unknown);
    println!("cargo:rustc-env=TXN_SUMMARY_BUILD_RUSTC={rustc}");
}

fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn unknown() -> String {
    "unknown".to_string()
}
