/// Compile-time build metadata produced by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub timestamp: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

impl BuildMetadata {
    pub fn summary(&self) -> String {
        format!(
            "txn_summary {} ({} {}, built {} with {})",
            self.version, self.git_hash, self.profile, self.timestamp, self.rustc
        )
    }
}

pub fn current() -> BuildMetadata {
    BuildMetadata {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("TXN_SUMMARY_BUILD_HASH").unwrap_or("unknown"),
        timestamp: option_env!("TXN_SUMMARY_BUILD_TIMESTAMP").unwrap_or("unknown"),
        profile: option_env!("TXN_SUMMARY_BUILD_PROFILE").unwrap_or("unknown"),
        rustc: option_env!("TXN_SUMMARY_BUILD_RUSTC").unwrap_or("unknown"),
    }
}
