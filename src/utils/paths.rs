use dirs::home_dir;
use std::{
    env, fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

const HOME_ENV: &str = "TXN_SUMMARY_HOME";
const DEFAULT_DIR_NAME: &str = ".txn_summary";
const CONFIG_DIR: &str = "config";
const CONFIG_FILE: &str = "config.json";
const DATA_DIR: &str = "data";

/// Resolves on-disk locations relative to an application home directory.
pub struct PathResolver;

impl PathResolver {
    /// `$TXN_SUMMARY_HOME`, falling back to `~/.txn_summary`.
    pub fn base_dir() -> PathBuf {
        if let Some(custom) = env::var_os(HOME_ENV) {
            return PathBuf::from(custom);
        }
        home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DIR_NAME)
    }

    pub fn resolve_base(custom: Option<PathBuf>) -> PathBuf {
        custom.unwrap_or_else(Self::base_dir)
    }

    pub fn config_dir_in(base: &Path) -> PathBuf {
        base.join(CONFIG_DIR)
    }

    pub fn config_file_in(base: &Path) -> PathBuf {
        Self::config_dir_in(base).join(CONFIG_FILE)
    }

    pub fn data_dir_in(base: &Path) -> PathBuf {
        base.join(DATA_DIR)
    }
}

pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Stages `data` in a uniquely named sibling and renames it into place, so
/// concurrent writers never share a staging file.
pub fn write_atomic(path: &Path, data: &str) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;
    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(data.as_bytes())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Maps a collection name to a file-system friendly stem.
pub fn canonical_name(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '-' => c,
            _ => '_',
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        "collection".into()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_sanitizes() {
        assert_eq!(canonical_name("Transaction Summary"), "transaction_summary");
        assert_eq!(canonical_name("  "), "collection");
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");
        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn concurrent_writers_do_not_share_staging_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.json");
        std::thread::scope(|scope| {
            for writer in 0..8 {
                let path = &path;
                scope.spawn(move || {
                    for round in 0..20 {
                        write_atomic(path, &format!("{writer}-{round}")).unwrap();
                    }
                });
            }
        });
        assert!(fs::read_to_string(&path).unwrap().contains('-'));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
