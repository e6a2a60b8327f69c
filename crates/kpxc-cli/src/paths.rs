//! Default socket and identity locations.

use std::path::{Path, PathBuf};

/// Socket names KeePassXC has used, newest first.
pub const SOCKET_NAMES: [&str; 2] = ["org.keepassxc.KeePassXC.BrowserServer", "kpxc_server"];

/// Sockets to try in order. An explicit path is the only candidate.
pub fn socket_candidates(explicit: Option<&Path>, runtime_dir: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    let dir = runtime_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(std::env::temp_dir);
    SOCKET_NAMES.iter().map(|name| dir.join(name)).collect()
}

/// `$XDG_DATA_HOME/kpxcpc/identity.json`, or under `$HOME/.local/share`.
pub fn default_identity_path(data_home: Option<&Path>, home: Option<&Path>) -> PathBuf {
    let data_home = match data_home.filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.to_path_buf(),
        None => home
            .unwrap_or_else(|| Path::new("."))
            .join(".local")
            .join("share"),
    };
    data_home.join("kpxcpc").join("identity.json")
}
