use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::vault::{self, ObfuscationKey};

/// Database file name used by Open WebUI.
pub const DATABASE_FILE: &str = "webui.db";
/// Obfuscated sibling of [`DATABASE_FILE`].
pub const OBFUSCATED_DATABASE_FILE: &str = "webui.db.enc";
/// Path of the database inside the official container image.
const CONTAINER_DATABASE_PATH: &str = "/app/backend/data/webui.db";

/// Where and how to look for the database.
#[derive(Debug, Clone)]
pub struct LocateOptions {
    /// Checked before every built-in candidate
    pub extra_dir: Option<PathBuf>,
    pub home: Option<PathBuf>,
    pub docker_copy: bool,
    /// Obfuscate a freshly copied database with this key
    pub obfuscate_with: Option<ObfuscationKey>,
    pub search_roots: Vec<PathBuf>,
    pub search_depth: usize,
}

impl LocateOptions {
    /// Defaults for the current user: home-relative candidates, container
    /// copy enabled, search under home, `/opt` and `/var/lib`.
    pub fn for_home(home: Option<PathBuf>) -> Self {
        let mut search_roots = Vec::new();
        if let Some(home) = &home {
            search_roots.push(home.clone());
        }
        search_roots.push(PathBuf::from("/opt"));
        search_roots.push(PathBuf::from("/var/lib"));

        Self {
            extra_dir: None,
            home,
            docker_copy: true,
            obfuscate_with: None,
            search_roots,
            search_depth: 4,
        }
    }

    /// Directory a container copy is written to (`~/tmp/openwebui`).
    pub fn copy_dir(&self) -> Option<PathBuf> {
        self.home.as_ref().map(|home| home.join("tmp").join("openwebui"))
    }

    /// Candidate data directories in probe order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = self.extra_dir.iter().cloned().collect();

        if let Some(home) = &self.home {
            candidates.extend([
                home.join("tmp").join("openwebui"),
                home.join("openwebui"),
                home.join("open-webui"),
                home.join("open_webui"),
            ]);
        }
        candidates.extend([PathBuf::from("/app/backend/data"), PathBuf::from("/data")]);
        if let Some(home) = &self.home {
            candidates.extend([
                home.join(".config").join("open-webui"),
                home.join(".local").join("share").join("open-webui"),
            ]);
        }
        candidates.extend([
            PathBuf::from("/opt/open-webui/data"),
            PathBuf::from("/var/lib/open-webui"),
        ]);

        candidates
    }
}

/// Whether `dir` holds a plain or obfuscated database.
pub fn holds_database(dir: &Path) -> bool {
    dir.join(OBFUSCATED_DATABASE_FILE).is_file() || dir.join(DATABASE_FILE).is_file()
}

/// Finds the Open WebUI data directory.
///
/// Probes the candidate directories, then tries to copy the database out of
/// a running container, then searches the filesystem. Every failure along the
/// way is logged and treated as "not found".
pub fn locate_data_dir(options: &LocateOptions) -> Option<PathBuf> {
    if let Some(dir) = options.candidates().into_iter().find(|dir| holds_database(dir)) {
        info!("Found Open WebUI database in {}", dir.display());
        return Some(dir);
    }

    if options.docker_copy {
        if let Some(dir) = copy_from_container(options) {
            return Some(dir);
        }
    }

    if let Some(dir) = search_filesystem(&options.search_roots, options.search_depth) {
        return Some(dir);
    }

    warn!("Open WebUI database not found. Usage data will not be available.");
    None
}

/// Names of running containers that look like Open WebUI.
fn webui_containers() -> Vec<String> {
    let output = match Command::new("docker")
        .args(["ps", "--format", "{{.Names}}"])
        .output()
    {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            debug!("docker ps exited with {}", output.status);
            return Vec::new();
        }
        Err(e) => {
            debug!("docker not available: {}", e);
            return Vec::new();
        }
    };

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|name| name.to_lowercase().contains("webui"))
        .map(str::to_string)
        .collect()
}

/// Copies the database out of the first matching container into `~/tmp/openwebui`.
fn copy_from_container(options: &LocateOptions) -> Option<PathBuf> {
    let target_dir = options.copy_dir()?;

    for container in webui_containers() {
        if let Err(e) = fs::create_dir_all(&target_dir) {
            warn!("Could not create {}: {}", target_dir.display(), e);
            return None;
        }

        let target = target_dir.join(DATABASE_FILE);
        let copied = Command::new("docker")
            .arg("cp")
            .arg(format!("{}:{}", container, CONTAINER_DATABASE_PATH))
            .arg(&target)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false);

        if !copied || !target.is_file() {
            debug!("Could not copy database from container {}", container);
            continue;
        }

        info!("Copied Open WebUI database from container '{}' to {}", container, target.display());
        if let Some(key) = &options.obfuscate_with {
            if let Err(e) = vault::obfuscate_file(&target, key) {
                warn!("Failed to obfuscate copied database: {}", e);
            }
        }
        return Some(target_dir);
    }

    None
}

/// Bounded-depth search for `webui.db` under `roots`.
pub fn search_filesystem(roots: &[PathBuf], max_depth: usize) -> Option<PathBuf> {
    for root in roots.iter().filter(|root| root.is_dir()) {
        let found = WalkDir::new(root)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| entry.file_type().is_file() && entry.file_name() == DATABASE_FILE);

        if let Some(entry) = found {
            let dir = entry.path().parent()?.to_path_buf();
            info!("Found Open WebUI database at {}", entry.path().display());
            return Some(dir);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isolated(home: &Path) -> LocateOptions {
        LocateOptions {
            extra_dir: None,
            home: Some(home.to_path_buf()),
            docker_copy: false,
            obfuscate_with: None,
            search_roots: vec![home.to_path_buf()],
            search_depth: 4,
        }
    }

    #[test]
    fn test_candidate_order() {
        let mut options = isolated(Path::new("/home/u"));
        options.extra_dir = Some(PathBuf::from("/srv/webui"));
        let candidates = options.candidates();

        assert_eq!(candidates[0], PathBuf::from("/srv/webui"));
        assert_eq!(candidates[1], PathBuf::from("/home/u/tmp/openwebui"));
        assert!(candidates.contains(&PathBuf::from("/home/u/.local/share/open-webui")));
        assert_eq!(candidates.last().unwrap(), &PathBuf::from("/var/lib/open-webui"));
    }

    #[test]
    fn test_extra_dir_with_obfuscated_database() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join(OBFUSCATED_DATABASE_FILE), b"x").unwrap();

        let mut options = isolated(dir.path());
        options.extra_dir = Some(data.clone());
        assert_eq!(locate_data_dir(&options), Some(data));
    }

    #[test]
    fn test_home_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("open-webui");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join(DATABASE_FILE), b"x").unwrap();

        assert_eq!(locate_data_dir(&isolated(dir.path())), Some(data));
    }

    #[test]
    fn test_search_fallback_respects_depth() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(DATABASE_FILE), b"x").unwrap();

        let roots = vec![dir.path().to_path_buf()];
        assert_eq!(search_filesystem(&roots, 3), Some(nested));
        assert_eq!(search_filesystem(&roots, 2), None);
    }
}
