/// Datastore seam for solved captchas.
///
/// Training needs screenshots plus the click positions that solved them;
/// where those live (SQLite, a service, a directory of files) is the
/// caller's business. Implementations return index-aligned paths and
/// region-relative positions and may return fewer than requested.
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::SolverResult;

pub trait CaptchaStore {
    /// Up to `count` solved captchas: screenshot paths and the
    /// region-relative pixel positions that were clicked, index-aligned.
    fn get_solved_captchas(&self, count: usize) -> SolverResult<(Vec<PathBuf>, Vec<(f32, f32)>)>;
}

/// Directory-backed store: screenshots in a directory next to an
/// `index.toml` listing each file and its solved position.
///
/// ```toml
/// [[captchas]]
/// file = "c41.png"
/// x = 120.0
/// y = 88.5
/// ```
pub struct DirectoryStore {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    captchas: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    file: String,
    x: f32,
    y: f32,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CaptchaStore for DirectoryStore {
    fn get_solved_captchas(&self, count: usize) -> SolverResult<(Vec<PathBuf>, Vec<(f32, f32)>)> {
        let content = std::fs::read_to_string(self.root.join("index.toml"))?;
        let index: IndexFile = toml::from_str(&content)?;

        let mut paths = Vec::new();
        let mut positions = Vec::new();
        for entry in index.captchas.into_iter().take(count) {
            paths.push(self.root.join(&entry.file));
            positions.push((entry.x, entry.y));
        }

        tracing::debug!(
            requested = count,
            returned = paths.len(),
            root = %self.root.display(),
            "solved captchas listed"
        );
        Ok((paths, positions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_store_lists_up_to_count() {
        let dir = std::env::temp_dir().join(format!("clickpoint-store-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("index.toml"),
            r#"
[[captchas]]
file = "a.png"
x = 1.0
y = 2.0

[[captchas]]
file = "b.png"
x = 3.0
y = 4.0
"#,
        )
        .unwrap();

        let store = DirectoryStore::new(&dir);
        let (paths, positions) = store.get_solved_captchas(10).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0], dir.join("a.png"));
        assert_eq!(positions, vec![(1.0, 2.0), (3.0, 4.0)]);

        let (paths, positions) = store.get_solved_captchas(1).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(positions.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }
}
