//! Test fixture helpers for creating temporary test data.
//!
//! Everything lives in a `TempDir` and is removed when the fixture drops.

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

/// Source images in a temporary directory.
pub struct SourceImages {
    pub dir: TempDir,
}

impl SourceImages {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write a solid-color image; the format follows the extension.
    ///
    /// # Panics
    ///
    /// Panics if the image cannot be written.
    #[must_use]
    pub fn image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 80, 40]));
        let path = self.dir.path().join(name);
        img.save(&path)
            .unwrap_or_else(|e| panic!("Failed to save image at {path:?}: {e}"));
        path
    }

    /// Write a small JPEG and return its path and exact bytes.
    #[must_use]
    pub fn jpeg(&self, name: &str) -> (PathBuf, Vec<u8>) {
        let img = RgbImage::from_fn(16, 12, |x, y| Rgb([(x * 15) as u8, (y * 20) as u8, 90]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .expect("Failed to encode JPEG");
        let path = self.dir.path().join(name);
        std::fs::write(&path, &bytes).expect("Failed to write JPEG");
        (path, bytes)
    }

    /// Write arbitrary bytes under `name`.
    #[must_use]
    pub fn raw(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, bytes).expect("Failed to write file");
        path
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Path as `&str` for CLI arguments and channel calls.
///
/// # Panics
///
/// Panics if the path is not valid UTF-8.
#[must_use]
pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("Path is not valid UTF-8")
}

/// An isolated store root with a config file pointing at it.
pub struct Workspace {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl Workspace {
    /// Config with `store_dir = "store"` plus any extra TOML lines.
    #[must_use]
    pub fn new(extra_toml: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = dir.path().join("config.toml");
        let content = format!("store_dir = \"store\"\nconsent_timeout_secs = 5\n{extra_toml}\n");
        std::fs::write(&config_path, content).expect("Failed to write config file");
        Self { dir, config_path }
    }

    #[must_use]
    pub fn store_dir(&self) -> PathBuf {
        self.dir.path().join("store")
    }

    #[must_use]
    pub fn config_str(&self) -> &str {
        path_str(&self.config_path)
    }

    /// Visible files under the store's `relative_path`, sorted.
    #[must_use]
    pub fn files_in(&self, relative_path: &str) -> Vec<String> {
        let dir = self.store_dir().join(relative_path);
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .filter(|n| !n.starts_with('.'))
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}
