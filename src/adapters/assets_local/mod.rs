// Local asset adapter - Font index and media lookup on the filesystem

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::errors::*;
use crate::ports::AssetPort;

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

/// Resolves fonts from indexed directories and media from asset roots
pub struct LocalAssetResolver {
    /// Lowercased file stem and file name to font path
    fonts: HashMap<String, PathBuf>,
    asset_dirs: Vec<PathBuf>,
}

impl LocalAssetResolver {
    /// Index every font file below the given directories.
    ///
    /// Missing directories are skipped with a warning. When two files share a
    /// name the first one in sorted walk order wins.
    pub fn new(font_dirs: &[PathBuf], asset_dirs: Vec<PathBuf>) -> Self {
        let mut fonts = HashMap::new();
        for dir in font_dirs {
            if !dir.is_dir() {
                warn!(dir = %dir.display(), "font directory does not exist");
                continue;
            }
            let walker = WalkDir::new(dir)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file());
            for entry in walker {
                let path = entry.path();
                let is_font = path
                    .extension()
                    .map(|ext| FONT_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
                    .unwrap_or(false);
                if !is_font {
                    continue;
                }
                for key in [path.file_stem(), path.file_name()].into_iter().flatten() {
                    fonts
                        .entry(key.to_string_lossy().to_lowercase())
                        .or_insert_with(|| path.to_path_buf());
                }
            }
        }
        debug!(fonts = fonts.len(), "indexed font directories");
        Self { fonts, asset_dirs }
    }

    /// Number of index keys (stem and file name per font)
    pub fn indexed_keys(&self) -> usize {
        self.fonts.len()
    }
}

impl AssetPort for LocalAssetResolver {
    fn resolve_font(&self, font_id: &str) -> Result<String, DomainError> {
        let direct = Path::new(font_id);
        if direct.is_absolute() && direct.is_file() {
            return Ok(font_id.to_string());
        }
        self.fonts
            .get(&font_id.to_lowercase())
            .map(|path| path.to_string_lossy().to_string())
            .ok_or_else(|| {
                DomainError::CompositionInvalid(format!(
                    "font '{}' is not available in the configured font directories",
                    font_id
                ))
            })
    }

    fn resolve_media(&self, source: &str) -> Result<String, DomainError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(source.to_string());
        }

        let path = Path::new(source);
        if path.components().any(|c| c == Component::ParentDir) {
            return Err(DomainError::CompositionInvalid(format!(
                "media '{}' must not traverse parent directories",
                source
            )));
        }
        if path.is_absolute() {
            return if path.is_file() {
                Ok(source.to_string())
            } else {
                Err(missing_media(source))
            };
        }

        let found = if self.asset_dirs.is_empty() {
            path.is_file().then(|| path.to_path_buf())
        } else {
            self.asset_dirs
                .iter()
                .map(|dir| dir.join(path))
                .find(|candidate| candidate.is_file())
        };
        found
            .map(|p| p.to_string_lossy().to_string())
            .ok_or_else(|| missing_media(source))
    }
}

fn missing_media(source: &str) -> DomainError {
    DomainError::CompositionInvalid(format!(
        "media '{}' was not found in the asset directories",
        source
    ))
}
