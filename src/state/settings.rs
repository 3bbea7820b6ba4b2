// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_LIMIT};
use crate::source::Collection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not determine config directory")]
    NoConfigDir,
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Persistent feed settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Page size for the home feed and per-user post feeds
    #[serde(default = "default_page_size")]
    pub posts_page_size: usize,
    #[serde(default = "default_page_size")]
    pub favorites_page_size: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            posts_page_size: DEFAULT_PAGE_SIZE,
            favorites_page_size: DEFAULT_PAGE_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl FeedSettings {
    /// Uniform page size for every collection
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            posts_page_size: page_size,
            favorites_page_size: page_size,
            ..Self::default()
        }
        .normalized()
    }

    /// Page size used when fetching `collection`
    pub fn page_size_for(&self, collection: Collection) -> usize {
        match collection {
            Collection::Posts => self.posts_page_size,
            Collection::Favorites => self.favorites_page_size,
        }
    }

    /// Zero sizes would make every page look exhausted; clamp to 1
    pub fn normalized(mut self) -> Self {
        self.posts_page_size = self.posts_page_size.max(1);
        self.favorites_page_size = self.favorites_page_size.max(1);
        self.search_limit = self.search_limit.max(1);
        self
    }

    /// Get the settings file path (~/.config/io.github.photofeed.PhotoFeed/settings.json)
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load settings from `path`, falling back to defaults when unreadable
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str::<Self>(&contents)
                .unwrap_or_default()
                .normalized(),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("settings.json");
        let settings = FeedSettings {
            posts_page_size: 4,
            favorites_page_size: 6,
            search_limit: 3,
        };

        settings.save_to(&path).unwrap();
        assert_eq!(FeedSettings::load_from(&path), settings);
    }

    #[test]
    fn missing_fields_and_garbage_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        std::fs::write(&path, r#"{"posts_page_size": 0}"#).unwrap();
        let partial = FeedSettings::load_from(&path);
        assert_eq!(partial.posts_page_size, 1);
        assert_eq!(partial.favorites_page_size, DEFAULT_PAGE_SIZE);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(FeedSettings::load_from(&path), FeedSettings::default());

        assert_eq!(
            FeedSettings::load_from(&dir.path().join("absent.json")),
            FeedSettings::default()
        );
    }

    #[test]
    fn page_size_follows_collection() {
        let settings = FeedSettings {
            posts_page_size: 12,
            favorites_page_size: 8,
            search_limit: 10,
        };
        assert_eq!(settings.page_size_for(Collection::Posts), 12);
        assert_eq!(settings.page_size_for(Collection::Favorites), 8);
    }
}
