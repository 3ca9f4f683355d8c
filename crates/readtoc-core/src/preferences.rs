//! User preferences collaborator
//!
//! Lookups follow key-with-default semantics: `get` returns the stored value
//! for every key that has one and the caller's default for the rest.

use std::cell::RefCell;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Panel offset from its docked position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// When a page session loads without an explicit command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AutoLoad {
    #[serde(rename = "0")]
    Never,
    #[serde(rename = "1")]
    Always,
    /// Feed-reader and Medium pages only
    #[default]
    #[serde(rename = "2")]
    FeedReaders,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceValues {
    pub is_remember_pos: bool,
    pub offset: Offset,
    pub selector_medium: String,
    pub selector_inoreader: String,
    pub is_show_tip: bool,
    pub auto_type: AutoLoad,
}

impl Default for PreferenceValues {
    fn default() -> Self {
        Self {
            is_remember_pos: true,
            offset: Offset::default(),
            selector_medium: "article".to_string(),
            selector_inoreader: ".article_content".to_string(),
            is_show_tip: true,
            auto_type: AutoLoad::default(),
        }
    }
}

impl PreferenceValues {
    /// Defaults overridden by every key present in `patch`
    pub fn with(mut self, patch: &PreferencePatch) -> Self {
        if let Some(v) = patch.is_remember_pos {
            self.is_remember_pos = v;
        }
        if let Some(v) = patch.offset {
            self.offset = v;
        }
        if let Some(v) = &patch.selector_medium {
            self.selector_medium = v.clone();
        }
        if let Some(v) = &patch.selector_inoreader {
            self.selector_inoreader = v.clone();
        }
        if let Some(v) = patch.is_show_tip {
            self.is_show_tip = v;
        }
        if let Some(v) = patch.auto_type {
            self.auto_type = v;
        }
        self
    }
}

/// A partial record; absent keys are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_remember_pos: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_inoreader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_show_tip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_type: Option<AutoLoad>,
}

impl PreferencePatch {
    pub fn offset(offset: Offset) -> Self {
        Self {
            offset: Some(offset),
            ..Default::default()
        }
    }

    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, other: PreferencePatch) {
        self.is_remember_pos = other.is_remember_pos.or(self.is_remember_pos);
        self.offset = other.offset.or(self.offset);
        self.selector_medium = other.selector_medium.or(self.selector_medium.take());
        self.selector_inoreader = other.selector_inoreader.or(self.selector_inoreader.take());
        self.is_show_tip = other.is_show_tip.or(self.is_show_tip);
        self.auto_type = other.auto_type.or(self.auto_type);
    }
}

/// Persisted preference storage
#[async_trait(?Send)]
pub trait Preferences {
    async fn get(&self, defaults: &PreferenceValues) -> Result<PreferenceValues>;

    async fn set(&self, patch: PreferencePatch) -> Result<()>;
}

/// Process-local storage
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    stored: RefCell<PreferencePatch>,
    writes: RefCell<Vec<PreferencePatch>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stored(stored: PreferencePatch) -> Self {
        Self {
            stored: RefCell::new(stored),
            writes: RefCell::new(Vec::new()),
        }
    }

    /// Every patch passed to `set`, in order
    pub fn writes(&self) -> Vec<PreferencePatch> {
        self.writes.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Preferences for MemoryPreferences {
    async fn get(&self, defaults: &PreferenceValues) -> Result<PreferenceValues> {
        Ok(defaults.clone().with(&self.stored.borrow()))
    }

    async fn set(&self, patch: PreferencePatch) -> Result<()> {
        self.writes.borrow_mut().push(patch.clone());
        self.stored.borrow_mut().merge(patch);
        Ok(())
    }
}

/// JSON file storage
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    async fn read(&self) -> Result<PreferencePatch> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(PreferencePatch::default()),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                Error::Preferences(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PreferencePatch::default()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait(?Send)]
impl Preferences for FilePreferences {
    async fn get(&self, defaults: &PreferenceValues) -> Result<PreferenceValues> {
        let stored = self.read().await?;
        Ok(defaults.clone().with(&stored))
    }

    async fn set(&self, patch: PreferencePatch) -> Result<()> {
        let mut stored = self.read().await?;
        stored.merge(patch);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, content).await?;
        debug!(path = %self.path.display(), "preferences saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_get_falls_back_to_defaults() {
        let prefs = MemoryPreferences::new();
        let values = prefs.get(&PreferenceValues::default()).await.unwrap();
        assert!(values.is_remember_pos);
        assert_eq!(values.selector_inoreader, ".article_content");
        assert_eq!(values.auto_type, AutoLoad::FeedReaders);

        prefs
            .set(PreferencePatch::offset(Offset { x: 12.0, y: -4.0 }))
            .await
            .unwrap();
        let values = prefs.get(&PreferenceValues::default()).await.unwrap();
        assert_eq!(values.offset, Offset { x: 12.0, y: -4.0 });
        assert!(values.is_show_tip);
        assert_eq!(prefs.writes().len(), 1);
    }

    #[test]
    fn test_storage_keys_match_the_extension_format() {
        let patch: PreferencePatch =
            serde_json::from_str(r#"{"isRememberPos":false,"autoType":"0","offset":{"x":1,"y":2}}"#)
                .unwrap();
        let values = PreferenceValues::default().with(&patch);
        assert!(!values.is_remember_pos);
        assert_eq!(values.auto_type, AutoLoad::Never);
        assert_eq!(values.offset, Offset { x: 1.0, y: 2.0 });

        let json = serde_json::to_string(&PreferencePatch::offset(Offset::default())).unwrap();
        assert_eq!(json, r#"{"offset":{"x":0.0,"y":0.0}}"#);
    }

    #[test]
    fn test_merge_keeps_absent_keys() {
        let mut stored = PreferencePatch {
            is_show_tip: Some(false),
            selector_medium: Some("main".to_string()),
            ..Default::default()
        };
        stored.merge(PreferencePatch::offset(Offset { x: 3.0, y: 3.0 }));
        assert_eq!(stored.is_show_tip, Some(false));
        assert_eq!(stored.selector_medium.as_deref(), Some("main"));
        assert!(stored.offset.is_some());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("readtoc-prefs-{}", uuid::Uuid::new_v4()));
        let prefs = FilePreferences::new(dir.join("preferences.json"));

        let values = prefs.get(&PreferenceValues::default()).await.unwrap();
        assert_eq!(values, PreferenceValues::default());

        prefs
            .set(PreferencePatch {
                is_remember_pos: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        prefs
            .set(PreferencePatch::offset(Offset { x: 5.0, y: 6.0 }))
            .await
            .unwrap();

        let values = prefs.get(&PreferenceValues::default()).await.unwrap();
        assert!(!values.is_remember_pos);
        assert_eq!(values.offset, Offset { x: 5.0, y: 6.0 });

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_file_corrupt_is_preferences_error() {
        let dir = std::env::temp_dir().join(format!("readtoc-prefs-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = FilePreferences::new(&path).get(&PreferenceValues::default()).await;
        assert!(matches!(result, Err(Error::Preferences(_))));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
