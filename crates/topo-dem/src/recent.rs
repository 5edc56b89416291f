//! History of recently opened databases.

use crate::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Entries kept by default.
pub const DEFAULT_MAX_RECENT: usize = 10;

/// Whether a recent entry is a single DEM file or a tile folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseType {
    SingleFile,
    MultiFile,
}

impl DatabaseType {
    /// Whether `path` still holds a database of this type.
    pub fn exists_at(&self, path: &Path) -> bool {
        match self {
            DatabaseType::SingleFile => path.is_file(),
            DatabaseType::MultiFile => path.is_dir(),
        }
    }
}

/// One remembered database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentDatabase {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: DatabaseType,
    pub display_name: String,
    pub last_opened: String,
}

impl RecentDatabase {
    fn exists(&self) -> bool {
        self.kind.exists_at(&self.path)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RecentFile {
    #[serde(default)]
    recent_databases: Vec<RecentDatabase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// Most-recently-used list persisted as JSON.
#[derive(Debug)]
pub struct RecentDatabases {
    file: PathBuf,
    max_recent: usize,
    entries: Vec<RecentDatabase>,
}

fn now_iso() -> String {
    Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

impl RecentDatabases {
    /// Load the list from `file`. A missing or unreadable file gives an empty list.
    pub fn load<P: AsRef<Path>>(file: P) -> Self {
        let file = file.as_ref().to_path_buf();
        let entries = if file.exists() {
            match std::fs::read_to_string(&file)
                .map_err(crate::DemError::from)
                .and_then(|text| serde_json::from_str::<RecentFile>(&text).map_err(Into::into))
            {
                Ok(data) => data.recent_databases.into_iter().filter(RecentDatabase::exists).collect(),
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Error loading recent databases");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        Self {
            file,
            max_recent: DEFAULT_MAX_RECENT,
            entries,
        }
    }

    pub fn with_max_recent(mut self, max_recent: usize) -> Self {
        self.max_recent = max_recent;
        self.entries.truncate(max_recent);
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Write the list to disk.
    pub fn save(&self) -> Result<()> {
        let data = RecentFile {
            recent_databases: self.entries.clone(),
            last_updated: Some(now_iso()),
        };
        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    /// Move `path` to the front of the list, adding it if new.
    pub fn add(&mut self, path: &Path, kind: DatabaseType, display_name: Option<&str>) -> Result<()> {
        let path = resolve(path);
        let display_name = display_name
            .map(str::to_string)
            .or_else(|| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_else(|| path.display().to_string());

        self.entries.retain(|e| e.path != path);
        self.entries.insert(
            0,
            RecentDatabase {
                path,
                kind,
                display_name,
                last_opened: now_iso(),
            },
        );
        self.entries.truncate(self.max_recent);
        self.save()
    }

    /// Entries whose databases still exist, most recent first.
    pub fn entries(&mut self) -> Result<&[RecentDatabase]> {
        let before = self.entries.len();
        self.entries.retain(RecentDatabase::exists);
        if self.entries.len() != before {
            self.save()?;
        }
        Ok(&self.entries)
    }

    pub fn most_recent(&mut self) -> Result<Option<&RecentDatabase>> {
        Ok(self.entries()?.first())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    pub fn remove(&mut self, path: &Path) -> Result<()> {
        let path = resolve(path);
        self.entries.retain(|e| e.path != path);
        self.save()
    }
}
