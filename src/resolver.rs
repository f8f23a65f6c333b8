// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Mapping of suggested category labels onto archive folders

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::Result;

/// Characters removed from labels before they become folder names
const STRIPPED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '&', '\''];

/// Longer labels are cut to this many words
pub const MAX_LABEL_WORDS: usize = 5;

/// A subfolder of the archive root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryFolder {
    pub name: String,
    pub path: PathBuf,
}

/// Turn a raw oracle label into a folder name.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_label(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c) && !c.is_control())
        .collect();

    let label = cleaned
        .split_whitespace()
        .take(MAX_LABEL_WORDS)
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");

    // leading dots hide the folder, trailing dots are invalid on Windows
    let label = label.trim_matches('.').trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// List the category folders directly under `root`, sorted by name
pub async fn list_category_folders(root: &Path) -> Result<Vec<CategoryFolder>> {
    let mut folders = Vec::new();
    let mut entries = tokio::fs::read_dir(root).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            folders.push(CategoryFolder { name, path: entry.path() });
        }
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

/// Create `path` unless it already exists as a directory.
///
/// Returns true when this call created it.
pub async fn create_dir_if_absent(path: &Path) -> Result<bool> {
    match tokio::fs::create_dir(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Resolves labels against the folders of one archive root
#[derive(Debug, Clone)]
pub struct FolderResolver {
    root: PathBuf,
    known: Vec<CategoryFolder>,
}

impl FolderResolver {
    pub fn new(root: impl Into<PathBuf>, known: Vec<CategoryFolder>) -> Self {
        Self { root: root.into(), known }
    }

    /// Enumerate the archive root and build a resolver over its folders
    pub async fn load(root: &Path) -> Result<Self> {
        let known = list_category_folders(root).await?;
        debug!("Known folders under {:?}: {}", root, known.len());
        Ok(Self::new(root, known))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn known(&self) -> &[CategoryFolder] {
        &self.known
    }

    pub fn known_names(&self) -> Vec<String> {
        self.known.iter().map(|f| f.name.clone()).collect()
    }

    /// Case-insensitive lookup of an already sanitized name
    pub fn find(&self, name: &str) -> Option<&CategoryFolder> {
        let wanted = name.to_lowercase();
        self.known.iter().find(|f| f.name.to_lowercase() == wanted)
    }

    /// Resolve a raw label to a folder, creating it when needed.
    ///
    /// `Ok(None)` means the label sanitized to nothing.
    pub async fn resolve(&mut self, raw_label: &str) -> Result<Option<CategoryFolder>> {
        let Some(label) = sanitize_label(raw_label) else {
            return Ok(None);
        };

        if let Some(existing) = self.find(&label) {
            let folder = existing.clone();
            // the folder may have been removed externally since enumeration
            create_dir_if_absent(&folder.path).await?;
            return Ok(Some(folder));
        }

        let folder = CategoryFolder {
            path: self.root.join(&label),
            name: label,
        };
        if create_dir_if_absent(&folder.path).await? {
            info!("Created folder: {:?}", folder.path);
        }
        self.known.push(folder.clone());
        Ok(Some(folder))
    }
}
