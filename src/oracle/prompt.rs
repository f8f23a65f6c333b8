// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Prompt construction for categorization requests

/// Placeholder sent when the archive has no folders yet
pub const NO_EXISTING_FOLDERS: &str = "No existing folders";

/// A system instruction plus the per-request user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(system: &str, file_names: &[String], known_folders: &[String]) -> Prompt {
    let folders = if known_folders.is_empty() {
        NO_EXISTING_FOLDERS.to_string()
    } else {
        bullet_list(known_folders)
    };

    let user = format!(
        "Here are the files:\n{}\n\nHere are the existing folders:\n{}\n\n\
         Please suggest a category for each file.",
        bullet_list(file_names),
        folders
    );

    Prompt {
        system: system.to_string(),
        user,
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
