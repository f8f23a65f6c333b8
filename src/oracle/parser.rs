// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Lenient parser for `filename: foldername` oracle responses

use std::collections::HashMap;

use super::CategorySuggestion;

/// Parse free-form oracle text into a file name → folder label map.
///
/// Each line is split on its first colon. Lines without two non-empty parts
/// are dropped. The first answer for a name wins.
pub fn parse_suggestions(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for line in text.lines() {
        let Some((name, folder)) = line.split_once(':') else {
            continue;
        };
        let name = clean_part(strip_bullet(name));
        let folder = clean_part(folder);
        if name.is_empty() || folder.is_empty() {
            continue;
        }
        map.entry(name.to_string()).or_insert_with(|| folder.to_string());
    }

    map
}

/// Line up parsed answers with the requested names, one entry per name.
pub fn align(file_names: &[String], parsed: &HashMap<String, String>) -> Vec<CategorySuggestion> {
    file_names
        .iter()
        .map(|name| CategorySuggestion {
            file_name: name.clone(),
            folder_name: lookup(name, parsed).map(str::to_string),
        })
        .collect()
}

fn lookup<'a>(name: &str, parsed: &'a HashMap<String, String>) -> Option<&'a str> {
    if let Some(folder) = parsed.get(name) {
        return Some(folder.as_str());
    }
    let lowered = name.to_lowercase();
    parsed
        .iter()
        .find(|(key, _)| key.to_lowercase() == lowered || strip_numbering(key) == name)
        .map(|(_, folder)| folder.as_str())
}

fn strip_bullet(part: &str) -> &str {
    let part = part.trim_start();
    for bullet in ["- ", "* ", "• "] {
        if let Some(rest) = part.strip_prefix(bullet) {
            return rest;
        }
    }
    part
}

/// `"1. name"` / `"2) name"` → `"name"`
fn strip_numbering(key: &str) -> &str {
    let digits = key.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return key;
    }
    let rest = &key[digits..];
    rest.strip_prefix(". ")
        .or_else(|| rest.strip_prefix(") "))
        .map(str::trim_start)
        .unwrap_or(key)
}

fn clean_part(part: &str) -> &str {
    part.trim()
        .trim_matches(|c: char| matches!(c, '"' | '`' | '*'))
        .trim()
}
