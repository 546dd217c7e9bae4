//! Key renaming
//!
//! Two flavors: pattern maps (constant, character replacement or capture
//! group, with exact or substring matching) and a plain regex rename that
//! recurses through the whole tree.
//!
//! Pattern maps are order-sensitive: within one map the first matching entry
//! wins; when patterns arrive as an array of maps, the maps are applied in
//! array order, each over the output of the previous.

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{NormalizeError, Result};

/// One rename rule
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameEntry {
    /// Replace the whole key with this constant
    #[serde(default)]
    pub constant: Option<String>,

    /// Replace every match of the pattern inside the key with this string
    #[serde(rename = "replaceCharacter", default)]
    pub replace_character: Option<String>,

    /// Rename the key to this capture group of `pattern`
    #[serde(default)]
    pub pattern: Option<String>,

    /// Capture group index for `pattern` (default 0, the whole match)
    #[serde(default)]
    pub group: Option<usize>,

    /// Per-entry override of the global exact-match flag
    #[serde(rename = "exactMatch", default)]
    pub exact_match: Option<bool>,
}

/// A pattern map or an ordered array of pattern maps
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RenamePatterns {
    One(Map<String, Value>),
    Ordered(Vec<Map<String, Value>>),
}

/// Rename keys throughout `data` according to the pattern map(s)
///
/// `exact_match` is the global matching mode; individual entries may override
/// it. Keys are matched against the map's pattern strings as regexes.
pub fn rename_keys(data: &Value, patterns: &RenamePatterns, exact_match: bool) -> Result<Value> {
    let maps: Vec<&Map<String, Value>> = match patterns {
        RenamePatterns::One(map) => vec![map],
        RenamePatterns::Ordered(maps) => maps.iter().collect(),
    };

    let mut current = data.clone();
    for map in maps {
        let rules = compile_rules(map)?;
        current = apply_rules(&current, &rules, exact_match);
    }
    Ok(current)
}

struct CompiledRule {
    regex: Regex,
    entry: RenameEntry,
}

fn compile_rules(map: &Map<String, Value>) -> Result<Vec<CompiledRule>> {
    let mut rules = Vec::with_capacity(map.len());
    for (pattern, raw_entry) in map {
        let entry: RenameEntry = serde_json::from_value(raw_entry.clone())
            .map_err(|e| NormalizeError::invalid_options("rename_keys", e.to_string()))?;
        let regex = Regex::new(pattern).map_err(|e| NormalizeError::InvalidPattern {
            transform: "rename_keys",
            pattern: pattern.clone(),
            source: e,
        })?;
        rules.push(CompiledRule { regex, entry });
    }
    Ok(rules)
}

fn apply_rules(data: &Value, rules: &[CompiledRule], global_exact: bool) -> Value {
    match data {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let new_key = rename_one(key, rules, global_exact);
                out.insert(new_key, apply_rules(value, rules, global_exact));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| apply_rules(item, rules, global_exact))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// First matching rule wins
fn rename_one(key: &str, rules: &[CompiledRule], global_exact: bool) -> String {
    for rule in rules {
        let exact = rule.entry.exact_match.unwrap_or(global_exact);
        let matched = if exact {
            rule.regex
                .find(key)
                .is_some_and(|m| m.start() == 0 && m.end() == key.len())
        } else {
            rule.regex.is_match(key)
        };
        if !matched {
            continue;
        }

        if let Some(constant) = &rule.entry.constant {
            return constant.clone();
        }
        if let Some(replacement) = &rule.entry.replace_character {
            return rule.regex.replace_all(key, replacement.as_str()).into_owned();
        }
        if let Some(pattern) = &rule.entry.pattern {
            if let Ok(capture_regex) = Regex::new(pattern)
                && let Some(captures) = capture_regex.captures(key)
            {
                let group = rule.entry.group.unwrap_or(0);
                if let Some(m) = captures.get(group) {
                    return m.as_str().to_string();
                }
            }
            continue;
        }
        // An entry with no action leaves the key as-is but still wins
        return key.to_string();
    }
    key.to_string()
}

/// Recursively rename keys matching `pattern`, replacing the matched part
///
/// Coalesces runs of periods left behind by a removal, so
/// `"name..suffix"` becomes `"name.suffix"`.
pub fn rename_keys_by_regex(data: &Value, pattern: &Regex, replacement: &str) -> Value {
    match data {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, value) in map {
                let mut new_key = pattern.replace_all(key, replacement).into_owned();
                while new_key.contains("..") {
                    new_key = new_key.replace("..", ".");
                }
                out.insert(new_key, rename_keys_by_regex(value, pattern, replacement));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| rename_keys_by_regex(item, pattern, replacement))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "rename_test.rs"]
mod tests;
