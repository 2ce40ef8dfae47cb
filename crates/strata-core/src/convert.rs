//! Conversion between a subtree and flat properties
//!
//! A load-level subtree is flattened into `encode_path(relative, key)`
//! entries and rebuilt from them. Scope providers use this for their files.

use crate::codec::{Properties, VERSION_KEY};
use crate::error::Result;
use crate::node::Preferences;
use crate::path::{decode_path, encode_path};
use crate::scope::LoadMode;
use std::collections::BTreeMap;

/// Flatten `node` and its descendants with keys relative to `node`
///
/// # Errors
/// Returns error if a node in the subtree was removed during the walk
pub fn to_properties(node: &Preferences) -> Result<Properties> {
    let base = node.path().clone();
    let mut out = Properties::new();
    node.accept(&mut |current: &Preferences| {
        let relative = current.path().relative_to(&base)?;
        for (key, value) in current.snapshot()?.iter() {
            out.insert(encode_path(&relative, key), value.to_string());
        }
        Ok(true)
    })?;
    Ok(out)
}

/// Apply flat entries below `node`, creating descendants as needed
///
/// [`LoadMode::Initial`] installs values silently; [`LoadMode::Sync`] goes
/// through `put`, so only changed values mark dirty and notify. The version
/// key and entries without a key are skipped. Returns the number of entries
/// applied.
///
/// # Errors
/// Returns error for an entry whose path is invalid
pub fn apply_properties(node: &Preferences, entries: &Properties, mode: LoadMode) -> Result<usize> {
    let mut grouped: BTreeMap<&str, Vec<(&str, &str)>> = BTreeMap::new();
    for (encoded, value) in entries {
        if encoded == VERSION_KEY {
            continue;
        }
        let (path, key) = decode_path(encoded);
        if key.is_empty() {
            tracing::warn!(entry = %encoded, node = %node.absolute_path(), "skipping entry without key");
            continue;
        }
        grouped
            .entry(path.unwrap_or(""))
            .or_default()
            .push((key, value.as_str()));
    }

    let mut applied = 0;
    for (path, pairs) in grouped {
        let target = node.node(path)?;
        applied += pairs.len();
        match mode {
            LoadMode::Initial => target.install(pairs)?,
            LoadMode::Sync => {
                for (key, value) in pairs {
                    target.put(key, value)?;
                }
            }
        }
    }
    Ok(applied)
}
