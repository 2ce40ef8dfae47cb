//! Preference import and export
//!
//! Exported documents are ordinary properties text:
//! - `file_export_version=3.0` marks the current format
//! - `!<absolute path>=` marks an export root; importing clears that subtree
//!   before entries are applied
//! - every other entry is `encode_path(absolute node path, key)=value`
//!
//! Documents without the version marker use the legacy layout
//! (`qualifier/key=value`) and are applied under `/instance`.

use crate::error::Result;
use std::collections::HashSet;
use std::fmt;
use std::io::{Read, Write};
use strata_core::codec::{self, EXPORT_VERSION_KEY, EXPORT_VERSION_VALUE};
use strata_core::{
    decode_path, encode_path, ParsedProperties, PreferenceTree, Preferences, Properties,
    StringPool,
};
use strata_scopes::INSTANCE_SCOPE;

/// Key prefix marking an export root
pub const EXPORT_ROOT_PREFIX: char = '!';

/// Scope legacy documents are imported into
pub const LEGACY_IMPORT_SCOPE: &str = INSTANCE_SCOPE;

/// One problem found while importing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportIssue {
    /// 1-based line, when the problem is tied to one
    pub line: Option<usize>,
    /// Description of the problem
    pub message: String,
}

impl ImportIssue {
    fn new(line: Option<usize>, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {line}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStatus {
    /// Entries written to the tree
    pub applied: usize,
    /// Entries or lines that were not applied
    pub skipped: usize,
    /// Problems encountered, in order
    pub issues: Vec<ImportIssue>,
}

impl ImportStatus {
    /// Check if the import ran without any problem
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    fn report(&mut self, issue: ImportIssue) {
        tracing::warn!(%issue, "preference import issue");
        self.issues.push(issue);
    }

    fn skip(&mut self, issue: ImportIssue) {
        self.skipped += 1;
        self.report(issue);
    }
}

fn is_excluded(relative: &str, excludes: &[&str]) -> bool {
    excludes.iter().any(|ex| {
        !ex.is_empty()
            && (relative == *ex
                || relative
                    .strip_prefix(ex)
                    .is_some_and(|rest| rest.starts_with('/')))
    })
}

/// Write `node` and its subtree to `writer`
///
/// `excludes` are paths relative to `node`; an excluded node drops its whole
/// subtree, an excluded `path/key` drops one entry. Returns the number of
/// entries written.
///
/// # Errors
/// Returns error if the subtree cannot be walked or the writer fails
pub fn export_preferences<W: Write + ?Sized>(
    node: &Preferences,
    writer: &mut W,
    excludes: &[&str],
) -> Result<usize> {
    let base = node.path().clone();
    let mut entries = Properties::new();
    entries.insert(EXPORT_VERSION_KEY.to_string(), EXPORT_VERSION_VALUE.to_string());
    entries.insert(format!("{EXPORT_ROOT_PREFIX}{}", node.absolute_path()), String::new());

    let mut written = 0;
    node.accept(&mut |current: &Preferences| -> strata_core::Result<bool> {
        let relative = current.path().relative_to(&base)?;
        if is_excluded(&relative, excludes) {
            return Ok(false);
        }
        if current.path().is_root() {
            return Ok(true);
        }
        for (key, value) in current.snapshot()?.iter() {
            if is_excluded(&encode_path(&relative, key), excludes) {
                continue;
            }
            entries.insert(encode_path(current.absolute_path(), key), value.to_string());
            written += 1;
        }
        Ok(true)
    })?;

    writer.write_all(codec::write(&entries).as_bytes())?;
    writer.flush()?;
    tracing::debug!(root = %node.absolute_path(), entries = written, "exported preferences");
    Ok(written)
}

/// Parse an export document without applying it
///
/// # Errors
/// Returns error if the reader fails
pub fn read_preferences<R: Read + ?Sized>(reader: &mut R) -> Result<ParsedProperties> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(codec::parse_lenient(&text))
}

/// Remove keys and qualifier-level descendants below an export root
fn clear_export_root(node: &Preferences) -> strata_core::Result<()> {
    node.clear()?;
    for name in node.children_names()? {
        let child = node.node(&name)?;
        if child.path().len() >= 2 {
            child.remove_node()?;
        } else {
            clear_export_root(&child)?;
        }
    }
    Ok(())
}

/// Apply an export document to `tree`
///
/// Malformed lines and entries that cannot be placed are skipped and
/// reported; nothing is flushed.
///
/// # Errors
/// Returns error only if the reader fails
pub fn import_preferences<R: Read + ?Sized>(
    tree: &PreferenceTree,
    reader: &mut R,
) -> Result<ImportStatus> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut status = ImportStatus::default();
    if text.trim().is_empty() {
        status.report(ImportIssue::new(None, "empty preference stream"));
        return Ok(status);
    }

    let parsed = codec::parse_lenient(&text);
    for issue in parsed.issues {
        status.skip(ImportIssue::new(Some(issue.line), issue.message));
    }

    let entries = parsed.entries;
    let exported = match entries.get(EXPORT_VERSION_KEY) {
        Some(version) => {
            if version != EXPORT_VERSION_VALUE {
                status.report(ImportIssue::new(
                    None,
                    format!("unexpected export version '{version}', importing anyway"),
                ));
            }
            true
        }
        None => false,
    };

    if exported {
        for root in entries.keys().filter_map(|k| k.strip_prefix(EXPORT_ROOT_PREFIX)) {
            if let Err(err) = tree.node(root).and_then(|node| clear_export_root(&node)) {
                status.report(ImportIssue::new(
                    None,
                    format!("cannot clear export root '{root}': {err}"),
                ));
            }
        }
    }

    let mut touched = HashSet::new();
    for (entry, value) in &entries {
        if entry == EXPORT_VERSION_KEY || entry.starts_with(EXPORT_ROOT_PREFIX) {
            continue;
        }
        let (path, key) = decode_path(entry);
        let Some(path) = path else {
            status.skip(ImportIssue::new(None, format!("entry '{entry}' has no node path")));
            continue;
        };
        let target = if exported {
            format!("/{path}")
        } else {
            format!("/{LEGACY_IMPORT_SCOPE}/{path}")
        };
        let applied = tree.node(&target).and_then(|node| {
            node.put(key, value)?;
            Ok(node.load_level()?.unwrap_or(node))
        });
        match applied {
            Ok(unit) => {
                status.applied += 1;
                touched.insert(unit);
            }
            Err(err) => status.skip(ImportIssue::new(None, format!("entry '{entry}': {err}"))),
        }
    }

    let mut pool = StringPool::new();
    for node in &touched {
        if let Err(err) = node.share_strings(&mut pool) {
            tracing::debug!(path = %node.absolute_path(), error = %err, "skipped string sharing");
        }
    }

    tracing::info!(
        applied = status.applied,
        skipped = status.skipped,
        legacy = !exported,
        "imported preferences"
    );
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn exclusion_matches_whole_segments() {
        assert!(is_excluded("editor", &["editor"]));
        assert!(is_excluded("editor/font", &["editor"]));
        assert!(is_excluded("editor//a/b", &["editor"]));
        assert!(!is_excluded("editors", &["editor"]));
        assert!(!is_excluded("anything", &[""]));
    }

    #[test]
    fn export_writes_markers_and_entries() {
        let tree = PreferenceTree::new();
        let app = tree.node("/scratch/app").unwrap();
        app.put("color", "blue").unwrap();
        app.node("editor").unwrap().put("a/b", "x").unwrap();

        let mut out = Vec::new();
        assert_eq!(export_preferences(&app, &mut out, &[]).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("file_export_version=3.0"), "{text}");
        assert!(text.contains("\\!/scratch/app="), "{text}");
        assert!(text.contains("/scratch/app/color=blue"), "{text}");
        assert!(text.contains("/scratch/app/editor//a/b=x"), "{text}");
    }

    #[test]
    fn export_honors_excludes() {
        let tree = PreferenceTree::new();
        let app = tree.node("/scratch/app").unwrap();
        app.put("keep", "1").unwrap();
        app.put("secret", "2").unwrap();
        app.node("cache").unwrap().put("k", "3").unwrap();

        let mut out = Vec::new();
        let written = export_preferences(&app, &mut out, &["secret", "cache"]).unwrap();
        assert_eq!(written, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("secret"));
        assert!(!text.contains("cache"));
    }

    #[test]
    fn import_of_empty_stream_reports_issue() {
        let tree = PreferenceTree::new();
        let status = import_preferences(&tree, &mut Cursor::new("  \n")).unwrap();
        assert_eq!(status.applied, 0);
        assert_eq!(status.issues.len(), 1);
    }

    #[test]
    fn legacy_import_goes_under_instance() {
        let tree = PreferenceTree::new();
        let status =
            import_preferences(&tree, &mut Cursor::new("app/color=red\norphan=1\n")).unwrap();
        assert_eq!(status.applied, 1);
        assert_eq!(status.skipped, 1);
        assert_eq!(
            tree.node("/instance/app").unwrap().get("color").unwrap().as_deref(),
            Some("red")
        );
    }

    #[test]
    fn read_only_parses() {
        let parsed = read_preferences(&mut Cursor::new("a/b=1\nbad=\\uZZZZ\n")).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.issues.len(), 1);
    }

    proptest! {
        #[test]
        fn exported_values_survive_import(
            entries in proptest::collection::btree_map("[a-z][a-z0-9./ ]{0,8}", "[ -~]{0,12}", 1..8)
        ) {
            let tree = PreferenceTree::new();
            let app = tree.node("/scratch/app").unwrap();
            for (key, value) in &entries {
                app.put(key, value).unwrap();
            }
            let mut out = Vec::new();
            export_preferences(&app, &mut out, &[]).unwrap();
            app.clear().unwrap();

            let status = import_preferences(&tree, &mut Cursor::new(out)).unwrap();
            prop_assert!(status.is_ok(), "{:?}", status.issues);
            prop_assert_eq!(status.applied, entries.len());
            for (key, value) in &entries {
                prop_assert_eq!(app.get(key).unwrap(), Some(value.clone()));
            }
        }
    }
}
