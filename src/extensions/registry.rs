//! Discovery of extension manifests by static text inspection.
//!
//! Scanning never parses or executes anything: it reads the first lines of
//! each `*.ext` file looking for the `PLUGIN_NAME` declaration. It runs on
//! every refresh, so it must stay free of side effects beyond creating the
//! directory.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// File suffix of extension manifests.
pub const MANIFEST_SUFFIX: &str = "ext";

/// Constant whose assignment declares the display name.
pub const NAME_CONSTANT: &str = "PLUGIN_NAME";

/// Lines inspected for the name declaration.
pub const MAX_NAME_SCAN_LINES: usize = 40;

/// Subdirectory receiving replaced and removed manifests.
pub const REMOVED_DIR: &str = "__removed__";

/// Static metadata about one discovered extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionDescriptor {
    pub name: String,
    pub source_path: PathBuf,
}

/// The result of the most recent directory scan.
pub struct ExtensionRegistry {
    dir: PathBuf,
    found: BTreeMap<String, ExtensionDescriptor>,
}

impl ExtensionRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            found: BTreeMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rescan the directory, replacing the previous result wholesale.
    ///
    /// A missing directory is created and yields an empty result. Files are
    /// visited in file-name order; on a name collision the later file wins.
    pub fn scan(&mut self) -> &BTreeMap<String, ExtensionDescriptor> {
        self.found.clear();

        if !self.dir.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&self.dir) {
                debug!(dir = %self.dir.display(), error = %e, "Cannot create extensions directory");
            }
            return &self.found;
        }

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "Cannot read extensions directory");
                return &self.found;
            }
        };

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_manifest(p))
            .collect();
        candidates.sort();

        for path in candidates {
            let Some(descriptor) = describe(&path) else {
                debug!(path = %path.display(), "Skipping unreadable extension file");
                continue;
            };
            if let Some(previous) = self.found.get(&descriptor.name) {
                warn!(
                    name = %descriptor.name,
                    kept = %descriptor.source_path.display(),
                    dropped = %previous.source_path.display(),
                    "Two extension files declare the same name"
                );
            }
            self.found.insert(descriptor.name.clone(), descriptor);
        }

        debug!(dir = %self.dir.display(), count = self.found.len(), "Scanned extensions");
        &self.found
    }

    pub fn get(&self, name: &str) -> Option<&ExtensionDescriptor> {
        self.found.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.found.contains_key(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ExtensionDescriptor> {
        self.found.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.found.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }
}

pub fn is_manifest(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(MANIFEST_SUFFIX)
}

/// Build a descriptor for one file, or `None` if it cannot be opened.
pub fn describe(path: &Path) -> Option<ExtensionDescriptor> {
    let declared = read_declared_name(path).ok()?;
    let name = declared.or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
    })?;
    Some(ExtensionDescriptor {
        name,
        source_path: path.to_path_buf(),
    })
}

/// Find the declared name within the first [`MAX_NAME_SCAN_LINES`] lines.
///
/// Invalid UTF-8 is decoded lossily. An empty declaration counts as absent.
pub fn read_declared_name(path: &Path) -> std::io::Result<Option<String>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut buf = Vec::new();

    for _ in 0..MAX_NAME_SCAN_LINES {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if let Some(name) = parse_name_line(&line) {
            return Ok((!name.is_empty()).then_some(name));
        }
    }
    Ok(None)
}

/// Extract the value from a `PLUGIN_NAME = "..."` style line.
pub fn parse_name_line(line: &str) -> Option<String> {
    if !line.contains(NAME_CONSTANT) {
        return None;
    }
    let (_, value) = line.split_once('=')?;
    Some(
        value
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
            .to_string(),
    )
}

/// Leading `#` comment block of a manifest, joined into one line.
pub fn read_leading_comment(path: &Path) -> Option<String> {
    let reader = BufReader::new(File::open(path).ok()?);
    let text: Vec<String> = reader
        .split(b'\n')
        .map_while(|line| line.ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .take_while(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();
    (!text.is_empty()).then(|| text.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn parses_declaration_variants() {
        assert_eq!(parse_name_line("PLUGIN_NAME = \"Alpha\"\n").as_deref(), Some("Alpha"));
        assert_eq!(parse_name_line("PLUGIN_NAME='Beta Tool'").as_deref(), Some("Beta Tool"));
        assert_eq!(parse_name_line("  PLUGIN_NAME =  Gamma  ").as_deref(), Some("Gamma"));
        assert_eq!(parse_name_line("PLUGIN_NAME = \"a=b\"").as_deref(), Some("a=b"));
        assert_eq!(parse_name_line("name = \"x\""), None);
        assert_eq!(parse_name_line("PLUGIN_NAME"), None);
    }

    #[test]
    fn declaration_past_line_limit_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.ext");
        let mut content = "# filler\n".repeat(MAX_NAME_SCAN_LINES);
        content.push_str("PLUGIN_NAME = \"Late\"\n");
        fs::write(&path, content).unwrap();

        assert_eq!(read_declared_name(&path).unwrap(), None);
        assert_eq!(describe(&path).unwrap().name, "late");
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bytes.ext");
        fs::write(&path, b"# \xff\xfe\nPLUGIN_NAME = \"Bytes\"\n").unwrap();
        assert_eq!(describe(&path).unwrap().name, "Bytes");
    }

    #[test]
    fn missing_directory_is_created_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ext_dir = dir.path().join("plugins");
        let mut registry = ExtensionRegistry::new(&ext_dir);

        assert!(registry.scan().is_empty());
        assert!(ext_dir.is_dir());
    }

    #[test]
    fn only_manifests_in_top_level_are_scanned() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ext"), "PLUGIN_NAME = \"Alpha\"\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "PLUGIN_NAME = \"Nope\"\n").unwrap();
        fs::create_dir(dir.path().join(REMOVED_DIR)).unwrap();
        fs::write(dir.path().join(REMOVED_DIR).join("old.ext"), "PLUGIN_NAME = \"Old\"\n").unwrap();

        let mut registry = ExtensionRegistry::new(dir.path());
        let names: Vec<&str> = registry.scan().keys().map(String::as_str).collect();
        assert_eq!(names, ["Alpha"]);
    }

    #[test]
    fn rescan_replaces_previous_result() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ext");
        fs::write(&a, "PLUGIN_NAME = \"Alpha\"\n").unwrap();

        let mut registry = ExtensionRegistry::new(dir.path());
        registry.scan();
        assert!(registry.contains("Alpha"));

        fs::remove_file(&a).unwrap();
        fs::write(dir.path().join("b.ext"), "").unwrap();
        registry.scan();
        assert!(!registry.contains("Alpha"));
        assert!(registry.contains("b"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn leading_comment_becomes_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.ext");
        fs::write(&path, "# Batch renamer\n# for clips\nPLUGIN_NAME = \"C\"\n# not this\n").unwrap();
        assert_eq!(read_leading_comment(&path).as_deref(), Some("Batch renamer for clips"));
    }
}
