use serde::Serialize;
use std::fmt;

/// Category for files without a usable extension
pub const NO_EXTENSION_KEY: &str = "_noext";

/// Destination subdirectory name derived from a file's extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CategoryKey(String);

impl CategoryKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_no_extension(&self) -> bool {
        self.0 == NO_EXTENSION_KEY
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map a file name (not a path) to its category.
///
/// The category is the text after the last `.`, lowercased. Names without a
/// separator, dotfiles such as `.bashrc` and names ending in `.` all map to
/// [`NO_EXTENSION_KEY`].
///
/// ```rust
/// use filesorter::sort::categorize;
///
/// assert_eq!(categorize("report.PDF").as_str(), "pdf");
/// assert_eq!(categorize("archive.tar.gz").as_str(), "gz");
/// assert_eq!(categorize("README").as_str(), "_noext");
/// ```
pub fn categorize(file_name: &str) -> CategoryKey {
    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            CategoryKey(extension.to_lowercase())
        }
        _ => CategoryKey(NO_EXTENSION_KEY.to_string()),
    }
}
