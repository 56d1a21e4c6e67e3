use anyhow::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Files found under a base directory, plus anything the walk could not read
#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Collect every regular file under `base_dir`.
///
/// Hidden files are included and ignore files are not honoured. Symlinks are
/// not followed. The `<base_dir>/<destination>` subtree is skipped so files
/// sorted by an earlier run are left where they are.
pub fn discover_files(base_dir: &Path, destination: &str) -> Result<Discovery> {
    if !base_dir.is_dir() {
        anyhow::bail!("Not a directory: {}", base_dir.display());
    }

    let destination_root = base_dir.join(destination);
    let walker = WalkBuilder::new(base_dir)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| entry.path() != destination_root.as_path())
        .build();

    let mut discovery = Discovery::default();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|ft| ft.is_file()) {
                    discovery.files.push(entry.into_path());
                }
            }
            Err(e) => {
                tracing::warn!("Walk error: {e}");
                discovery.warnings.push(format!("Walk error: {e}"));
            }
        }
    }

    discovery.files.sort();
    tracing::debug!(
        base_dir = %base_dir.display(),
        files = discovery.files.len(),
        "discovered files"
    );

    Ok(discovery)
}
