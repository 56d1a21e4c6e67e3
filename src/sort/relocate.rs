use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::category::{CategoryKey, categorize};
use super::types::{FailureKind, FileTask, RelocationFailure, RelocationOutcome};
use crate::config::{ConflictPolicy, SortSettings};

/// Upper bound on `name (N).ext` candidates tried by [`ConflictPolicy::Rename`]
pub const MAX_RENAME_ATTEMPTS: usize = 10_000;

static STAGING_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Destination paths handed out so far in one dry-run batch.
///
/// A dry run never creates files, so two inputs bound for the same name would
/// both look free on disk. Sharing one set across the batch makes the second
/// claim fail the way the real move would.
#[derive(Debug, Default)]
pub struct DryRunClaims {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl DryRunClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`, returning false when an earlier task already holds it
    pub fn claim(&self, path: &Path) -> bool {
        let mut claimed = self
            .claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        claimed.insert(path.to_path_buf())
    }
}

/// Moves single files into `<base>/<destination>/<category>/<file name>`.
///
/// Stateless apart from its settings, so one instance is shared by every
/// worker of a batch.
#[derive(Debug, Clone)]
pub struct Relocator {
    destination: String,
    conflict: ConflictPolicy,
    dry_run: bool,
}

impl Relocator {
    pub fn new(settings: &SortSettings) -> Self {
        Self {
            destination: settings.destination.clone(),
            conflict: settings.conflict,
            dry_run: false,
        }
    }

    /// Report what would happen without touching the filesystem
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// `<base_dir>/<destination>`, the root of the category tree
    pub fn destination_root(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.destination)
    }

    /// Category and nominal destination path for a task
    pub fn plan(&self, task: &FileTask) -> Result<(CategoryKey, PathBuf), RelocationFailure> {
        let file_name = task.source.file_name().ok_or_else(|| {
            RelocationFailure::new(
                FailureKind::Other,
                format!("{} has no file name", task.source.display()),
            )
        })?;

        let category = categorize(&file_name.to_string_lossy());
        // A lossy extension would name a directory that does not match the file
        if file_name.to_str().is_none() && category.as_str().contains(char::REPLACEMENT_CHARACTER) {
            return Err(RelocationFailure::new(
                FailureKind::Other,
                format!("{} has a non UTF-8 extension", task.source.display()),
            ));
        }
        let destination = self
            .destination_root(&task.base_dir)
            .join(category.as_str())
            .join(file_name);

        Ok((category, destination))
    }

    /// Relocate one file. Never panics on IO errors; every failure is an outcome.
    pub fn relocate(&self, task: &FileTask) -> RelocationOutcome {
        self.relocate_in_batch(task, &DryRunClaims::new())
    }

    /// Relocate one file of a batch. In dry-run mode, `claims` is shared by
    /// every task of the batch; real moves ignore it.
    pub fn relocate_in_batch(&self, task: &FileTask, claims: &DryRunClaims) -> RelocationOutcome {
        let outcome: RelocationOutcome = self.try_relocate(task, claims).into();

        match &outcome {
            RelocationOutcome::Success { destination } => tracing::debug!(
                source = %task.source.display(),
                destination = %destination.display(),
                dry_run = self.dry_run,
                "relocated"
            ),
            RelocationOutcome::Failure(failure) => tracing::warn!(
                source = %task.source.display(),
                kind = ?failure.kind,
                "relocation failed: {}",
                failure.detail
            ),
        }

        outcome
    }

    fn try_relocate(
        &self,
        task: &FileTask,
        claims: &DryRunClaims,
    ) -> Result<PathBuf, RelocationFailure> {
        let (_category, destination) = self.plan(task)?;

        if self.dry_run {
            return self.preview(&task.source, destination, claims);
        }

        if let Some(category_dir) = destination.parent() {
            ensure_dir(category_dir)?;
        }

        let moved = match self.conflict {
            ConflictPolicy::Skip => {
                move_no_clobber(&task.source, &destination).map(|_| destination.clone())
            }
            ConflictPolicy::Rename => move_with_rename(&task.source, &destination),
            ConflictPolicy::Overwrite => {
                move_replace(&task.source, &destination).map(|_| destination.clone())
            }
        };

        moved.map_err(|err| {
            RelocationFailure::new(
                FailureKind::from_io(err.kind()),
                format!(
                    "move {} to {}: {err}",
                    task.source.display(),
                    destination.display()
                ),
            )
        })
    }

    /// Predict the outcome of a move against the disk and the batch's claims
    fn preview(
        &self,
        source: &Path,
        destination: PathBuf,
        claims: &DryRunClaims,
    ) -> Result<PathBuf, RelocationFailure> {
        if let Err(err) = fs::symlink_metadata(source) {
            return Err(RelocationFailure::from_io("stat", source, &err));
        }

        let is_free = |candidate: &Path| {
            fs::symlink_metadata(candidate).is_err() && claims.claim(candidate)
        };

        match self.conflict {
            ConflictPolicy::Skip if is_free(&destination) => Ok(destination),
            ConflictPolicy::Skip => Err(RelocationFailure::new(
                FailureKind::AlreadyExists,
                format!("{} already exists", destination.display()),
            )),
            ConflictPolicy::Rename => (0..=MAX_RENAME_ATTEMPTS)
                .map(|attempt| match attempt {
                    0 => destination.clone(),
                    n => numbered_name(&destination, n),
                })
                .find(|candidate| is_free(candidate))
                .ok_or_else(|| {
                    RelocationFailure::new(
                        FailureKind::AlreadyExists,
                        format!("no free name after {MAX_RENAME_ATTEMPTS} attempts"),
                    )
                }),
            ConflictPolicy::Overwrite => Ok(destination),
        }
    }
}

/// Create `path` and its parents unless they already exist.
///
/// Safe to call concurrently for the same path: a directory created by a
/// sibling task in between counts as success.
pub fn ensure_dir(path: &Path) -> Result<(), RelocationFailure> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        // create_dir_all only reports AlreadyExists when a non-directory is in the way
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(RelocationFailure::new(
            FailureKind::Other,
            format!("create directory {}: a file with that name exists", path.display()),
        )),
        Err(err) => Err(RelocationFailure::from_io("create directory", path, &err)),
    }
}

/// Move without ever replacing an existing destination.
///
/// A hard link claims the destination name atomically (failing with
/// `AlreadyExists` when taken), then the source name is removed. Where links
/// are unavailable the file is copied into a create-new destination instead.
fn move_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::hard_link(source, destination) {
        Ok(()) => remove_source_or_rollback(source, destination),
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::AlreadyExists
            ) =>
        {
            Err(err)
        }
        Err(err) => {
            tracing::debug!(
                source = %source.display(),
                "hard link unavailable ({err}), falling back to copy"
            );
            copy_new(source, destination)?;
            remove_source_or_rollback(source, destination)
        }
    }
}

fn move_with_rename(source: &Path, destination: &Path) -> io::Result<PathBuf> {
    // A missing source must not be mistaken for a taken name below
    fs::symlink_metadata(source)?;

    for attempt in 0..=MAX_RENAME_ATTEMPTS {
        let candidate = if attempt == 0 {
            destination.to_path_buf()
        } else {
            numbered_name(destination, attempt)
        };

        match move_no_clobber(source, &candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name after {MAX_RENAME_ATTEMPTS} attempts"),
    ))
}

fn move_replace(source: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(source, destination) {
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            let staging = staging_path(destination);
            copy_new(source, &staging)?;
            if let Err(err) = fs::rename(&staging, destination) {
                let _ = fs::remove_file(&staging);
                return Err(err);
            }
            // The destination is already replaced; a leftover source is a duplicate, not a loss
            fs::remove_file(source)
        }
        result => result,
    }
}

/// Copy `source` into a destination that must not exist yet
fn copy_new(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = File::open(source)?;
    let permissions = reader.metadata()?.permissions();
    let mut writer = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;

    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.sync_all())
        .and_then(|_| fs::set_permissions(destination, permissions));
    drop(writer);

    if let Err(err) = copied {
        let _ = fs::remove_file(destination);
        return Err(err);
    }
    Ok(())
}

fn remove_source_or_rollback(source: &Path, destination: &Path) -> io::Result<()> {
    if let Err(err) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Err(err);
    }
    Ok(())
}

/// `notes.txt` -> `notes (N).txt`, `README` -> `README (N)`
fn numbered_name(destination: &Path, n: usize) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let numbered = match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() && !extension.is_empty() => {
            format!("{stem} ({n}).{extension}")
        }
        _ => format!("{file_name} ({n})"),
    };

    destination.with_file_name(numbered)
}

fn staging_path(destination: &Path) -> PathBuf {
    let file_name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let counter = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    destination.with_file_name(format!(
        ".{file_name}.{}.{counter}.partial",
        std::process::id()
    ))
}
