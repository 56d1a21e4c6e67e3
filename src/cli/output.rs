//! Console output for filesorter
//!
//! Styled status lines on stdout, errors on stderr. Quiet mode silences
//! everything except errors.

use console::style;

use crate::sort::BatchResult;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        // Errors are always shown, even in quiet mode
        eprintln!("{} {}", style("✖").red(), message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", style("⚠").yellow(), message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    /// Print a key-value pair with consistent styling
    pub fn key_value(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {:<12} {}", style(key).dim(), style(value).bold());
        }
    }

    /// Print a list item (verbose only)
    pub fn list_item(&self, item: &str) {
        if self.verbose && !self.quiet {
            println!("  • {}", item);
        }
    }

    /// Human-readable verdict for a finished batch
    pub fn batch_summary(&self, result: &BatchResult) {
        for relocated in &result.relocated {
            self.list_item(&format!(
                "{} → {}",
                relocated.source.display(),
                relocated.destination.display()
            ));
        }

        if result.is_success() {
            if result.dry_run {
                self.info(&format!(
                    "Dry run: {} files would be moved",
                    result.relocated.len()
                ));
            }
            self.success("Done...");
            return;
        }

        self.error("Error processing files.");
        for failed in &result.failures {
            eprintln!(
                "  {} {} {}",
                style("•").red(),
                style(failed.source.display()).underlined(),
                style(&failed.failure).dim()
            );
        }

        self.key_value("Relocated", &result.relocated.len().to_string());
        self.key_value("Failed", &result.failures.len().to_string());
        self.key_value(
            "Time",
            &format!("{:.2}s", result.elapsed.as_secs_f64()),
        );
    }
}
