//! Operator-facing output: project headers, progress, diagnostics.

use std::io::{IsTerminal, Write};
use std::sync::Mutex;

/// Renders progress and error text to the operator.
pub trait Reporter: Send + Sync {
    /// Start a progress meter over `total` projects.
    fn begin(&self, title: &str, total: usize);

    /// Attribute the following command output to a project.
    fn header(&self, text: &str);

    /// One more project done.
    fn update(&self);

    /// Close the progress meter, if any.
    fn end(&self);

    /// Diagnostic line for the operator's error stream.
    fn error(&self, text: &str);
}

#[derive(Debug, Default)]
struct Progress {
    title: Option<String>,
    total: usize,
    done: usize,
}

/// Writes headers to stdout and diagnostics to stderr.
///
/// The progress meter is drawn only when stderr is a terminal.
#[derive(Debug)]
pub struct ConsoleReporter {
    progress: Mutex<Progress>,
    tty: bool,
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(Progress::default()),
            tty: std::io::stderr().is_terminal(),
        }
    }

    fn draw(&self, progress: &Progress) {
        if !self.tty {
            return;
        }
        if let Some(title) = &progress.title {
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r{}: {}/{}  ", title, progress.done, progress.total);
            let _ = err.flush();
        }
    }
}

impl Reporter for ConsoleReporter {
    fn begin(&self, title: &str, total: usize) {
        if let Ok(mut progress) = self.progress.lock() {
            *progress = Progress {
                title: Some(title.to_string()),
                total,
                done: 0,
            };
            self.draw(&progress);
        }
    }

    fn header(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn update(&self) {
        if let Ok(mut progress) = self.progress.lock() {
            if progress.title.is_some() {
                progress.done += 1;
                self.draw(&progress);
            }
        }
    }

    fn end(&self) {
        if let Ok(mut progress) = self.progress.lock() {
            if let Some(title) = progress.title.take() {
                if self.tty {
                    eprintln!("\r{}: {}/{}, done.", title, progress.done, progress.total);
                }
            }
        }
    }

    fn error(&self, text: &str) {
        eprintln!("{text}");
    }
}

/// Render a failure block: a summary line, then each stderr line prefixed
/// with the project path.
pub fn failure_lines(relpath: &str, summary: &str, detail: &str) -> Vec<String> {
    let mut lines = vec![format!("error: {relpath}/: {summary}")];
    lines.extend(
        detail
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| format!("{relpath}/: {l}")),
    );
    lines
}
