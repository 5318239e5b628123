use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    thread,
};

use crossbeam_channel::unbounded;
use tracing::{debug, info};

use crate::{Anomaly, Correction, DocumentRewriter, Error, Result, RewriteConfig};

const MIGRATION_EXTENSION: &str = "sql";
const TEMP_SUFFIX: &str = ".idemsql.tmp";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// Replace each changed file atomically.
    #[default]
    Write,
    /// Transform and report without touching any file.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    pub mode: BatchMode,
    /// Upper bound on worker threads.
    pub jobs: NonZeroUsize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::Write,
            jobs: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        }
    }
}

#[derive(Debug)]
pub enum FileStatus {
    Modified,
    Unchanged,
    Failed(Error),
}

#[derive(Debug)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    pub anomalies: Vec<Anomaly>,
    pub corrections: Vec<Correction>,
}

impl FileReport {
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        matches!(self.status, FileStatus::Modified)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self.status, FileStatus::Failed(_))
    }
}

/// Per-file results in lexicographic file name order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    #[must_use]
    pub fn scanned(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn modified(&self) -> usize {
        self.files.iter().filter(|file| file.is_modified()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| file.is_failed())
    }

    /// Files with at least one anomaly.
    pub fn flagged(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|file| !file.anomalies.is_empty())
    }
}

/// Rewrites every migration of a directory, one worker per file up to the
/// configured job count. A failing file never stops the others.
pub struct BatchDriver {
    config: RewriteConfig,
    options: BatchOptions,
}

impl BatchDriver {
    pub fn new(config: RewriteConfig, options: BatchOptions) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, options })
    }

    /// `*.sql` files directly inside `dir`, sorted by file name.
    pub fn collect_migrations(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|source| Error::io(dir, "read directory", source))?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::io(dir, "read directory", source))?;
            let path = entry.path();
            if path.is_file()
                && path
                    .extension()
                    .is_some_and(|extension| extension == MIGRATION_EXTENSION)
            {
                paths.push(path);
            }
        }

        paths.sort_by(|left, right| left.file_name().cmp(&right.file_name()));
        Ok(paths)
    }

    pub fn run(&self, dir: &Path) -> Result<BatchReport> {
        let paths = Self::collect_migrations(dir)?;
        debug!(dir = %dir.display(), files = paths.len(), "collected migrations");
        Ok(self.run_files(&paths))
    }

    /// Processes `paths` and returns their reports in the given order.
    #[must_use]
    pub fn run_files(&self, paths: &[PathBuf]) -> BatchReport {
        let workers = self.options.jobs.get().min(paths.len());
        if workers <= 1 {
            return BatchReport {
                files: paths.iter().map(|path| self.process(path)).collect(),
            };
        }

        let (job_sender, jobs) = unbounded();
        for job in paths.iter().enumerate() {
            if job_sender.send(job).is_err() {
                break;
            }
        }
        drop(job_sender);

        let (report_sender, reports) = unbounded();
        thread::scope(|scope| {
            for _ in 0..workers {
                let jobs = jobs.clone();
                let report_sender = report_sender.clone();
                scope.spawn(move || {
                    for (index, path) in jobs {
                        if report_sender.send((index, self.process(path))).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(report_sender);

        let mut slots: Vec<Option<FileReport>> = paths.iter().map(|_| None).collect();
        for (index, report) in reports {
            slots[index] = Some(report);
        }

        BatchReport {
            files: slots.into_iter().flatten().collect(),
        }
    }

    fn process(&self, path: &Path) -> FileReport {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(source) => {
                return FileReport {
                    path: path.to_path_buf(),
                    status: FileStatus::Failed(Error::io(path, "read", source)),
                    anomalies: Vec::new(),
                    corrections: Vec::new(),
                };
            }
        };

        let outcome = DocumentRewriter::new(&self.config).rewrite(&source);
        let status = if !outcome.changed {
            FileStatus::Unchanged
        } else if self.options.mode == BatchMode::DryRun {
            FileStatus::Modified
        } else {
            match write_atomically(path, &outcome.text) {
                Ok(()) => {
                    info!(
                        path = %path.display(),
                        statements = outcome.rewritten,
                        "rewrote migration"
                    );
                    FileStatus::Modified
                }
                Err(error) => FileStatus::Failed(error),
            }
        };

        FileReport {
            path: path.to_path_buf(),
            status,
            anomalies: outcome.anomalies,
            corrections: outcome.corrections,
        }
    }
}

/// Writes `contents` to a sibling temp file, syncs it and renames it over
/// `path`, so readers only ever see the old or the new text. The original
/// file's permissions carry over.
fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    let Some(file_name) = path.file_name() else {
        return Err(Error::io(
            path,
            "write",
            io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let mut temp_name = file_name.to_os_string();
    temp_name.push(TEMP_SUFFIX);
    let temp_path = path.with_file_name(temp_name);

    replace_with_temp(path, &temp_path, contents).map_err(|source| {
        let _ = fs::remove_file(&temp_path);
        Error::io(path, "write", source)
    })
}

fn replace_with_temp(path: &Path, temp_path: &Path, contents: &str) -> io::Result<()> {
    let permissions = fs::metadata(path)?.permissions();

    let mut writer = BufWriter::new(File::create(temp_path)?);
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    drop(writer);

    fs::set_permissions(temp_path, permissions)?;
    fs::rename(temp_path, path)
}
