use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

/// Hands out fresh run directories `<project>/<name>`, `<project>/<name>2`,
/// `<project>/<name>3`, ...
///
/// A directory is claimed with `create_dir`, which fails when the path
/// already exists, so two callers never receive the same directory, whether
/// they run in this process or another one. The counter only saves probing
/// numbers that are known to be taken.
#[derive(Debug)]
pub struct RunDirectories {
    project: PathBuf,
    name: String,
    next: AtomicUsize,
}

impl RunDirectories {
    pub fn new(project: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            name: name.into(),
            next: AtomicUsize::new(1),
        }
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    fn candidate(&self, run: usize) -> PathBuf {
        if run <= 1 {
            self.project.join(&self.name)
        } else {
            self.project.join(format!("{}{}", self.name, run))
        }
    }

    pub fn allocate(&self) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.project)?;

        loop {
            let run = self.next.fetch_add(1, Ordering::SeqCst);
            let dir = self.candidate(run);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    tracing::debug!("Allocated run directory {:?}", dir);
                    return Ok(dir);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
