//! Local output: transcripts, exports, charts and downloads share one directory.
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use scribe_logging::scribe_debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory {path} is unusable: {reason}")]
    OutputDir { path: PathBuf, reason: String },
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Creates `dir` if needed and checks that files can be created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".to_string())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|err| unusable(err.to_string()))?;
        }
        Err(err) => return Err(unusable(err.to_string())),
    }
    tempfile::Builder::new()
        .prefix(".scribe-probe")
        .tempfile_in(dir)
        .map_err(|err| unusable(err.to_string()))?;
    Ok(())
}

/// Replaces `{dir}/{filename}` in one step: the content goes to a hidden
/// `.part` file next to the target, which is then renamed over it.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: impl AsRef<[u8]>) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let failed = |source: io::Error| PersistError::Write {
            path: target.clone(),
            source,
        };
        let bytes = content.as_ref();

        let mut part = tempfile::Builder::new()
            .prefix(".scribe-")
            .suffix(".part")
            .tempfile_in(&self.dir)
            .map_err(failed)?;
        part.write_all(bytes).map_err(failed)?;
        part.as_file().sync_all().map_err(failed)?;
        part.persist(&target).map_err(|err| failed(err.error))?;

        scribe_debug!("Wrote {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }
}
