use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Per-request scratch directory holding the uploaded video and the encoded
/// result. Dropping it deletes both files, on success and on every error
/// path alike.
pub struct VideoStaging {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl VideoStaging {
    /// Create a fresh directory under `parent` and write `bytes` to the
    /// input file.
    pub fn create(parent: &Path, bytes: &[u8], extension: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("roadlens-")
            .tempdir_in(parent)?;
        let input = dir.path().join(format!("input.{extension}"));
        let output = dir.path().join(format!("output.{extension}"));

        std::fs::write(&input, bytes)?;
        tracing::debug!(
            "Staged {} bytes of video at {}",
            bytes.len(),
            input.display()
        );

        Ok(Self {
            _dir: dir,
            input,
            output,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Read the finished output file.
    pub fn read_output(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.output)
    }
}
