use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_WAT_JAR: &str = "./webarchive-commons-jar-with-dependencies.jar";
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(600);

const EXTRACTOR_CLASS: &str = "org.archive.extract.ResourceExtractor";

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("converter did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("converter exited with status {0}")]
    NonZeroExit(i32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no converter for {0}")]
    Unsupported(PathBuf),
}

/// Turns a capture archive into a WAT file next to it. Behind a trait so the
/// pipeline can run against a fake in tests instead of a JVM.
#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, path: &Path, timeout: Duration) -> Result<PathBuf, ConvertError>;
}

/// Maps `foo.warc.gz` / `foo.arc.gz` to the sibling `foo.wat.gz`.
pub fn wat_sibling(path: &Path) -> Result<PathBuf, ConvertError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ConvertError::Unsupported(path.to_path_buf()))?;

    let stem = name
        .strip_suffix(".warc.gz")
        .or_else(|| name.strip_suffix(".arc.gz"))
        .ok_or_else(|| ConvertError::Unsupported(path.to_path_buf()))?;

    Ok(path.with_file_name(format!("{stem}.wat.gz")))
}

/// Shells out to the webarchive-commons ResourceExtractor, capturing its
/// stdout into the sibling WAT file.
pub struct JarConverter {
    jar_path: PathBuf,
    program: String,
}

impl JarConverter {
    pub fn new(jar_path: PathBuf) -> Self {
        Self::with_program(jar_path, "java")
    }

    pub fn with_program(jar_path: PathBuf, program: &str) -> Self {
        Self {
            jar_path,
            program: program.to_string(),
        }
    }
}

#[async_trait]
impl Converter for JarConverter {
    async fn convert(&self, path: &Path, timeout: Duration) -> Result<PathBuf, ConvertError> {
        let output = wat_sibling(path)?;
        let stdout = std::fs::File::create(&output)?;

        debug!("converting {} -> {}", path.display(), output.display());
        let mut child = tokio::process::Command::new(&self.program)
            .arg("-cp")
            .arg(&self.jar_path)
            .arg(EXTRACTOR_CLASS)
            .arg("-wat")
            .arg(path)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::null())
            .spawn()?;

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!("converter timed out on {}, killing it", path.display());
                child.start_kill()?;
                child.wait().await.ok();
                // A truncated WAT is worse than none.
                tokio::fs::remove_file(&output).await?;
                return Err(ConvertError::TimedOut(timeout));
            }
        };

        if !status.success() {
            // Output is left in place for inspection.
            return Err(ConvertError::NonZeroExit(status.code().unwrap_or(-1)));
        }

        Ok(output)
    }
}
