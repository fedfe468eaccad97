//! Conversion of a single presentation to PDF using LibreOffice.
//!
//! Each conversion copies the source to a random ASCII name, runs `soffice`
//! headless with a hard timeout, checks that the result is a real PDF and
//! moves it into the output directory under its final name.

use crate::error::{Error, Result};
use crate::locate::EngineLocator;
use crate::types::SourceDocument;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use url::Url;
use uuid::Uuid;

/// Default wall-clock limit for one conversion.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(240);

/// Smallest file accepted as a real PDF.
pub const MIN_PDF_BYTES: u64 = 5000;

/// Every PDF starts with this.
pub const PDF_SIGNATURE: &[u8; 5] = b"%PDF-";

/// LibreOffice export target for presentations.
pub const DEFAULT_EXPORT_FILTER: &str = "pdf:impress_pdf_Export";

/// How often a running converter is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Subdirectory of a work directory the converter renders into.
const STAGING_DIR: &str = "render";

/// Subdirectory of a work directory holding the converter's user profile.
const PROFILE_DIR: &str = "profile";

/// Options for a single conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    timeout: Duration,
    min_pdf_bytes: u64,
    export_filter: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            min_pdf_bytes: MIN_PDF_BYTES,
            export_filter: DEFAULT_EXPORT_FILTER.to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wall-clock limit for one converter run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the smallest output size accepted as valid.
    pub fn with_min_pdf_bytes(mut self, bytes: u64) -> Self {
        self.min_pdf_bytes = bytes;
        self
    }

    /// Set the `--convert-to` argument passed to the converter.
    pub fn with_export_filter(mut self, filter: impl Into<String>) -> Self {
        self.export_filter = filter.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn min_pdf_bytes(&self) -> u64 {
        self.min_pdf_bytes
    }

    pub fn export_filter(&self) -> &str {
        &self.export_filter
    }
}

/// Converts one document into a validated PDF.
///
/// `work_dir` is private to the caller's worker; `out_dir` may be shared.
pub trait DocumentConverter: Sync {
    fn convert(
        &self,
        document: &SourceDocument,
        work_dir: &Path,
        out_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf>;
}

/// Converter backed by a LibreOffice `soffice` executable.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    engine: PathBuf,
    options: ConvertOptions,
}

impl SofficeConverter {
    /// Create a converter for a known executable path.
    pub fn new(engine: impl Into<PathBuf>, options: ConvertOptions) -> Self {
        Self {
            engine: engine.into(),
            options,
        }
    }

    /// Resolve the executable through `locator`.
    pub fn from_locator(locator: &dyn EngineLocator, options: ConvertOptions) -> Result<Self> {
        let engine = locator.locate().ok_or(Error::EngineUnavailable)?;
        Ok(Self::new(engine, options))
    }

    pub fn engine(&self) -> &Path {
        &self.engine
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Run the converter on `input`, returning the PDF path it should have produced.
    fn render(&self, input: &Path, work_dir: &Path, staging: &Path) -> Result<PathBuf> {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Output goes to files rather than pipes so a chatty or hung
        // converter can never block on a full pipe buffer.
        let stdout_log = work_dir.join(format!("{}.stdout.log", stem));
        let stderr_log = work_dir.join(format!("{}.stderr.log", stem));
        let profile = work_dir.join(PROFILE_DIR);

        let mut command = Command::new(&self.engine);
        command
            .arg("--headless")
            .arg("--nologo")
            .arg("--nofirststartwizard")
            .arg(format!("-env:UserInstallation={}", profile_url(&profile)?))
            .arg("--convert-to")
            .arg(&self.options.export_filter)
            .arg("--outdir")
            .arg(staging)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::from(File::create(&stdout_log)?))
            .stderr(Stdio::from(File::create(&stderr_log)?));

        // soffice hands the work to a soffice.bin child; a group lets a
        // timeout take both down.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        log::debug!("Running {:?}", command);

        let outcome = command
            .spawn()
            .map_err(Error::from)
            .and_then(|mut child| wait_with_timeout(&mut child, self.options.timeout));

        let stdout = read_log(&stdout_log);
        let stderr = read_log(&stderr_log);
        let _ = fs::remove_file(&stdout_log);
        let _ = fs::remove_file(&stderr_log);

        match outcome? {
            None => {
                // A killed converter can leave its profile locked or half written.
                reset_profile(&profile);
                Err(Error::Timeout {
                    limit: self.options.timeout,
                })
            }
            Some(status) if !status.success() => Err(Error::ConversionFailed {
                status: status.to_string(),
                stderr,
                stdout,
            }),
            Some(_) => {
                let expected = staging.join(format!("{}.pdf", stem));
                if expected.is_file() {
                    Ok(expected)
                } else {
                    Err(Error::OutputMissing(expected))
                }
            }
        }
    }
}

impl DocumentConverter for SofficeConverter {
    fn convert(
        &self,
        document: &SourceDocument,
        work_dir: &Path,
        out_dir: &Path,
        output_name: &str,
    ) -> Result<PathBuf> {
        let staging = work_dir.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;
        fs::create_dir_all(out_dir)?;

        let input = ScratchFile::copy_of(&document.path, work_dir, document.format.extension())?;
        log::debug!(
            "Converting {} via {}",
            document.name,
            input.path().display()
        );

        let rendered = self.render(input.path(), work_dir, &staging)?;

        if let Err(e) = validate_pdf(&rendered, self.options.min_pdf_bytes) {
            let _ = fs::remove_file(&rendered);
            return Err(e);
        }

        let target = out_dir.join(output_name);
        install(&rendered, &target)?;
        log::info!("Converted {} -> {}", document.name, target.display());

        Ok(target)
    }
}

/// A file in a work directory that is deleted when dropped.
struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Copy `source` into `dir` under a random name keeping only `extension`.
    fn copy_of(source: &Path, dir: &Path, extension: &str) -> Result<Self> {
        let path = dir.join(format!("{}.{}", Uuid::new_v4().simple(), extension));
        fs::copy(source, &path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Wait for `child` to exit, killing it once `timeout` has elapsed.
///
/// Returns `None` if the process was killed.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>> {
    let started = Instant::now();

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        if started.elapsed() >= timeout {
            log::warn!("Converter exceeded {:?}, killing pid {}", timeout, child.id());
            kill_process_tree(child);
            return Ok(None);
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Kill `child` and everything it started, then reap it.
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        // Negative pid: the whole process group led by the child.
        let result = unsafe { libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL) };
        if result != 0 {
            log::warn!(
                "Failed to kill process group {}: {}",
                child.id(),
                std::io::Error::last_os_error()
            );
        }
    }

    #[cfg(windows)]
    {
        let _ = Command::new("taskkill")
            .args(["/PID", &child.id().to_string(), "/T", "/F"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }

    let _ = child.kill();
    let _ = child.wait();
}

/// Remove a converter profile so the next run starts from a clean one.
fn reset_profile(profile: &Path) {
    match fs::remove_dir_all(profile) {
        Ok(()) => log::debug!("Removed converter profile {}", profile.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", profile.display(), e),
    }
}

/// Check that `path` looks like a complete PDF.
///
/// The converter sometimes exits successfully after writing an empty or
/// truncated file, so this runs regardless of exit status.
pub fn validate_pdf(path: &Path, min_bytes: u64) -> Result<()> {
    let size = fs::metadata(path)?.len();
    if size < min_bytes {
        return Err(Error::CorruptOutput {
            path: path.to_path_buf(),
            reason: format!("{} bytes, expected at least {}", size, min_bytes),
        });
    }

    let mut header = [0u8; 5];
    let mut file = File::open(path)?;
    let has_signature = file.read_exact(&mut header).is_ok() && &header == PDF_SIGNATURE;

    if !has_signature {
        return Err(Error::CorruptOutput {
            path: path.to_path_buf(),
            reason: "missing %PDF- signature".to_string(),
        });
    }

    Ok(())
}

/// Move a validated render to its final name, replacing any earlier file.
fn install(rendered: &Path, target: &Path) -> Result<()> {
    match fs::rename(rendered, target) {
        Ok(()) => Ok(()),
        Err(_) if target.exists() => {
            // Windows refuses to rename over an existing file.
            fs::remove_file(target)?;
            fs::rename(rendered, target)?;
            Ok(())
        }
        Err(e) => {
            log::debug!("Rename failed ({}), copying instead", e);
            fs::copy(rendered, target)?;
            fs::remove_file(rendered)?;
            Ok(())
        }
    }
}

fn read_log(path: &Path) -> String {
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .unwrap_or_default()
}

/// `file://` URL for a profile directory, as LibreOffice expects for `-env:`.
fn profile_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_directory_path(&absolute).map_err(|()| {
        Error::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("cannot express {} as a file URL", absolute.display()),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_bytes(size: usize) -> Vec<u8> {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.resize(size, b'x');
        bytes
    }

    #[test]
    fn test_validate_accepts_real_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        fs::write(&path, pdf_bytes(5000)).unwrap();

        assert!(validate_pdf(&path, MIN_PDF_BYTES).is_ok());
    }

    #[test]
    fn test_validate_rejects_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.pdf");
        fs::write(&path, pdf_bytes(4999)).unwrap();

        let err = validate_pdf(&path, MIN_PDF_BYTES).unwrap_err();
        assert!(matches!(err, Error::CorruptOutput { .. }));
        assert!(err.to_string().contains("4999 bytes"));
    }

    #[test]
    fn test_validate_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.pdf");
        fs::write(&path, b"").unwrap();

        assert!(matches!(
            validate_pdf(&path, MIN_PDF_BYTES),
            Err(Error::CorruptOutput { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_signature() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("html.pdf");
        let mut bytes = b"<html>".to_vec();
        bytes.resize(8000, b' ');
        fs::write(&path, bytes).unwrap();

        let err = validate_pdf(&path, MIN_PDF_BYTES).unwrap_err();
        assert!(err.to_string().contains("signature"));
    }

    #[test]
    fn test_validate_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_pdf(&dir.path().join("absent.pdf"), MIN_PDF_BYTES),
            Err(Error::IoError(_))
        ));
    }

    #[test]
    fn test_scratch_file_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("한글 이름이 아주 긴 발표자료.pptx");
        fs::write(&source, b"deck").unwrap();

        let copy_path = {
            let copy = ScratchFile::copy_of(&source, dir.path(), "pptx").unwrap();
            let name = copy.path().file_name().unwrap().to_str().unwrap().to_string();
            assert!(name.is_ascii());
            assert!(name.ends_with(".pptx"));
            assert_eq!(fs::read(copy.path()).unwrap(), b"deck");
            copy.path().to_path_buf()
        };

        assert!(!copy_path.exists());
        assert!(source.exists());
    }

    #[test]
    fn test_install_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = dir.path().join("abc.pdf");
        let target = dir.path().join("01_deck.pdf");
        fs::write(&rendered, b"new").unwrap();
        fs::write(&target, b"old").unwrap();

        install(&rendered, &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"new");
        assert!(!rendered.exists());
    }

    #[test]
    fn test_options_builder() {
        let options = ConvertOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_min_pdf_bytes(10)
            .with_export_filter("pdf");

        assert_eq!(options.timeout(), Duration::from_secs(5));
        assert_eq!(options.min_pdf_bytes(), 10);
        assert_eq!(options.export_filter(), "pdf");
        assert_eq!(ConvertOptions::default().timeout(), Duration::from_secs(240));
    }

    #[test]
    fn test_missing_engine_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = crate::locate::FixedLocator::new(dir.path().join("soffice"));
        let result = SofficeConverter::from_locator(&locator, ConvertOptions::default());
        assert!(matches!(result, Err(Error::EngineUnavailable)));
    }

    #[cfg(unix)]
    #[test]
    fn test_profile_url_escapes_reserved_characters() {
        let url = |path: &str| profile_url(Path::new(path)).unwrap().to_string();

        assert_eq!(url("/tmp/run 1/profile"), "file:///tmp/run%201/profile/");
        assert_eq!(url("/tmp/run#2/profile"), "file:///tmp/run%232/profile/");
        assert_eq!(url("/tmp/50%off/profile"), "file:///tmp/50%25off/profile/");
        assert_eq!(
            url("/home/홍길동/tmp/profile"),
            "file:///home/%ED%99%8D%EA%B8%B8%EB%8F%99/tmp/profile/"
        );
    }

    #[test]
    fn test_profile_url_makes_relative_paths_absolute() {
        let url = profile_url(Path::new("work/profile")).unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/work/profile/"));
    }

    #[test]
    fn test_reset_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join(PROFILE_DIR);
        fs::create_dir_all(profile.join("user")).unwrap();
        fs::write(profile.join("user/.lock"), b"locked").unwrap();

        reset_profile(&profile);
        assert!(!profile.exists());

        // Already gone is fine.
        reset_profile(&profile);
    }
}
