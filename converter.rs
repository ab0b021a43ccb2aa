//! Runs the external conversion tool against a single file.

use futures::future::{BoxFuture, FutureExt};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::config::ConversionSettings;
use crate::error::{ConverterError, Result};

/// Longest stderr excerpt quoted in a conversion error
const STDERR_TAIL_CHARS: usize = 400;

/// Converts one source file into `output_dir`, returning the written path
pub trait Converter: Send + Sync {
    fn convert<'a>(&'a self, source: &'a Path, output_dir: &'a Path) -> BoxFuture<'a, Result<PathBuf>>;
}

/// `<output_dir>/<stem><suffix>.<extension>`; an existing file of that name
/// is overwritten by the tool.
pub fn output_path_for(source: &Path, output_dir: &Path, settings: &ConversionSettings) -> PathBuf {
    let mut name: OsString = source.file_stem().map(|s| s.to_os_string()).unwrap_or_default();
    name.push(&settings.output_suffix);
    name.push(".");
    name.push(&settings.output_extension);
    output_dir.join(name)
}

/// Invokes `<tool> [tool_args..] <source> <output>` and waits for it
#[derive(Debug, Clone)]
pub struct ToolConverter {
    program: String,
    args: Vec<String>,
    settings: ConversionSettings,
}

impl ToolConverter {
    pub fn new(settings: &ConversionSettings) -> Self {
        Self {
            program: settings.tool.clone(),
            args: settings.tool_args.clone(),
            settings: settings.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolve the tool through `PATH` (or as a direct path)
    pub fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    async fn run(&self, source: &Path, output_dir: &Path) -> Result<PathBuf> {
        let output_path = output_path_for(source, output_dir, &self.settings);
        let failure = |reason: String| ConverterError::ConversionProcess {
            path: source.to_path_buf(),
            program: self.program.clone(),
            reason,
        };

        debug!(
            "Running {} {:?} {} {}",
            self.program,
            self.args,
            source.display(),
            output_path.display()
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| failure(format!("failed to launch: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!("exited with {}{}", output.status, stderr_tail(&stderr))));
        }

        let written = tokio::fs::metadata(&output_path)
            .await
            .is_ok_and(|metadata| metadata.is_file());
        if !written {
            return Err(failure(format!(
                "exited successfully but did not write {}",
                output_path.display()
            )));
        }

        debug!("{} exited with {}", self.program, output.status);
        Ok(output_path)
    }
}

impl Converter for ToolConverter {
    fn convert<'a>(&'a self, source: &'a Path, output_dir: &'a Path) -> BoxFuture<'a, Result<PathBuf>> {
        self.run(source, output_dir).boxed()
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let count = trimmed.chars().count();
    let tail: String = trimmed.chars().skip(count.saturating_sub(STDERR_TAIL_CHARS)).collect();
    format!(": {}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_name_uses_stem_suffix_and_extension() {
        let settings = ConversionSettings::default();
        let out = output_path_for(Path::new("/captures/photo.jxr"), Path::new("/sdr"), &settings);
        assert_eq!(out, PathBuf::from("/sdr/photo-sdr.jpg"));

        let out = output_path_for(Path::new("game.2024.jxr"), Path::new("out"), &settings);
        assert_eq!(out, Path::new("out").join("game.2024-sdr.jpg"));
    }

    #[test]
    fn test_stderr_tail_is_bounded() {
        assert_eq!(stderr_tail("  \n"), "");
        assert_eq!(stderr_tail("bad header\n"), ": bad header");

        let long = "x".repeat(STDERR_TAIL_CHARS * 2);
        assert_eq!(stderr_tail(&long).len(), STDERR_TAIL_CHARS + 2);
    }

    #[tokio::test]
    async fn test_missing_tool_is_a_process_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jxr");
        std::fs::write(&source, b"data").unwrap();

        let settings = ConversionSettings {
            tool: "sdr-autoconvert-no-such-tool".to_string(),
            ..Default::default()
        };
        let converter = ToolConverter::new(&settings);
        assert!(converter.locate().is_none());

        let err = converter.convert(&source, dir.path()).await.unwrap_err();
        assert!(matches!(err, ConverterError::ConversionProcess { .. }));
        assert!(err.to_string().contains("failed to launch"));
    }

    #[cfg(unix)]
    fn script_settings(dir: &Path, body: &str) -> ConversionSettings {
        let script = dir.join("tool.sh");
        std::fs::write(&script, body).unwrap();
        ConversionSettings {
            tool: "sh".to_string(),
            tool_args: vec![script.to_string_lossy().into_owned()],
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_tool_writes_output() {
        let dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jxr");
        std::fs::write(&source, b"hdr").unwrap();

        let settings = script_settings(dir.path(), "cp \"$1\" \"$2\"\n");
        let converter = ToolConverter::new(&settings);

        let output = converter.convert(&source, out_dir.path()).await.unwrap();
        assert_eq!(output, out_dir.path().join("photo-sdr.jpg"));
        assert_eq!(std::fs::read(&output).unwrap(), b"hdr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_a_process_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jxr");
        std::fs::write(&source, b"hdr").unwrap();

        let settings = script_settings(dir.path(), "echo 'unsupported pixel format' >&2\nexit 3\n");
        let converter = ToolConverter::new(&settings);

        let err = converter.convert(&source, dir.path()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unsupported pixel format"), "{}", message);
        assert!(!dir.path().join("photo-sdr.jpg").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_exit_without_output_is_a_process_error() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("photo.jxr");
        std::fs::write(&source, b"hdr").unwrap();

        let settings = script_settings(dir.path(), "exit 0\n");
        let converter = ToolConverter::new(&settings);

        let err = converter.convert(&source, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("did not write"));
    }
}
