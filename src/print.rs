//! Submission of documents to the OS default printer.
//!
//! The platform branch lives in [`PrintCommand::for_host`]; the pipeline only
//! sees the [`PrintDispatcher`] trait.
//!
//! | Host          | Command                                                     |
//! |---------------|-------------------------------------------------------------|
//! | Linux / macOS | `lp <file>` (CUPS)                                          |
//! | Windows       | `powershell -Command Start-Process -Verb Print -FilePath '<file>'` |

use crate::error::PrintError;
use crate::utils::truncate_for_log;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use tokio::process::Command;
use tracing::{info, instrument};

/// Anything that can send a document to a printer.
pub trait PrintDispatcher {
    async fn print(&self, path: &Path) -> Result<(), PrintError>;
}

/// An external program invoked with the document path as its last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Pass the path as a PowerShell single-quoted literal.
    pub quote_path: bool,
}

impl PrintCommand {
    /// Pick the print command for an OS name as reported by `std::env::consts::OS`.
    pub fn for_os(os: &str) -> Result<Self, PrintError> {
        match os {
            "linux" | "macos" | "freebsd" | "openbsd" | "netbsd" => Ok(Self {
                program: "lp".to_string(),
                args: Vec::new(),
                quote_path: false,
            }),
            "windows" => Ok(Self {
                program: "powershell".to_string(),
                args: vec![
                    "-NoProfile".to_string(),
                    "-Command".to_string(),
                    "Start-Process".to_string(),
                    "-Verb".to_string(),
                    "Print".to_string(),
                    "-FilePath".to_string(),
                ],
                quote_path: true,
            }),
            other => Err(PrintError::Unsupported(other.to_string())),
        }
    }

    pub fn for_host() -> Result<Self, PrintError> {
        Self::for_os(std::env::consts::OS)
    }
}

/// Prints through an OS command.
#[derive(Debug, Clone)]
pub struct SystemPrinter {
    command: Result<PrintCommand, String>,
}

impl SystemPrinter {
    pub fn new(command: PrintCommand) -> Self {
        Self {
            command: Ok(command),
        }
    }

    /// Printer for the current host. Construction always succeeds; on an
    /// unsupported OS every print call fails with [`PrintError::Unsupported`].
    pub fn for_host() -> Self {
        Self {
            command: PrintCommand::for_host().map_err(|_| std::env::consts::OS.to_string()),
        }
    }
}

impl PrintDispatcher for SystemPrinter {
    #[instrument(level = "info", skip(self), fields(path = %path.display()))]
    async fn print(&self, path: &Path) -> Result<(), PrintError> {
        if !path.exists() {
            return Err(PrintError::MissingFile(path.to_path_buf()));
        }
        let command = self
            .command
            .as_ref()
            .map_err(|os| PrintError::Unsupported(os.clone()))?;

        let mut args: Vec<OsString> = command.args.iter().map(OsString::from).collect();
        if command.quote_path {
            let quoted = path.display().to_string().replace('\'', "''");
            args.push(OsString::from(format!("'{quoted}'")));
        } else {
            args.push(path.as_os_str().to_os_string());
        }

        let output = Command::new(&command.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PrintError::CommandNotFound(command.program.clone()),
                _ => PrintError::Spawn(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.to_lowercase().contains("no default destination") {
                return Err(PrintError::NoDefaultPrinter);
            }
            return Err(PrintError::CommandFailed {
                status: output.status.to_string(),
                stderr: truncate_for_log(&stderr, 300),
            });
        }

        info!(program = %command.program, "Print job submitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "scope_news_print_{}_{}.docx",
            std::process::id(),
            name
        ));
        std::fs::write(&path, b"doc").unwrap();
        path
    }

    fn sh(script: &str) -> PrintCommand {
        PrintCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "print".to_string()],
            quote_path: false,
        }
    }

    #[test]
    fn test_for_os_selects_platform_command() {
        assert_eq!(PrintCommand::for_os("linux").unwrap().program, "lp");
        assert_eq!(PrintCommand::for_os("macos").unwrap().program, "lp");
        let windows = PrintCommand::for_os("windows").unwrap();
        assert_eq!(windows.program, "powershell");
        assert!(windows.args.contains(&"Print".to_string()));
        assert!(windows.quote_path);
        assert!(matches!(
            PrintCommand::for_os("plan9"),
            Err(PrintError::Unsupported(os)) if os == "plan9"
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_reported() {
        let printer = SystemPrinter::new(sh("exit 0"));
        let err = printer
            .print(Path::new("/definitely/not/here.docx"))
            .await
            .unwrap_err();
        assert!(matches!(err, PrintError::MissingFile(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command() {
        let path = temp_file("ok");
        let printer = SystemPrinter::new(sh(r#"test -f "$1""#));
        printer.print(&path).await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_default_destination() {
        let path = temp_file("nodest");
        let printer = SystemPrinter::new(sh("echo 'lp: Error - No default destination.' >&2; exit 1"));
        let err = printer.print(&path).await.unwrap_err();
        assert!(matches!(err, PrintError::NoDefaultPrinter));
        let _ = std::fs::remove_file(&path);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit() {
        let path = temp_file("fail");
        let printer = SystemPrinter::new(sh("echo 'printer on fire' >&2; exit 3"));
        let err = printer.print(&path).await.unwrap_err();
        match err {
            PrintError::CommandFailed { stderr, .. } => assert_eq!(stderr, "printer on fire"),
            other => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_command_not_found() {
        let path = temp_file("missingcmd");
        let printer = SystemPrinter::new(PrintCommand {
            program: "scope-news-no-such-print-command".to_string(),
            args: Vec::new(),
            quote_path: false,
        });
        let err = printer.print(&path).await.unwrap_err();
        assert!(matches!(err, PrintError::CommandNotFound(p) if p == "scope-news-no-such-print-command"));
        let _ = std::fs::remove_file(&path);
    }
}
