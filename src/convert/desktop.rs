//! Office suite automation through the platform scripting host

use super::context::ConversionContext;
use super::process::{expect_output, run_bounded, script_file};
use super::traits::ConversionStrategy;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

const NAME: &str = "desktop-suite";

const WORD_APP_BUNDLE: &str = "/Applications/Microsoft Word.app";

const APPLESCRIPT: &str = r#"on run argv
    set srcPath to POSIX file (item 1 of argv)
    set dstPath to (POSIX file (item 2 of argv)) as text
    tell application "Microsoft Word"
        open srcPath
        set theDoc to active document
        save as theDoc file name dstPath file format format PDF
        close theDoc saving no
    end tell
end run
"#;

const POWERSHELL: &str = r#"param([string]$Source, [string]$Target)
$ErrorActionPreference = 'Stop'
$word = New-Object -ComObject Word.Application
$word.Visible = $false
try {
    $doc = $word.Documents.Open($Source, $false, $true)
    try {
        $doc.ExportAsFixedFormat($Target, 17)
    } finally {
        $doc.Close($false)
    }
} finally {
    $word.Quit()
}
"#;

/// Scripting host used to drive the word processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationHost {
    /// `osascript` on macOS
    AppleScript,
    /// Windows PowerShell
    PowerShell,
    /// No supported host on this platform
    Unsupported,
}

impl AutomationHost {
    /// Host for the platform this binary was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            AutomationHost::AppleScript
        } else if cfg!(windows) {
            AutomationHost::PowerShell
        } else {
            AutomationHost::Unsupported
        }
    }
}

/// Opens the source in the desktop word processor and saves it as PDF
#[derive(Debug, Clone, Copy)]
pub struct DesktopSuiteStrategy {
    host: AutomationHost,
}

impl DesktopSuiteStrategy {
    /// Strategy for the current platform
    pub fn new() -> Self {
        Self::with_host(AutomationHost::current())
    }

    /// Strategy pinned to a specific host
    pub fn with_host(host: AutomationHost) -> Self {
        Self { host }
    }
}

impl Default for DesktopSuiteStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversionStrategy for DesktopSuiteStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn probe(&self, _ctx: &ConversionContext) -> bool {
        match self.host {
            AutomationHost::AppleScript => {
                which::which("osascript").is_ok() && Path::new(WORD_APP_BUNDLE).exists()
            }
            AutomationHost::PowerShell => which::which("powershell").is_ok(),
            AutomationHost::Unsupported => false,
        }
    }

    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        ctx: &ConversionContext,
    ) -> crate::Result<()> {
        let source = std::path::absolute(source)?;
        let target = std::path::absolute(target)?;

        let output = match self.host {
            AutomationHost::AppleScript => {
                let mut cmd = Command::new("osascript");
                cmd.arg("-e").arg(APPLESCRIPT).arg(&source).arg(&target);
                run_bounded(cmd, ctx.config().automation_timeout, NAME).await?
            }
            AutomationHost::PowerShell => {
                let script = script_file(".ps1", POWERSHELL)?;
                let mut cmd = Command::new("powershell");
                cmd.args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-File"])
                    .arg(&*script)
                    .arg(&source)
                    .arg(&target);
                run_bounded(cmd, ctx.config().automation_timeout, NAME).await?
            }
            AutomationHost::Unsupported => {
                return Err(crate::error::ConversionError::Unavailable { strategy: NAME }.into());
            }
        };

        expect_output(&output, &target, NAME)?;
        Ok(())
    }
}
