//! Direct COM scripting of the word processor (Windows)

use super::context::ConversionContext;
use super::process::{expect_output, run_bounded, script_file};
use super::traits::ConversionStrategy;
use crate::error::ConversionError;
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

const NAME: &str = "com-automation";

// 17 = wdFormatPDF
const VBSCRIPT: &str = r#"Option Explicit
Dim args, word, doc
Set args = WScript.Arguments
On Error Resume Next
Set word = CreateObject("Word.Application")
If Err.Number <> 0 Then
    WScript.StdErr.WriteLine "Word.Application unavailable: " & Err.Description
    WScript.Quit 2
End If
word.Visible = False
Set doc = word.Documents.Open(args(0), False, True)
If Err.Number = 0 Then
    doc.SaveAs2 args(1), 17
End If
If Err.Number <> 0 Then
    WScript.StdErr.WriteLine Err.Description
    If Not doc Is Nothing Then doc.Close False
    word.Quit
    WScript.Quit 1
End If
doc.Close False
word.Quit
WScript.Quit 0
"#;

/// Scripts `Word.Application` through `cscript` and `SaveAs2`
///
/// Only available on Windows hosts with the Windows Script Host present.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComAutomationStrategy;

impl ComAutomationStrategy {
    /// Create the strategy
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConversionStrategy for ComAutomationStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn probe(&self, _ctx: &ConversionContext) -> bool {
        cfg!(windows) && which::which("cscript").is_ok()
    }

    async fn convert(
        &self,
        source: &Path,
        target: &Path,
        ctx: &ConversionContext,
    ) -> crate::Result<()> {
        if !cfg!(windows) {
            return Err(ConversionError::Unavailable { strategy: NAME }.into());
        }

        let source = std::path::absolute(source)?;
        let target = std::path::absolute(target)?;
        let script = script_file(".vbs", VBSCRIPT)?;

        let mut cmd = Command::new("cscript");
        cmd.arg("//NoLogo")
            .arg(&*script)
            .arg(&source)
            .arg(&target);
        let output = run_bounded(cmd, ctx.config().automation_timeout, NAME).await?;

        expect_output(&output, &target, NAME)?;
        Ok(())
    }
}
