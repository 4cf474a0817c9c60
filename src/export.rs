use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::Deserialize;

use crate::error::ConversionError;

pub const DEFAULT_SOFFICE: &str = "soffice";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStrategy {
    /// Microsoft Word, driven by osascript (macOS) or PowerShell COM (Windows).
    Desktop,
    /// `soffice --headless --convert-to pdf`.
    Headless,
}

impl fmt::Display for ExportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportStrategy::Desktop => f.write_str("desktop"),
            ExportStrategy::Headless => f.write_str("headless"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PdfExporter {
    strategies: Vec<ExportStrategy>,
    soffice: PathBuf,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self {
            strategies: vec![ExportStrategy::Desktop, ExportStrategy::Headless],
            soffice: PathBuf::from(DEFAULT_SOFFICE),
        }
    }
}

impl PdfExporter {
    pub fn new(strategies: Vec<ExportStrategy>, soffice: impl Into<PathBuf>) -> Self {
        Self {
            strategies,
            soffice: soffice.into(),
        }
    }

    /// Converts `docx` to `<out_dir>/<stem>.pdf`, trying each strategy in order.
    pub fn convert(&self, docx: &Path, out_dir: &Path) -> Result<PathBuf, ConversionError> {
        if self.strategies.is_empty() {
            return Err(ConversionError::Unavailable(docx.display().to_string()));
        }
        if !docx.is_file() {
            return Err(ConversionError::AllStrategiesFailed(vec![format!(
                "input not found: {}",
                docx.display()
            )]));
        }
        let stem = docx
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "report".to_string());
        let pdf = out_dir.join(format!("{stem}.pdf"));

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            let attempt = match strategy {
                ExportStrategy::Desktop => self.run_desktop(docx, &pdf),
                ExportStrategy::Headless => self.run_headless(docx, out_dir),
            };
            match attempt.and_then(|_| expect_pdf(&pdf)) {
                Ok(()) => return Ok(pdf),
                Err(reason) => failures.push(format!("{strategy}: {reason}")),
            }
        }
        Err(ConversionError::AllStrategiesFailed(failures))
    }

    fn run_headless(&self, docx: &Path, out_dir: &Path) -> Result<(), String> {
        let mut cmd = Command::new(&self.soffice);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(docx);
        run(cmd, &self.soffice.display().to_string())
    }

    fn run_desktop(&self, docx: &Path, pdf: &Path) -> Result<(), String> {
        let docx = absolute(docx);
        let pdf = absolute(pdf);
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(word_applescript(&docx, &pdf));
            run(cmd, "osascript")
        } else if cfg!(windows) {
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-NonInteractive", "-Command"])
                .arg(word_powershell(&docx, &pdf));
            run(cmd, "powershell")
        } else {
            Err("desktop suite automation is not available on this platform".to_string())
        }
    }
}

fn run(mut cmd: Command, program: &str) -> Result<(), String> {
    let output: Output = cmd.output().map_err(|e| format!("{program}: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{program} exited with {}: {}", output.status, stderr.trim()));
    }
    Ok(())
}

fn expect_pdf(pdf: &Path) -> Result<(), String> {
    match std::fs::metadata(pdf) {
        Ok(m) if m.len() > 0 => Ok(()),
        Ok(_) => Err(format!("empty output: {}", pdf.display())),
        Err(_) => Err(format!("no output produced: {}", pdf.display())),
    }
}

fn absolute(p: &Path) -> PathBuf {
    std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf())
}

fn word_applescript(docx: &Path, pdf: &Path) -> String {
    let esc = |p: &Path| p.display().to_string().replace('\\', "\\\\").replace('"', "\\\"");
    format!(
        r#"tell application "Microsoft Word"
    open POSIX file "{src}"
    set theDoc to active document
    save as theDoc file name (POSIX file "{dst}" as string) file format format PDF
    close theDoc saving no
end tell"#,
        src = esc(docx),
        dst = esc(pdf)
    )
}

fn word_powershell(docx: &Path, pdf: &Path) -> String {
    let esc = |p: &Path| p.display().to_string().replace('\'', "''");
    // 17 = wdFormatPDF
    format!(
        "$ErrorActionPreference = 'Stop'; $w = New-Object -ComObject Word.Application; \
         try {{ $d = $w.Documents.Open('{src}'); $d.SaveAs([ref]'{dst}', [ref]17); $d.Close() }} \
         finally {{ $w.Quit() }}",
        src = esc(docx),
        dst = esc(pdf)
    )
}
