use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Clipboard programs tried in order before falling back to OSC 52.
const TOOLS: [(&str, &[&str]); 5] = [
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip", &[]),
];

pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<()>;
}

/// Copies through the system clipboard tool, or asks the terminal to do it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn copy_with_tool(program: &str, args: &[&str], text: &str) -> Result<bool> {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::Clipboard(format!("{}: {}", program, e))),
        };

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes())?;
        }
        let status = child.wait()?;
        if !status.success() {
            log::debug!("{} exited with {}", program, status);
        }
        Ok(status.success())
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&self, text: &str) -> Result<()> {
        for (program, args) in TOOLS {
            match Self::copy_with_tool(program, args, text) {
                Ok(true) => {
                    log::debug!("Copied {} bytes with {}", text.len(), program);
                    return Ok(());
                }
                Ok(false) => continue,
                Err(e) => log::debug!("Clipboard tool failed: {}", e),
            }
        }

        log::debug!("No clipboard tool available, using OSC 52");
        let mut stdout = std::io::stdout();
        write_osc52(&mut stdout, text)
    }
}

/// Writes the OSC 52 "set clipboard" escape for `text`.
pub fn write_osc52<W: Write>(out: &mut W, text: &str) -> Result<()> {
    write!(out, "\x1b]52;c;{}\x07", STANDARD.encode(text))?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osc52_payload_is_base64() {
        let mut buf = Vec::new();
        write_osc52(&mut buf, "https://a.example").unwrap();
        let written = String::from_utf8(buf).unwrap();
        assert_eq!(written, "\x1b]52;c;aHR0cHM6Ly9hLmV4YW1wbGU=\x07");
    }

    #[test]
    fn missing_tool_is_not_an_error() {
        let copied =
            SystemClipboard::copy_with_tool("clients-radar-no-such-tool", &[], "x").unwrap();
        assert!(!copied);
    }
}
