//! System clipboard access through the terminal's OSC 52 escape.

use std::io::Write;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub trait Clipboard {
    fn copy(&mut self, text: &str) -> Result<()>;
}

/// Asks the hosting terminal to set the clipboard; works over SSH too.
pub struct Osc52<W: Write> {
    out: W,
}

impl<W: Write> Osc52<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl Osc52<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> Clipboard for Osc52<W> {
    fn copy(&mut self, text: &str) -> Result<()> {
        write!(self.out, "\x1b]52;c;{}\x07", STANDARD.encode(text))
            .context("failed to write clipboard escape")?;
        self.out.flush().context("failed to flush clipboard escape")?;
        Ok(())
    }
}
