//! Append-only text sinks that generated output and traces are written to.

use std::io::{self, Write};

use crate::error::{Error, Result};

/// An append-only sink for text.
pub trait Output {
    fn append(&mut self, text: &str) -> Result<()>;

    fn append_char(&mut self, c: char) -> Result<()> {
        let mut buf = [0u8; 4];
        self.append(c.encode_utf8(&mut buf))
    }

    fn append_code_point(&mut self, code_point: u32) -> Result<()> {
        let c = char::from_u32(code_point).ok_or(Error::InvalidCodePoint(code_point))?;
        self.append_char(c)
    }

    fn println(&mut self, text: &str) -> Result<()> {
        self.append(text)?;
        self.append_char('\n')
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl Output for String {
    fn append(&mut self, text: &str) -> Result<()> {
        self.push_str(text);
        Ok(())
    }

    fn append_char(&mut self, c: char) -> Result<()> {
        self.push(c);
        Ok(())
    }
}

impl<O: Output + ?Sized> Output for &mut O {
    fn append(&mut self, text: &str) -> Result<()> {
        (**self).append(text)
    }

    fn append_char(&mut self, c: char) -> Result<()> {
        (**self).append_char(c)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

impl<O: Output + ?Sized> Output for Box<O> {
    fn append(&mut self, text: &str) -> Result<()> {
        (**self).append(text)
    }

    fn append_char(&mut self, c: char) -> Result<()> {
        (**self).append_char(c)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}

/// Writes text to any [`io::Write`] through a buffer.
pub struct IoOutput<W: Write> {
    writer: io::BufWriter<W>,
}

impl<W: Write> IoOutput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: io::BufWriter::new(writer),
        }
    }
}

impl IoOutput<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl IoOutput<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> Output for IoOutput<W> {
    fn append(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes())?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Forwards every complete line of text to the `log` facade.
pub struct LogOutput {
    level: log::Level,
    line: String,
}

impl LogOutput {
    pub fn new(level: log::Level) -> Self {
        Self {
            level,
            line: String::new(),
        }
    }
}

impl Default for LogOutput {
    fn default() -> Self {
        Self::new(log::Level::Info)
    }
}

impl Output for LogOutput {
    fn append(&mut self, text: &str) -> Result<()> {
        let mut rest = text;
        while let Some(end) = rest.find('\n') {
            self.line.push_str(&rest[..end]);
            log::log!(self.level, "{}", self.line);
            self.line.clear();
            rest = &rest[end + 1..];
        }
        self.line.push_str(rest);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.line.is_empty() {
            log::log!(self.level, "{}", self.line);
            self.line.clear();
        }
        Ok(())
    }
}

impl Drop for LogOutput {
    fn drop(&mut self) {
        let _ = Output::flush(self);
    }
}
