//! Low-level JSON writing into byte buffers
//!
//! The envelope is assembled by hand rather than through `serde::Serialize` so that
//! pre-serialized attribute blobs can be spliced in verbatim and numbers keep the
//! compact form the ingest API expects (`3` rather than `3.0`).

use std::fmt::{Display, LowerExp};
use std::io::{self, Write};

/// Floats with a magnitude outside `[1e-6, 1e21)` are written in exponent form.
const EXPONENT_LOW: f64 = 1e-6;
const EXPONENT_HIGH: f64 = 1e21;

/// Appends an escaped JSON string.
pub(crate) fn write_string(buf: &mut Vec<u8>, value: &str) -> io::Result<()> {
    serde_json::to_writer(&mut *buf, value).map_err(io::Error::from)
}

/// Appends an integer.
pub(crate) fn write_int<T: Display>(buf: &mut Vec<u8>, value: T) -> io::Result<()> {
    write!(buf, "{}", value)
}

/// Appends an `f64` in its shortest round-trip form.
pub(crate) fn write_f64(buf: &mut Vec<u8>, value: f64) -> io::Result<()> {
    write_float(buf, value, value)
}

/// Appends an `f32` in its shortest round-trip form, without widening it first.
pub(crate) fn write_f32(buf: &mut Vec<u8>, value: f32) -> io::Result<()> {
    write_float(buf, value, f64::from(value))
}

fn write_float<T: Display + LowerExp>(buf: &mut Vec<u8>, value: T, wide: f64) -> io::Result<()> {
    // JSON has no representation for NaN or infinities.
    if !wide.is_finite() {
        buf.extend_from_slice(b"null");
        return Ok(());
    }

    let abs = wide.abs();
    if abs != 0.0 && !(EXPONENT_LOW..EXPONENT_HIGH).contains(&abs) {
        write!(buf, "{:e}", value)
    } else {
        write!(buf, "{}", value)
    }
}

/// Writes the fields of a JSON object, inserting separators as needed.
///
/// The caller writes the surrounding braces; `ObjectWriter` only tracks whether a comma
/// is due before the next key.
pub(crate) struct ObjectWriter<'a> {
    buf: &'a mut Vec<u8>,
    needs_comma: bool,
}

impl<'a> ObjectWriter<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>) -> Self {
        Self {
            buf,
            needs_comma: false,
        }
    }

    /// Writes `"key":` and returns the buffer so the caller can append the value.
    pub(crate) fn key(&mut self, key: &str) -> io::Result<&mut Vec<u8>> {
        if self.needs_comma {
            self.buf.push(b',');
        }
        self.needs_comma = true;
        write_string(self.buf, key)?;
        self.buf.push(b':');
        Ok(&mut *self.buf)
    }

    pub(crate) fn string_field(&mut self, key: &str, value: &str) -> io::Result<()> {
        let buf = self.key(key)?;
        write_string(buf, value)
    }

    pub(crate) fn int_field<T: Display>(&mut self, key: &str, value: T) -> io::Result<()> {
        let buf = self.key(key)?;
        write_int(buf, value)
    }

    pub(crate) fn float_field(&mut self, key: &str, value: f64) -> io::Result<()> {
        let buf = self.key(key)?;
        write_f64(buf, value)
    }

    /// Writes a field whose value is already-encoded JSON.
    pub(crate) fn raw_field(&mut self, key: &str, raw: &[u8]) -> io::Result<()> {
        let buf = self.key(key)?;
        buf.extend_from_slice(raw);
        Ok(())
    }
}
