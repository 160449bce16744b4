//! Resource handles: the single-use inputs a build reads its document from.
//!
//! Two families exist, mirroring the two kinds of input a caller may hold:
//! character-oriented handles ([`CharStream`]) and byte-oriented handles
//! ([`ByteStream`]). A build takes ownership of the handle, reads it to the
//! end, and closes it before returning, whatever the outcome.

use std::io::{self, Cursor, Read};

/// A character-oriented resource handle.
///
/// # Example
///
/// ```rust
/// use sqlsession::{CharStream, TextReader};
///
/// let mut reader = TextReader::from_string("[settings]\ncache_enabled = true\n");
/// let mut text = String::new();
/// reader.read_chars(&mut text).unwrap();
/// assert!(text.starts_with("[settings]"));
/// reader.close().unwrap();
/// ```
pub trait CharStream {
    /// Append the remaining text of the handle to `buf`.
    ///
    /// Returns the number of bytes appended.
    fn read_chars(&mut self, buf: &mut String) -> io::Result<usize>;

    /// Release the handle.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A byte-oriented resource handle.
pub trait ByteStream {
    /// Append the remaining bytes of the handle to `buf`.
    ///
    /// Returns the number of bytes appended.
    fn read_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize>;

    /// Release the handle.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "resource handle is closed")
}

/// Adapts any [`Read`] carrying UTF-8 text into a [`CharStream`].
#[derive(Debug)]
pub struct TextReader<R> {
    inner: Option<R>,
}

impl<R: Read> TextReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    /// Whether [`CharStream::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl TextReader<Cursor<String>> {
    /// Create a reader over in-memory text.
    pub fn from_string(text: impl Into<String>) -> Self {
        Self::new(Cursor::new(text.into()))
    }
}

impl<R: Read> CharStream for TextReader<R> {
    fn read_chars(&mut self, buf: &mut String) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read_to_string(buf),
            None => Err(closed_error()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        Ok(())
    }
}

/// Adapts any [`Read`] into a [`ByteStream`].
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: Option<R>,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    /// Whether [`ByteStream::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl ByteReader<Cursor<Vec<u8>>> {
    /// Create a reader over in-memory bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Cursor::new(bytes.into()))
    }
}

impl<R: Read> ByteStream for ByteReader<R> {
    fn read_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        match self.inner.as_mut() {
            Some(inner) => inner.read_to_end(buf),
            None => Err(closed_error()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        Ok(())
    }
}

impl<S: CharStream + ?Sized> CharStream for &mut S {
    fn read_chars(&mut self, buf: &mut String) -> io::Result<usize> {
        (**self).read_chars(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read_bytes(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        (**self).read_bytes(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}
