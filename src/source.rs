//! Byte sources the decoders pull compressed data from.

use crate::error::SeekError;

/// A seekable source of compressed bytes.
///
/// Reads are synchronous. If the source has to block, that happens inside
/// [`ByteSource::read`] and is not the decoder's concern.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes. Returns the number of bytes actually read.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Move to an absolute offset.
    fn seek(&mut self, offset: u64) -> Result<(), SeekError>;

    /// True when no more bytes can be read.
    fn eos(&self) -> bool;

    /// Current absolute offset.
    fn pos(&self) -> u64;
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn seek(&mut self, offset: u64) -> Result<(), SeekError> {
        (**self).seek(offset)
    }

    fn eos(&self) -> bool {
        (**self).eos()
    }

    fn pos(&self) -> u64 {
        (**self).pos()
    }
}

/// In-memory source, e.g. data embedded with `include_bytes!`.
#[derive(Debug, Clone, Default)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    /// * 'data' - Whole byte array. The decoder starts at the current position, see [`SliceSource::at`].
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource { data, pos: 0 }
    }

    /// Source positioned at `offset`, e.g. the start of a sample inside a sound bank.
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        SliceSource {
            data,
            pos: offset.min(data.len()),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for SliceSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let remains = &self.data[self.pos..];
        let n = buf.len().min(remains.len());
        buf[..n].copy_from_slice(&remains[..n]);
        self.pos += n;
        n
    }

    fn seek(&mut self, offset: u64) -> Result<(), SeekError> {
        match usize::try_from(offset) {
            Ok(pos) if pos <= self.data.len() => {
                self.pos = pos;
                Ok(())
            }
            _ => Err(SeekError { offset }),
        }
    }

    fn eos(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }
}

#[cfg(feature = "std")]
pub use self::io::IoSource;

#[cfg(feature = "std")]
mod io {
    extern crate std;

    use super::ByteSource;
    use crate::error::SeekError;
    use std::io::{ErrorKind, Read, Seek, SeekFrom};

    /// Adapter for any [`Read`] + [`Seek`] stream (files, cursors).
    ///
    /// I/O errors other than `Interrupted` end the stream.
    #[derive(Debug)]
    pub struct IoSource<R> {
        inner: R,
        pos: u64,
        eos: bool,
    }

    impl<R: Read + Seek> IoSource<R> {
        pub fn new(mut inner: R) -> std::io::Result<Self> {
            let pos = inner.stream_position()?;
            Ok(IoSource {
                inner,
                pos,
                eos: false,
            })
        }

        pub fn into_inner(self) -> R {
            self.inner
        }
    }

    impl<R: Read + Seek> ByteSource for IoSource<R> {
        fn read(&mut self, buf: &mut [u8]) -> usize {
            let mut filled = 0;
            while filled < buf.len() {
                match self.inner.read(&mut buf[filled..]) {
                    Ok(0) => {
                        self.eos = true;
                        break;
                    }
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => {}
                    Err(e) => {
                        log::warn!("read failed at offset {}: {}", self.pos + filled as u64, e);
                        self.eos = true;
                        break;
                    }
                }
            }
            self.pos += filled as u64;
            filled
        }

        fn seek(&mut self, offset: u64) -> Result<(), SeekError> {
            match self.inner.seek(SeekFrom::Start(offset)) {
                Ok(pos) => {
                    self.pos = pos;
                    self.eos = false;
                    Ok(())
                }
                Err(e) => {
                    log::warn!("seek to {} failed: {}", offset, e);
                    Err(SeekError { offset })
                }
            }
        }

        fn eos(&self) -> bool {
            self.eos
        }

        fn pos(&self) -> u64 {
            self.pos
        }
    }
}
