use std::io::{self, Read};

use arca_types::ByteRange;

/// Forward-only reader over the content being uploaded.
///
/// Tracks its absolute offset so a part can only be read from the exact
/// position where the previous one ended. The engine takes the source by
/// value for each part and hands it back on success.
#[derive(Debug)]
pub struct ByteSource<R> {
    reader: R,
    position: u64,
}

/// Outcome of reading one part from a [`ByteSource`].
#[derive(Debug)]
pub(crate) enum PartRead {
    Complete(Vec<u8>),
    Truncated { read: u64 },
    OutOfOrder { position: u64 },
}

impl<R: Read> ByteSource<R> {
    /// A source positioned at offset 0.
    pub fn new(reader: R) -> Self {
        Self::at_offset(reader, 0)
    }

    /// A source whose next byte sits at absolute `offset`.
    pub fn at_offset(reader: R, offset: u64) -> Self {
        Self {
            reader,
            position: offset,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Read exactly the bytes of `range`, which must start at the current
    /// position.
    pub(crate) fn read_part(&mut self, range: ByteRange) -> io::Result<PartRead> {
        if range.from() != self.position {
            return Ok(PartRead::OutOfOrder {
                position: self.position,
            });
        }
        let expected = range.length();
        let mut body = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
        let read = read_up_to(&mut self.reader, &mut body, expected)?;
        self.position += read;
        if read < expected {
            return Ok(PartRead::Truncated { read });
        }
        Ok(PartRead::Complete(body))
    }

    /// Returns `true` if the reader has no bytes left.
    pub(crate) fn is_exhausted(&mut self) -> io::Result<bool> {
        let mut extra = [0u8; 1];
        loop {
            match self.reader.read(&mut extra) {
                Ok(0) => return Ok(true),
                Ok(_) => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn read_up_to<R: Read>(reader: &mut R, body: &mut Vec<u8>, limit: u64) -> io::Result<u64> {
    let read = reader.by_ref().take(limit).read_to_end(body)?;
    Ok(read as u64)
}
