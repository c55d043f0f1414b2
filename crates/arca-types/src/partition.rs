use crate::error::TypeError;
use crate::range::ByteRange;

/// Split `content_length` bytes into consecutive ranges of `part_size` bytes.
///
/// Ranges are `[0, part_size - 1], [part_size, 2 * part_size - 1], ...` with
/// the last range ending at `content_length - 1`. Content that fits in one
/// part yields exactly one range; empty content yields no ranges since a
/// `ByteRange` cannot describe zero bytes.
///
/// The output depends only on the two inputs. Sender and receiver derive the
/// same chunk boundaries from the part size they agreed on.
pub fn create_byte_ranges(part_size: u64, content_length: u64) -> Result<Vec<ByteRange>, TypeError> {
    if part_size == 0 {
        return Err(TypeError::ZeroPartSize);
    }

    let count = part_count(part_size, content_length)?;
    let mut ranges = Vec::with_capacity(count as usize);
    let mut from = 0u64;
    while from < content_length {
        let length = part_size.min(content_length - from);
        ranges.push(ByteRange::from_offset_length(from, length)?);
        from += length;
    }
    Ok(ranges)
}

/// Number of parts [`create_byte_ranges`] produces for the same inputs.
pub fn part_count(part_size: u64, content_length: u64) -> Result<u64, TypeError> {
    if part_size == 0 {
        return Err(TypeError::ZeroPartSize);
    }
    Ok(content_length.div_ceil(part_size))
}
