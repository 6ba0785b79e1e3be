use std::io::{self, Read, Write};

/// Longest LEB128 encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Write `value` as an unsigned LEB128 varint. Returns the bytes written.
pub fn write_varint<W: Write>(writer: &mut W, mut value: u64) -> io::Result<usize> {
    let mut buf = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf[len] = byte;
        len += 1;
        if value == 0 {
            break;
        }
    }
    writer.write_all(&buf[..len])?;
    Ok(len)
}

/// Encoded length of `value` in bytes.
pub fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Read an unsigned LEB128 varint.
///
/// Fails with `UnexpectedEof` when the reader ends mid-varint and with
/// `InvalidData` when the value does not fit a `u64`.
pub fn read_varint<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut value: u64 = 0;
    let mut shift = 0u32;
    for _ in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        let byte = byte[0];
        if shift == 63 && byte > 1 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"));
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        let written = write_varint(&mut buf, value).unwrap();
        assert_eq!(written, buf.len());
        assert_eq!(varint_len(value), buf.len());
        buf
    }

    #[test]
    fn varint_small() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(5), [0x05]);
        assert_eq!(encode(127), [0x7F]);
    }

    #[test]
    fn varint_multi_byte_layout() {
        assert_eq!(encode(128), [0x80, 0x01]);
        assert_eq!(encode(300), [0xAC, 0x02]);
    }

    #[test]
    fn varint_large() {
        let buf = encode(1_000_000);
        assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), 1_000_000);
    }

    #[test]
    fn varint_max_u64() {
        let buf = encode(u64::MAX);
        assert_eq!(buf.len(), MAX_VARINT_LEN);
        assert_eq!(read_varint(&mut buf.as_slice()).unwrap(), u64::MAX);
    }

    #[test]
    fn read_varint_truncated() {
        let err = read_varint(&mut [0x80u8].as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn read_varint_overflow() {
        let bytes = [0xFFu8; 11];
        let err = read_varint(&mut bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn read_varint_consumes_only_its_bytes() {
        let bytes = [0xAC, 0x02, 0x07];
        let mut reader = bytes.as_slice();
        assert_eq!(read_varint(&mut reader).unwrap(), 300);
        assert_eq!(reader, [0x07]);
    }
}
