use anyhow::{Result, bail};

/// Bounds-checked cursor over a borrowed byte buffer.
///
/// Container parsing never trusts its input: every read is checked against
/// the buffer length and a truncated buffer surfaces as an error instead of
/// a panic, so one corrupt archive entry cannot take down enumeration.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn at(buf: &'a [u8], pos: usize) -> Result<Self> {
        let mut r = Self::new(buf);
        r.seek(pos)?;
        Ok(r)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.buf.len() {
            bail!("seek to {pos} past end of {}-byte buffer", self.buf.len());
        }
        self.pos = pos;
        Ok(())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&e| e <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => bail!(
                "unexpected end of buffer: need {n} bytes at offset {}, have {}",
                self.pos,
                self.buf.len().saturating_sub(self.pos)
            ),
        }
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u16_be(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32_be(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Unsigned LEB128 as used by the DEX string pool, capped at 5 bytes.
    pub fn uleb128(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for shift in 0..5 {
            let byte = self.u8()?;
            value |= u32::from(byte & 0x7f) << (shift * 7);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        bail!("uleb128 longer than 5 bytes at offset {}", self.pos);
    }

    /// NUL-terminated bytes starting at the cursor, terminator excluded.
    pub fn cstr_bytes(&mut self) -> Result<&'a [u8]> {
        let start = self.pos;
        while self.pos < self.buf.len() {
            if self.buf[self.pos] == 0 {
                let slice = &self.buf[start..self.pos];
                self.pos += 1;
                return Ok(slice);
            }
            self.pos += 1;
        }
        bail!("unterminated string at offset {start}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_little_and_big_endian() {
        let mut r = Reader::new(&[0x0a, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(r.u8().unwrap(), 0x0a);
        assert_eq!(r.u32_le().unwrap(), 0x1234_5678);

        let mut r = Reader::new(&[0xca, 0xfe, 0xba, 0xbe]);
        assert_eq!(r.u32_be().unwrap(), 0xcafe_babe);
    }

    #[test]
    fn truncated_read_is_an_error_not_a_panic() {
        let mut r = Reader::new(&[0x01, 0x02]);
        assert!(r.u32_le().is_err());
        // cursor unchanged after a failed read
        assert_eq!(r.u16_le().unwrap(), 0x0201);
    }

    #[test]
    fn uleb128_decodes_multi_byte_values() {
        let mut r = Reader::new(&[0x7f, 0x80, 0x01, 0xb4, 0x07]);
        assert_eq!(r.uleb128().unwrap(), 127);
        assert_eq!(r.uleb128().unwrap(), 128);
        assert_eq!(r.uleb128().unwrap(), 948);
    }

    #[test]
    fn uleb128_rejects_runaway_encoding() {
        let mut r = Reader::new(&[0x80, 0x80, 0x80, 0x80, 0x80, 0x80]);
        assert!(r.uleb128().is_err());
    }

    #[test]
    fn cstr_requires_terminator() {
        let mut r = Reader::new(b"hello\0world");
        assert_eq!(r.cstr_bytes().unwrap(), b"hello");
        assert!(r.cstr_bytes().is_err());
    }
}
