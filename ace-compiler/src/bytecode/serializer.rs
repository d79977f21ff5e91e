//! Little-endian primitive encode/decode helpers for the bytecode wire
//! format (spec §6: "network-irrelevant, little-endian integers, tightly
//! packed").
//!
//! `ace-compiler::emit` writes with `ByteWriter`; `ace-vm::bytecode_file` and
//! `ace-cli`'s decompiler read back with `ByteReader`.

/// An append-only little-endian byte buffer.
#[derive(Debug, Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn i64(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    /// `u32` length prefix followed by raw UTF-8 bytes, no terminator.
    pub fn string(&mut self, value: &str) {
        self.u32(value.len() as u32);
        self.bytes.extend_from_slice(value.as_bytes());
    }

    /// `u16` length prefix followed by raw UTF-8 bytes — used for type/member
    /// names, which the format caps shorter than string literals.
    pub fn short_string(&mut self, value: &str) {
        self.u16(value.len() as u16);
        self.bytes.extend_from_slice(value.as_bytes());
    }

    pub fn raw(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("unexpected end of bytecode stream")]
    Eof,
    #[error("invalid UTF-8 in string literal")]
    InvalidUtf8,
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
}

/// A cursor over a decoded bytecode stream, used by the decompiler and the
/// VM's loader.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    pub fn has_more(&self) -> bool {
        self.pos < self.bytes.len()
    }

    /// Jumps the cursor to an absolute byte offset — used to resume
    /// decoding at a saved program counter.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ReadError> {
        let end = self.pos.checked_add(n).ok_or(ReadError::Eof)?;
        let slice = self.bytes.get(self.pos..end).ok_or(ReadError::Eof)?;
        self.pos = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8, ReadError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, ReadError> {
        let bytes: [u8; 2] = self.take(2)?.try_into().map_err(|_| ReadError::Eof)?;
        Ok(u16::from_le_bytes(bytes))
    }

    pub fn u32(&mut self) -> Result<u32, ReadError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().map_err(|_| ReadError::Eof)?;
        Ok(u32::from_le_bytes(bytes))
    }

    pub fn i32(&mut self) -> Result<i32, ReadError> {
        Ok(self.u32()? as i32)
    }

    pub fn i64(&mut self) -> Result<i64, ReadError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| ReadError::Eof)?;
        Ok(i64::from_le_bytes(bytes))
    }

    pub fn f32(&mut self) -> Result<f32, ReadError> {
        let bytes: [u8; 4] = self.take(4)?.try_into().map_err(|_| ReadError::Eof)?;
        Ok(f32::from_le_bytes(bytes))
    }

    pub fn f64(&mut self) -> Result<f64, ReadError> {
        let bytes: [u8; 8] = self.take(8)?.try_into().map_err(|_| ReadError::Eof)?;
        Ok(f64::from_le_bytes(bytes))
    }

    pub fn string(&mut self) -> Result<String, ReadError> {
        let len = self.u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ReadError::InvalidUtf8)
    }

    pub fn short_string(&mut self) -> Result<String, ReadError> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ReadError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_primitive() {
        let mut w = ByteWriter::new();
        w.u8(0xab);
        w.u16(0x1234);
        w.u32(0xdead_beef);
        w.i64(-7);
        w.f32(1.5);
        w.f64(-2.5);
        w.string("ace");
        w.short_string("x");

        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.u8().unwrap(), 0xab);
        assert_eq!(r.u16().unwrap(), 0x1234);
        assert_eq!(r.u32().unwrap(), 0xdead_beef);
        assert_eq!(r.i64().unwrap(), -7);
        assert_eq!(r.f32().unwrap(), 1.5);
        assert_eq!(r.f64().unwrap(), -2.5);
        assert_eq!(r.string().unwrap(), "ace");
        assert_eq!(r.short_string().unwrap(), "x");
        assert!(!r.has_more());
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let mut r = ByteReader::new(&[0x01]);
        assert!(r.u32().is_err());
    }
}
