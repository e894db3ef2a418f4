use crate::errors::L1TxError;

/// Cursor over an envelope payload.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], L1TxError> {
        if self.remaining() < len {
            return Err(L1TxError::Truncated {
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub(crate) fn take_u8(&mut self) -> Result<u8, L1TxError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn take_u16_le(&mut self) -> Result<u16, L1TxError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn take_u32_le(&mut self) -> Result<u32, L1TxError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn take_arr<const N: usize>(&mut self) -> Result<[u8; N], L1TxError> {
        let bytes = self.take(N)?;
        Ok(bytes.try_into().expect("length checked by take"))
    }

    /// Everything left, consuming the reader.
    pub(crate) fn take_rest(&mut self) -> &'a [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }
}
