//! Bounds-checked reading over captured bytes.
//!
//! Every accessor fails closed: a read past the end yields `None` and the
//! caller abandons the current walk.

/// Cursor over a byte slice that tracks the remaining input.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Cursor positioned at `pos`; an out-of-range start leaves nothing to read.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self {
            buf,
            pos: pos.min(buf.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let out = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(out)
    }

    pub fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn u16_le(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u16_be(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N).and_then(|b| b.try_into().ok())
    }

    /// Next tag/length/value record. Stops (returns `None`) when the
    /// declared length would run past the buffer, without consuming it.
    pub fn peek_tag_length_value(&self) -> Option<Element<'a>> {
        let header = self.buf.get(self.pos..self.pos.checked_add(2)?)?;
        let (tag, len) = (header[0], header[1] as usize);
        let start = self.pos + 2;
        let data = self.buf.get(start..start + len)?;
        Some(Element { tag, data })
    }

    pub fn next_element(&mut self) -> Option<Element<'a>> {
        let element = self.peek_tag_length_value()?;
        self.pos += 2 + element.data.len();
        Some(element)
    }
}

/// One information element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub tag: u8,
    pub data: &'a [u8],
}

impl<'a> Element<'a> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Vendor-specific element whose body starts with `prefix`.
    pub fn is_vendor(&self, prefix: &[u8]) -> bool {
        self.tag == TAG_VENDOR && self.data.starts_with(prefix)
    }
}

pub const TAG_SSID: u8 = 0x00;
pub const TAG_RATES: u8 = 0x01;
pub const TAG_DS_PARAMS: u8 = 0x03;
pub const TAG_HT_CAPABILITIES: u8 = 0x2d;
pub const TAG_RSN: u8 = 0x30;
pub const TAG_EXTENDED_RATES: u8 = 0x32;
pub const TAG_HT_OPERATION: u8 = 0x3d;
pub const TAG_VHT_CAPABILITIES: u8 = 0xbf;
pub const TAG_VHT_OPERATION: u8 = 0xc0;
pub const TAG_VENDOR: u8 = 0xdd;

/// Iterator over the elements from `start` to the end of `buf`.
pub fn elements(buf: &[u8], start: usize) -> Elements<'_> {
    Elements {
        cursor: ByteCursor::at(buf, start),
    }
}

pub struct Elements<'a> {
    cursor: ByteCursor<'a>,
}

impl<'a> Iterator for Elements<'a> {
    type Item = Element<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_element()
    }
}
