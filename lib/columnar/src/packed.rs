//! Bit-packed storage for category indices.
//!
//! Dictionaries are usually tiny, so category indices rarely need a full four
//! bytes. Indices are stored at 2, 4, 8, 16, or 32 bits per value; the
//! sub-byte formats place several values into one byte, least significant
//! bits first. All bounds checks happen at the level of logical indices, the
//! trailing unused bits of a partially filled byte are never observable.

use std::sync::Arc;

/// Supported widths for packed category indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedFormat {
    /// Four 2-bit values per byte.
    U2,
    /// Two 4-bit values per byte.
    U4,
    /// One value per byte.
    U8,
    /// One value per 16-bit word.
    U16,
    /// One value per 32-bit word.
    U32,
}

impl PackedFormat {
    /// Number of bits occupied by a single value.
    pub fn bits(self) -> u32 {
        match self {
            PackedFormat::U2 => 2,
            PackedFormat::U4 => 4,
            PackedFormat::U8 => 8,
            PackedFormat::U16 => 16,
            PackedFormat::U32 => 32,
        }
    }

    /// The largest value representable in this format.
    pub fn max_value(self) -> u32 {
        match self {
            PackedFormat::U32 => u32::MAX,
            other => (1 << other.bits()) - 1,
        }
    }

    /// The narrowest format able to hold indices into a dictionary with
    /// `dictionary_len` entries, i.e. the values `0..dictionary_len`.
    pub fn minimal_for(dictionary_len: usize) -> Self {
        match dictionary_len {
            0..=4 => PackedFormat::U2,
            5..=16 => PackedFormat::U4,
            17..=256 => PackedFormat::U8,
            257..=65_536 => PackedFormat::U16,
            _ => PackedFormat::U32,
        }
    }
}

#[derive(Debug, Clone)]
enum PackedData {
    Bytes(Arc<[u8]>),
    Words(Arc<[u16]>),
    Ints(Arc<[u32]>),
}

/// An immutable sequence of unsigned integers packed at a fixed bit width.
///
/// The logical length may be smaller than the capacity of the backing
/// buffer, reads past the logical length are rejected rather than served
/// from leftover bits.
#[derive(Debug, Clone)]
pub struct PackedIndices {
    format: PackedFormat,
    len: usize,
    data: PackedData,
}

impl PackedIndices {
    pub fn format(&self) -> PackedFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the value at the logical index `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not smaller than [`len`](Self::len).
    pub fn get(&self, index: usize) -> u32 {
        assert!(
            index < self.len,
            "index {index} out of range for {} packed values",
            self.len
        );
        match (&self.data, self.format) {
            (PackedData::Bytes(b), PackedFormat::U2) => {
                u32::from((b[index >> 2] >> ((index & 0b11) << 1)) & 0b11)
            }
            (PackedData::Bytes(b), PackedFormat::U4) => {
                u32::from((b[index >> 1] >> ((index & 0b1) << 2)) & 0xf)
            }
            (PackedData::Bytes(b), PackedFormat::U8) => u32::from(b[index]),
            (PackedData::Words(w), _) => u32::from(w[index]),
            (PackedData::Ints(i), _) => i[index],
            _ => unreachable!("backing buffer does not match format"),
        }
    }

    /// Unpacks values into `buf`, starting at the logical index `start`.
    /// Only the in-bounds prefix of `buf` is written.
    pub fn fill(&self, buf: &mut [u32], start: usize) {
        let n = buf.len().min(self.len.saturating_sub(start));
        if n == 0 {
            return;
        }
        match (&self.data, self.format) {
            (PackedData::Bytes(b), PackedFormat::U2) => {
                for (j, slot) in buf[..n].iter_mut().enumerate() {
                    let i = start + j;
                    *slot = u32::from((b[i >> 2] >> ((i & 0b11) << 1)) & 0b11);
                }
            }
            (PackedData::Bytes(b), PackedFormat::U4) => {
                for (j, slot) in buf[..n].iter_mut().enumerate() {
                    let i = start + j;
                    *slot = u32::from((b[i >> 1] >> ((i & 0b1) << 2)) & 0xf);
                }
            }
            (PackedData::Bytes(b), PackedFormat::U8) => {
                for (slot, &value) in buf[..n].iter_mut().zip(&b[start..start + n]) {
                    *slot = u32::from(value);
                }
            }
            (PackedData::Words(w), _) => {
                for (slot, &value) in buf[..n].iter_mut().zip(&w[start..start + n]) {
                    *slot = u32::from(value);
                }
            }
            (PackedData::Ints(i), _) => buf[..n].copy_from_slice(&i[start..start + n]),
            _ => unreachable!("backing buffer does not match format"),
        }
    }
}

#[derive(Debug)]
enum BuilderData {
    Bytes(Vec<u8>),
    Words(Vec<u16>),
    Ints(Vec<u32>),
}

/// An append-style writer producing [`PackedIndices`].
#[derive(Debug)]
pub struct PackedBuilder {
    format: PackedFormat,
    len: usize,
    data: BuilderData,
}

impl PackedBuilder {
    pub fn new(format: PackedFormat) -> Self {
        Self::with_capacity(format, 0)
    }

    pub fn with_capacity(format: PackedFormat, capacity: usize) -> Self {
        let data = match format {
            PackedFormat::U2 => BuilderData::Bytes(Vec::with_capacity(capacity.div_ceil(4))),
            PackedFormat::U4 => BuilderData::Bytes(Vec::with_capacity(capacity.div_ceil(2))),
            PackedFormat::U8 => BuilderData::Bytes(Vec::with_capacity(capacity)),
            PackedFormat::U16 => BuilderData::Words(Vec::with_capacity(capacity)),
            PackedFormat::U32 => BuilderData::Ints(Vec::with_capacity(capacity)),
        };
        Self {
            format,
            len: 0,
            data,
        }
    }

    pub fn format(&self) -> PackedFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a value.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not fit the format.
    pub fn push(&mut self, value: u32) {
        assert!(
            value <= self.format.max_value(),
            "value {value} does not fit {:?}",
            self.format
        );
        match (&mut self.data, self.format) {
            (BuilderData::Bytes(b), PackedFormat::U2) => {
                if self.len & 0b11 == 0 {
                    b.push(0);
                }
                b[self.len >> 2] |= (value as u8) << ((self.len & 0b11) << 1);
            }
            (BuilderData::Bytes(b), PackedFormat::U4) => {
                if self.len & 0b1 == 0 {
                    b.push(0);
                }
                b[self.len >> 1] |= (value as u8) << ((self.len & 0b1) << 2);
            }
            (BuilderData::Bytes(b), PackedFormat::U8) => b.push(value as u8),
            (BuilderData::Words(w), _) => w.push(value as u16),
            (BuilderData::Ints(i), _) => i.push(value),
            _ => unreachable!("backing buffer does not match format"),
        }
        self.len += 1;
    }

    /// Overwrites the value at an already written logical index.
    ///
    /// # Panics
    ///
    /// Panics if `index` has not been written yet or `value` does not fit
    /// the format.
    pub fn set(&mut self, index: usize, value: u32) {
        assert!(
            index < self.len,
            "index {index} out of range for {} packed values",
            self.len
        );
        assert!(
            value <= self.format.max_value(),
            "value {value} does not fit {:?}",
            self.format
        );
        match (&mut self.data, self.format) {
            (BuilderData::Bytes(b), PackedFormat::U2) => {
                let shift = (index & 0b11) << 1;
                let byte = &mut b[index >> 2];
                *byte = (*byte & !(0b11 << shift)) | ((value as u8) << shift);
            }
            (BuilderData::Bytes(b), PackedFormat::U4) => {
                let shift = (index & 0b1) << 2;
                let byte = &mut b[index >> 1];
                *byte = (*byte & !(0xf << shift)) | ((value as u8) << shift);
            }
            (BuilderData::Bytes(b), PackedFormat::U8) => b[index] = value as u8,
            (BuilderData::Words(w), _) => w[index] = value as u16,
            (BuilderData::Ints(i), _) => i[index] = value,
            _ => unreachable!("backing buffer does not match format"),
        }
    }

    pub fn freeze(self) -> PackedIndices {
        let data = match self.data {
            BuilderData::Bytes(b) => PackedData::Bytes(b.into()),
            BuilderData::Words(w) => PackedData::Words(w.into()),
            BuilderData::Ints(i) => PackedData::Ints(i.into()),
        };
        PackedIndices {
            format: self.format,
            len: self.len,
            data,
        }
    }
}
