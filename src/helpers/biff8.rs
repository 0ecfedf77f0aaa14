//! Microsoft Office Binary Interchange File Format (BIFF8)
//! Record reader for the Excel 97-2003 workbook stream (.xls files).
//! Records longer than 8224 bytes continue in CONTINUE records; the reader stitches
//! them together so callers read one logical record.

use crate::error::RustyIntakeError;
use crate::helpers::string::to_f64;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u32;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use encoding_rs::Encoding;
use thiserror::Error;

const CONTINUE: u16 = 60;

/// Errors specific to BIFF8 format parsing
#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

/// Reader for BIFF8 (Excel 97-2003) records
pub(crate) struct Biff8Reader {
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    pointer: usize, // Next record position in buffer
    chunks: Vec<(usize, usize)>, // Current record chunks (start, end)
    index: usize,  // Current chunk index
    offset: usize, // Offset within current chunk
}

impl Biff8Reader {
    /// Creates a new BIFF8 reader over a workbook stream
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: encoding_rs::UTF_16LE,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Reads the next record type and prepares for reading record data.
    /// Returns None when no more records are available.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, RustyIntakeError> {
        if self.pointer + 4 < self.buffer.len() {
            self.index = 0;
            self.offset = 0;

            let kind = self.get_u16_at(self.pointer)?;
            let (lower, upper) = self.record_bounds(self.pointer)?;
            self.pointer = upper;

            self.chunks.clear();
            self.chunks.push((lower, upper));
            while self.pointer + 4 < self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
                let (lower, upper) = self.record_bounds(self.pointer)?;
                self.pointer = upper;
                self.chunks.push((lower, upper));
            }

            Ok(Some(kind))
        } else {
            Ok(None)
        }
    }

    /// Data bounds of the record whose header starts at `pointer`, clamped to the stream
    fn record_bounds(&self, pointer: usize) -> Result<(usize, usize), RustyIntakeError> {
        let size = self.get_u16_at(pointer + 2)? as usize;
        let lower = pointer + 4;
        let upper = (lower + size).min(self.buffer.len());
        Ok((lower, upper))
    }

    /// Sets the reader pointer to a specific stream position
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    /// Reads exactly `length` bytes, returning an error if insufficient data
    fn read_exact(&mut self, length: usize) -> Result<&[u8], RustyIntakeError> {
        let (data, size) = self.read(length);
        if size == length {
            Ok(data)
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Reads up to `length` bytes from the current chunk of the record.
    /// Returns the data slice and actual number of bytes read.
    fn read(&mut self, length: usize) -> (&[u8], usize) {
        if let Some((lower, upper)) = self.chunks.get(self.index) {
            let source = (*upper).min(*lower + self.offset);
            let target = (*upper).min(source + length);
            let size = target - source;
            if source < *upper {
                if target == *upper {
                    self.index += 1;
                    self.offset = 0;
                } else {
                    self.offset += size;
                }
                return (&self.buffer[source..target], size);
            }
        }
        (&[], 0)
    }

    /// Skips `length` bytes and returns the skipped data
    pub(crate) fn skip(&mut self, length: usize) -> Result<&[u8], RustyIntakeError> {
        if length == 0 {
            return Ok(&[]);
        }
        self.read_exact(length)
    }

    /// Reads a single byte
    pub(crate) fn read_u8(&mut self) -> Result<u8, RustyIntakeError> {
        self.read_exact(1).map(|data| data[0])
    }

    /// Reads a 16-bit unsigned integer
    pub(crate) fn read_u16(&mut self) -> Result<u16, RustyIntakeError> {
        self.read_exact(2).map(to_u16)
    }

    /// Gets a 16-bit unsigned integer `offset` bytes before the end of the current record
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, RustyIntakeError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            } else {
                offset -= *upper - *lower;
            }
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    /// Gets a 16-bit unsigned integer from the specified absolute position
    pub(crate) fn get_u16_at(&self, index: usize) -> Result<u16, RustyIntakeError> {
        if index + 2 <= self.buffer.len() {
            Ok(to_u16(&self.buffer[index..index + 2]))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    /// Reads a 32-bit unsigned integer
    pub(crate) fn read_u32(&mut self) -> Result<u32, RustyIntakeError> {
        self.read_exact(4).map(to_u32)
    }

    /// Reads a 32-bit value as usize
    pub(crate) fn read_usize(&mut self) -> Result<usize, RustyIntakeError> {
        self.read_exact(4).map(to_usize)
    }

    /// Reads a 64-bit unsigned integer
    pub(crate) fn read_u64(&mut self) -> Result<u64, RustyIntakeError> {
        self.read_exact(8).map(to_u64)
    }

    /// Reads a 64-bit floating point number
    pub(crate) fn read_f64(&mut self) -> Result<f64, RustyIntakeError> {
        self.read_exact(8).map(to_f64)
    }

    /// Reads an RK number, Excel's compressed numeric format.
    /// RK numbers store either a 30-bit integer or the high bits of a double,
    /// optionally divided by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<String, RustyIntakeError> {
        let value = self.read_u32()?;
        Ok(decode_rk_number(value))
    }

    /// Reads a short Unicode string (1-byte length prefix)
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, RustyIntakeError> {
        let mut string = String::new();
        let chars = self.read_u8()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a Unicode string (2-byte length prefix)
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, RustyIntakeError> {
        let mut string = String::new();
        let chars = self.read_u16()? as usize;
        self.read_string_into(chars, false, &mut string)?;
        Ok(string)
    }

    /// Reads a rich extended Unicode string, as stored in the shared string table.
    /// The character data may be split across CONTINUE records, each part starting
    /// with its own option flags.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, RustyIntakeError> {
        let mut string = String::new();
        let mut expected = self.read_u16()? as usize;
        let mut actual = self.read_string_into(expected, true, &mut string)?;
        while actual < expected {
            expected -= actual;
            actual = self.read_string_into(expected, false, &mut string)?;
            if actual == 0 {
                Err(Biff8Error::NoEnoughDataError(expected))?
            }
        }
        Ok(string)
    }

    /// Reads string data into the provided buffer, skipping formatting runs and phonetic data
    fn read_string_into(&mut self, chars: usize, is_extend: bool, content: &mut String) -> Result<usize, RustyIntakeError> {
        let encoding = self.encoding;
        let flag = self.read_u8()?;
        let is_high_byte = (flag & 0x1) > 0;
        let expected = Self::chars_to_bytes(is_high_byte, chars);
        let rich_string_count = if is_extend && (flag & 0x8) > 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_count = if is_extend && (flag & 0x4) > 0 {
            self.read_usize()?
        } else {
            0
        };
        let (bytes, actual) = self.read(expected);
        if is_high_byte {
            let (string, _, _) = encoding.decode(bytes);
            content.push_str(&string);
        } else {
            // Compressed strings keep only the low byte of each UTF-16 unit
            content.extend(bytes.iter().map(|byte| *byte as char));
        }
        self.skip(4 * rich_string_count)?;
        self.skip(phonetic_count)?;
        Ok(Self::bytes_to_chars(is_high_byte, actual))
    }

    #[inline]
    fn chars_to_bytes(is_high_byte: bool, chars: usize) -> usize {
        if is_high_byte { chars << 1 } else { chars }
    }

    #[inline]
    fn bytes_to_chars(is_high_byte: bool, bytes: usize) -> usize {
        if is_high_byte { bytes >> 1 } else { bytes }
    }
}

/// Decodes a raw RK value into its textual number.
pub(crate) fn decode_rk_number(value: u32) -> String {
    let is_percentage = (value & 0x01) != 0;
    let is_integer = (value & 0x02) != 0;

    if is_integer {
        let integer = (value as i32) >> 2;
        if is_percentage {
            (integer as f64 / 100.0).to_string()
        } else {
            integer.to_string()
        }
    } else {
        let bits = ((value & 0xFFFF_FFFC) as u64) << 32;
        let mut number = f64::from_bits(bits);
        if is_percentage {
            number /= 100.0;
        }
        number.to_string()
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
