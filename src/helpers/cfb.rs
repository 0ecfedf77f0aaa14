//! OLE Compound File Binary (CFB) reader for the legacy Excel (.xls) container.
//! Every sector access is bounds-checked: an uploaded file is untrusted input and a
//! damaged container must surface as an error, never as a panic or an endless chain walk.

use crate::error::RustyIntakeError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use crate::helpers::string::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;
use tracing::debug;

/// Largest sector id that still refers to a regular sector; everything above is a marker
/// (DIFSECT, FATSECT, ENDOFCHAIN, FREESECT).
const MAX_REG_SECT: usize = 0xFFFFFFFA;

/// Streams smaller than this live in the mini stream.
const MINI_STREAM_CUTOFF: usize = 4096;

/// Size of one directory entry.
const DIRECTORY_ENTRY_SIZE: usize = 128;

/// OLE signature, little-endian.
pub(crate) const CFB_SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Sector '{0}' is outside of the file")]
    SectorOutOfBoundsError(usize),

    #[error("Sector chain starting at '{0}' does not terminate")]
    SectorChainError(usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Compound File Binary structure representing the entire OLE file
pub(crate) struct Cfb {
    /// Directory index mapping stream names to directory entries
    directories: HashMap<String, Directory>,
    /// File allocation table for regular sectors
    file_allocation_table: Vec<usize>,
    /// Regular sectors containing stream data
    sectors: Sectors,
    /// Mini file allocation table for small streams
    mini_file_allocation_table: Vec<usize>,
    /// Mini sectors for small streams (64-byte sectors)
    mini_sectors: Sectors,
}

impl Cfb {
    /// Reads the whole container into memory and parses its allocation tables and directory.
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, RustyIntakeError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < 512 {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data: Vec<u8> = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;

        let header = Header::new(&data[..512])?;
        let sectors = Sectors { data, size: header.sector_size()?, offset: 1 };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: 64, offset: 0 },
        };
        debug!(streams = directories.len(), sector_size = sectors.size, "Parsed compound file");

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Returns true when the container looks like an OLE file, judging by its signature only.
    pub(crate) fn is_compound_file(bytes: &[u8]) -> bool {
        bytes.len() >= 8 && to_u64(&bytes[..8]) == CFB_SIGNATURE
    }

    /// Checks if a stream exists in the container
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads the contents of a stream, or None when the container has no stream of that name.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, RustyIntakeError> {
        if let Some(directory) = self.directories.get(name) {
            let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
                Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
            } else {
                Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
            };
            bytes.truncate(directory.count);
            Ok(Some(bytes))
        } else {
            Ok(None)
        }
    }

    /// Loads the file allocation table through the double indirect file allocation table
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, RustyIntakeError> {
        let mut double_indirect_file_allocation_table = Vec::<usize>::new();
        double_indirect_file_allocation_table.extend(to_usize_iter(&sectors.data[76..512]));

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index <= MAX_REG_SECT {
            if count >= header.double_indirect_file_allocation_table_count {
                Err(CfbError::SectorChainError(header.double_indirect_file_allocation_table_shift))?
            }
            double_indirect_file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            // Last entry of every DIFAT sector links to the next one
            index = double_indirect_file_allocation_table.pop().ok_or(CfbError::FileFormatError)?;
            count += 1;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(header.double_indirect_file_allocation_table_count, count))?
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        let mut count = 0usize;
        for index in double_indirect_file_allocation_table {
            if index <= MAX_REG_SECT {
                file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
                count += 1;
            }
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }

        Ok(file_allocation_table)
    }

    /// Loads directory entries starting from the given sector
    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, RustyIntakeError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(Directory::new)
            .filter(|(name, _)| !name.is_empty())
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Loads the mini file allocation table for small streams
    fn load_mini_file_allocation_table(file_allocation_table: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, RustyIntakeError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let mini_file_allocation_table = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&mini_file_allocation_table).collect()
        } else {
            Vec::new()
        })
    }

    /// Loads the mini stream, which is stored as the root entry's regular stream
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, RustyIntakeError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        Ok(Sectors { data, size: 64, offset: 0 })
    }

    /// Reads a complete stream by following its allocation chain
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, RustyIntakeError> {
        let mut content: Vec<u8> = Vec::new();
        let mut current = index;
        let mut steps = 0usize;
        while current <= MAX_REG_SECT {
            if steps > file_allocation_table.len() {
                Err(CfbError::SectorChainError(index))?
            }
            content.extend_from_slice(sectors.get(current)?);
            current = *file_allocation_table
                .get(current)
                .ok_or(CfbError::SectorOutOfBoundsError(current))?;
            steps += 1;
        }
        Ok(content)
    }
}

/// Sector storage of a container or of its mini stream
#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    /// Size of individual sectors
    size: usize,
    /// Number of leading sectors occupied by the header (1 for the container, 0 for the mini stream)
    offset: usize,
}

impl Sectors {
    /// Gets the data for the sector at the specified index
    fn get(&self, index: usize) -> Result<&[u8], RustyIntakeError> {
        let source = index
            .checked_add(self.offset)
            .and_then(|position| position.checked_mul(self.size))
            .filter(|source| *source < self.data.len())
            .ok_or(CfbError::SectorOutOfBoundsError(index))?;
        let target = self.data.len().min(source + self.size);
        Ok(&self.data[source..target])
    }
}

/// CFB file header structure
#[derive(Debug)]
struct Header {
    signature: u64,
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    /// Parses the CFB header from the first 512 bytes of data
    fn new(data: &[u8]) -> Result<Self, RustyIntakeError> {
        let header = Header {
            signature: to_u64(&data[0..8]),
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_shift: to_usize(&data[48..52]),
            mini_file_allocation_table_sector_shift: to_usize(&data[60..64]),
            mini_file_allocation_table_sector_count: to_usize(&data[64..68]),
            double_indirect_file_allocation_table_shift: to_usize(&data[68..72]),
            double_indirect_file_allocation_table_count: to_usize(&data[72..76]),
        };

        if header.signature != CFB_SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }

        Ok(header)
    }

    /// Calculates the sector size based on major version and sector shift
    fn sector_size(&self) -> Result<usize, RustyIntakeError> {
        if self.major_version == 3 && self.sector_shift == 0x0009 {
            Ok(512)
        } else if self.major_version == 4 && self.sector_shift == 0x000C {
            // Version 4 pads the 512-byte header with zeroes up to the first 4096-byte sector
            Ok(4096)
        } else {
            Err(CfbError::SectorSizeError(self.major_version, self.sector_shift))?
        }
    }
}

/// Directory entry describing one stream
#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    /// Creates a directory entry from its 128 raw bytes
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };

        let index = to_usize(&bytes[116..120]);
        let count = to_u64(&bytes[120..128]) as usize;
        (name, Directory { index, count })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn rejects_short_input() {
        let mut reader = Cursor::new(vec![0u8; 100]);
        assert!(Cfb::new(&mut reader).is_err());
    }

    #[test]
    fn rejects_wrong_signature() {
        let mut reader = Cursor::new(vec![0u8; 1024]);
        let error = Cfb::new(&mut reader).err().expect("signature error");
        assert_eq!(error.to_string(), CfbError::OleSignatureError.to_string());
    }

    #[test]
    fn detects_signature() {
        let mut bytes = CFB_SIGNATURE.to_le_bytes().to_vec();
        assert!(Cfb::is_compound_file(&bytes));
        bytes[0] = b'P';
        assert!(!Cfb::is_compound_file(&bytes));
        assert!(!Cfb::is_compound_file(b"PK"));
    }

    #[test]
    fn sector_lookup_is_bounds_checked() {
        let sectors = Sectors { data: vec![0u8; 1024], size: 512, offset: 1 };
        assert_eq!(sectors.get(0).map(|sector| sector.len()).ok(), Some(512));
        assert!(sectors.get(1).is_err());
        assert!(sectors.get(usize::MAX).is_err());
    }
}
