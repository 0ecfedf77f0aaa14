//! ZIP archive helpers for the parts of an .xlsx workbook

use crate::error::RustyIntakeError;
use crate::helpers::xml::XmlReader;
use std::io::BufReader;
use std::io::Read;
use std::io::Seek;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

/// Zip local file header signature
pub(crate) const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Part lookup on a workbook archive
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a part by name. Matching ignores ASCII case and accepts backslash separators,
    /// both of which occur in workbooks written by non-Microsoft tools.
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyIntakeError>;

    /// Creates an XML reader over a part, None when the part is absent
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyIntakeError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, RustyIntakeError> {
        let pattern = name.replace('\\', "/");
        let path = self
            .file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(&file_name.replace('\\', "/")))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(file) => Ok(file),
            Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, RustyIntakeError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }
}

/// Returns true when the bytes start with a zip local file header
pub(crate) fn is_zip_archive(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_SIGNATURE)
}
