use thiserror::Error;

/// Main error type for the intake crate.
/// Aggregates errors from the standard library, the decoding dependencies and internal modules.
#[derive(Error, Debug)]
pub enum RustyIntakeError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    ParseFloatError(#[from] std::num::ParseFloatError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    // Helper module errors
    #[error("{0}")]
    CfbHelperError(#[from] crate::helpers::cfb::CfbError),

    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    #[error("{0}")]
    Biff8HelperError(#[from] crate::helpers::biff8::Biff8Error),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),

    #[error("{0}")]
    XlsError(#[from] crate::spreadsheet::xls::XlsError),

    // Session module errors
    #[error("{0}")]
    SessionError(#[from] crate::session::SessionError),
}

pub(crate) trait ResultOptionChain {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self;
}

impl<T, E> ResultOptionChain for Result<Option<T>, E> {
    fn ok_none_else<F>(self, f: F) -> Self
    where
        F: FnOnce() -> Self,
    {
        match self {
            Ok(None) => f(),
            _ => self,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, RustyIntakeError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| RustyIntakeError::WithContextError(format!("{}: {}", message, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_none_else_falls_back_only_on_none() {
        let primary: Result<Option<u8>, RustyIntakeError> = Ok(None);
        assert_eq!(primary.ok_none_else(|| Ok(Some(2))).ok().flatten(), Some(2));

        let primary: Result<Option<u8>, RustyIntakeError> = Ok(Some(1));
        assert_eq!(primary.ok_none_else(|| Ok(Some(2))).ok().flatten(), Some(1));
    }

    #[test]
    fn with_prefix_adds_context() {
        let result: Result<(), RustyIntakeError> = Err(RustyIntakeError::WithContextError("boom".to_owned()));
        let error = result.with_prefix("xl/worksheets/sheet1.xml").unwrap_err();
        assert_eq!(error.to_string(), "xl/worksheets/sheet1.xml: boom");
    }
}
