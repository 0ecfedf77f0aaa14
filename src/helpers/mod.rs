//! Low-level readers for the containers and record formats behind .xls and .xlsx workbooks

pub(crate) mod biff8;
pub(crate) mod cfb;
pub(crate) mod string;
pub(crate) mod xml;
pub(crate) mod zip;
