pub mod clover;
pub mod cobertura;
pub mod jacoco;
pub mod lcov;

use std::io::BufRead;
use std::str::FromStr;

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

use crate::detect::Format;
use crate::error::{DiffCovError, Result};
use crate::model::CoverageData;

/// Every coverage format adapter implements this trait.
pub trait CoverageParser: Send + Sync {
    /// The format this parser handles.
    fn format(&self) -> Format;

    /// Parse the input bytes into our uniform coverage model.
    fn parse(&self, input: &[u8]) -> Result<CoverageData>;
}

/// The adapter for a detected format.
pub fn parser_for(format: Format) -> &'static dyn CoverageParser {
    match format {
        Format::Cobertura => &cobertura::CoberturaParser,
        Format::Clover => &clover::CloverParser,
        Format::Jacoco => &jacoco::JacocoParser,
        Format::Lcov => &lcov::LcovParser,
    }
}

/// A quick-xml reader configured the same way for every XML adapter.
pub(crate) fn xml_reader<R: BufRead>(input: R) -> Reader<R> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);
    reader
}

/// Wrap a quick-xml error with the byte offset it occurred at.
pub(crate) fn xml_err<R>(source: quick_xml::Error, reader: &Reader<R>) -> DiffCovError {
    DiffCovError::Xml {
        source,
        position: reader.buffer_position(),
    }
}

/// Unescaped value of attribute `key`, if present.
pub(crate) fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Attribute `key` parsed as `T`; `None` when absent or unparseable.
pub(crate) fn parse_attr<T: FromStr>(e: &BytesStart, key: &[u8]) -> Option<T> {
    get_attr(e, key).and_then(|v| v.trim().parse().ok())
}

/// A required numeric attribute; a missing or malformed value is a report
/// error naming the element.
pub(crate) fn required_attr<T: FromStr>(e: &BytesStart, key: &[u8]) -> Result<T> {
    let element = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let attr = String::from_utf8_lossy(key).into_owned();
    let raw = get_attr(e, key)
        .ok_or_else(|| DiffCovError::report(format!("<{element}> is missing '{attr}'")))?;
    raw.trim().parse().map_err(|_| {
        DiffCovError::report(format!("<{element}> has invalid {attr}=\"{raw}\""))
    })
}
