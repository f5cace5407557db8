//! Error types for configuration parsing.

/// Error while parsing an XML configuration document.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// XML syntax error (including mismatched end tags).
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    /// Malformed attribute.
    #[error("XML attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),

    /// Encoding error while decoding names or text.
    #[error("encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),

    /// Document contains no root element.
    #[error("document has no root element")]
    Empty,

    /// Document contains more than one top-level element.
    #[error("document has more than one root element")]
    MultipleRoots,

    /// Document ended before an element was closed.
    #[error("unexpected end of document inside <{0}>")]
    Unclosed(String),

    /// Elements nest deeper than the parser accepts.
    #[error("elements nested deeper than {0} levels")]
    TooDeep(usize),

    /// Non-whitespace text outside the root element.
    #[error("text outside the root element")]
    TextOutsideRoot,
}
