//! XML configuration tree for JPub.
//!
//! Page definitions and template sidecar files are small XML documents. This
//! crate parses them into a read-only [`Configuration`] tree that callers
//! query by element and attribute name:
//!
//! ```
//! let config = jpub_xml::parse(b"<page><title>Hello</title></page>", "/a.xml").unwrap();
//! assert_eq!(config.child_value("title"), Some("Hello"));
//! ```

mod error;
mod node;
mod parser;

pub use error::ConfigurationError;
pub use node::Configuration;
pub use parser::{MAX_DEPTH, parse};
