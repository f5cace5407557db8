//! Streaming XML parser producing [`Configuration`] trees.

use std::borrow::Cow;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::ConfigurationError;
use crate::node::Configuration;

/// Deepest element nesting accepted by [`parse`], root included.
pub const MAX_DEPTH: usize = 256;

/// Parse an XML document into a [`Configuration`] tree.
///
/// `location` identifies the source (typically its store path) and is recorded
/// on every node. Comments, processing instructions, and the XML declaration
/// are ignored. Nesting is limited to [`MAX_DEPTH`] elements, since dropping,
/// cloning and comparing a tree all recurse through its children.
///
/// # Errors
///
/// Returns [`ConfigurationError`] if the document is not well-formed XML,
/// has no root element or more than one, or nests deeper than
/// [`MAX_DEPTH`].
pub fn parse(bytes: &[u8], location: &str) -> Result<Configuration, ConfigurationError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(false);
    parse_document(&mut reader, location)
}

fn parse_document<R: BufRead>(
    reader: &mut Reader<R>,
    location: &str,
) -> Result<Configuration, ConfigurationError> {
    let mut buf = Vec::new();
    let mut stack: Vec<Configuration> = Vec::new();
    let mut root: Option<Configuration> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if stack.is_empty() && root.is_some() {
                    return Err(ConfigurationError::MultipleRoots);
                }
                check_depth(&stack)?;
                stack.push(element(reader, &e, location)?);
            }
            Event::Empty(e) => {
                check_depth(&stack)?;
                let node = element(reader, &e, location)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                // quick-xml has already verified the end tag matches
                if let Some(mut node) = stack.pop() {
                    node.finish();
                    attach(&mut stack, &mut root, node)?;
                }
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?;
                push_text(&mut stack, &text)?;
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e)?;
                push_text(&mut stack, &decode_entity(&entity))?;
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e);
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ConfigurationError::Unclosed(open.name().to_owned()));
    }
    root.ok_or(ConfigurationError::Empty)
}

/// Fail if one more element would nest deeper than [`MAX_DEPTH`].
fn check_depth(stack: &[Configuration]) -> Result<(), ConfigurationError> {
    if stack.len() >= MAX_DEPTH {
        return Err(ConfigurationError::TooDeep(MAX_DEPTH));
    }
    Ok(())
}

/// Build an element node (name + attributes) from a start tag.
fn element<R: BufRead>(
    reader: &Reader<R>,
    e: &BytesStart,
    location: &str,
) -> Result<Configuration, ConfigurationError> {
    let qname = e.name();
    let name = reader.decoder().decode(qname.as_ref())?;
    let mut node = Configuration::new(name.into_owned()).with_location(location);

    for attr in e.attributes() {
        let attr = attr?;
        let key = reader.decoder().decode(attr.key.as_ref())?.into_owned();
        let value = attr.unescape_value()?.into_owned();
        node = node.with_attribute(key, value);
    }

    Ok(node)
}

/// Attach a completed node to its parent, or make it the root.
fn attach(
    stack: &mut [Configuration],
    root: &mut Option<Configuration>,
    node: Configuration,
) -> Result<(), ConfigurationError> {
    if let Some(parent) = stack.last_mut() {
        parent.push_child(node);
    } else if root.is_none() {
        *root = Some(node);
    } else {
        return Err(ConfigurationError::MultipleRoots);
    }
    Ok(())
}

fn push_text(stack: &mut [Configuration], text: &str) -> Result<(), ConfigurationError> {
    match stack.last_mut() {
        Some(node) => {
            node.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(ConfigurationError::TextOutsideRoot),
    }
}

/// Decode XML entity references to their character values.
fn decode_entity(entity: &str) -> Cow<'static, str> {
    match entity {
        "lt" => Cow::Borrowed("<"),
        "gt" => Cow::Borrowed(">"),
        "amp" => Cow::Borrowed("&"),
        "apos" => Cow::Borrowed("'"),
        "quot" => Cow::Borrowed("\""),
        // Numeric character references
        s if s.starts_with('#') => {
            let code = if s.starts_with("#x") || s.starts_with("#X") {
                u32::from_str_radix(&s[2..], 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32).map_or_else(
                || Cow::Owned(format!("&{entity};")),
                |c| Cow::Owned(c.to_string()),
            )
        }
        // Unknown entity - preserve as-is
        _ => Cow::Owned(format!("&{entity};")),
    }
}
