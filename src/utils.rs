use std::collections::HashMap;

use quick_xml::{
    NsReader,
    events::{BytesStart, Event},
};
use thiserror::Error;

/// Provides functionality to decode byte data into strings
///
/// This trait is primarily used to decode raw byte data (such as XML files
/// read from an EPUB archive) into a suitable string representation. It
/// recognizes UTF-8 and UTF-16 byte order marks; data without a BOM is
/// treated as UTF-8, with invalid sequences replaced rather than rejected.
/// Whether the decoded text is a well-formed document is the XML parser's
/// concern, not the decoder's.
pub trait DecodeBytes {
    fn decode(&self) -> String;
}

impl DecodeBytes for Vec<u8> {
    fn decode(&self) -> String {
        match self.as_slice() {
            // UTF-8 BOM (0xEF, 0xBB, 0xBF)
            [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).to_string(),

            // UTF-16 BE BOM (0xFE, 0xFF)
            [0xFE, 0xFF, rest @ ..] => {
                let utf16_units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_be_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16_lossy(&utf16_units)
            }

            // UTF-16 LE BOM (0xFF, 0xFE)
            [0xFF, 0xFE, rest @ ..] => {
                let utf16_units: Vec<u16> = rest
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]))
                    .collect();

                String::from_utf16_lossy(&utf16_units)
            }

            rest => String::from_utf8_lossy(rest).to_string(),
        }
    }
}

/// Types of errors that can occur while building an XML element tree
///
/// Callers decide how much a malformed document matters: the package and NCX
/// parsers wrap this error and propagate it, while the HTML navigation parser
/// absorbs it into an empty outline.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The underlying parser rejected the document
    #[error("XML syntax error: {source}")]
    Syntax { source: quick_xml::Error },

    /// The document ended without producing a root element
    #[error("The document contains no root element.")]
    NoRoot,
}

/// An attribute of an [XmlElement]
///
/// The namespace is resolved from the attribute's prefix after the tree is
/// built; unprefixed attributes never belong to a namespace.
#[derive(Debug)]
pub struct XmlAttr {
    /// The local name of the attribute (excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the attribute
    pub prefix: Option<String>,

    /// The namespace the prefix resolves to
    pub namespace: Option<String>,

    /// The attribute value
    pub value: String,
}

impl XmlAttr {
    /// The name of the attribute as written, `prefix:name` or plain `name`
    fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name),
            None => self.name.clone(),
        }
    }
}

/// Represents an element node in an XML document
#[derive(Debug)]
pub struct XmlElement {
    /// The local name of the element (excluding namespace prefix)
    pub name: String,

    /// The namespace prefix of the element
    pub prefix: Option<String>,

    /// The namespace of the element
    pub namespace: Option<String>,

    /// The attributes of the element, in document order
    pub attributes: Vec<XmlAttr>,

    /// The text content leading the element's children
    ///
    /// Only the text between the start tag and the first child element is
    /// recorded; text interleaved after a child is not part of the element's
    /// own content.
    pub text: Option<String>,

    /// The children of the element
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// Create a new element
    fn new(name: String) -> Self {
        Self {
            name,
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Returns the element's own text content, trimmed
    ///
    /// `None` when the element has no leading text or the text is blank.
    pub fn direct_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Returns the value of the attribute with the given written name
    ///
    /// The name is matched as written in the document, so `"type"` does not
    /// match an `epub:type` attribute and vice versa.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.qualified_name() == name)
            .map(|attr| attr.value.as_str())
    }

    /// Returns the value of the attribute with the given local name in the
    /// given namespace
    pub fn get_attr_in(&self, namespace: &str, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name && attr.namespace.as_deref() == Some(namespace))
            .map(|attr| attr.value.as_str())
    }

    /// Whether the element belongs to the given namespace
    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.as_deref() == Some(namespace)
    }

    /// Iterates the element and all its descendants in document order
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Find the first descendant with the given local name in the given
    /// namespace, in document order
    pub fn find_in(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.descendants()
            .find(|element| element.name == name && element.in_namespace(namespace))
    }

    /// Iterates the direct children with the given local name, regardless of
    /// namespace
    pub fn children_named(&self, name: &str) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Returns the first direct child with the given local name
    pub fn child_named(&self, name: &str) -> Option<&XmlElement> {
        self.children_named(name).next()
    }

    /// Iterates the direct children with the given local name in the given
    /// namespace
    pub fn children_in(&self, namespace: &str, name: &str) -> impl Iterator<Item = &XmlElement> {
        self.children
            .iter()
            .filter(move |child| child.name == name && child.in_namespace(namespace))
    }

    /// Returns the first direct child with the given local name in the given
    /// namespace
    pub fn child_in(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children_in(namespace, name).next()
    }
}

/// Document-order iterator over an element and its descendants
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// XML parser used to parse XML content and build an XML element tree
pub struct XmlReader {}

impl XmlReader {
    /// Parses an XML string and builds the root element
    ///
    /// The content is parsed with the `quick_xml` event reader into an
    /// [XmlElement] tree. Namespace declarations (`xmlns`, `xmlns:prefix`)
    /// are collected across the document and resolved onto elements and
    /// prefixed attributes once the tree is complete; prefixes are not
    /// scoped per subtree, which is sufficient for the single-vocabulary
    /// documents found inside EPUB containers.
    ///
    /// ## Parameters
    /// - `content`: The XML string to be parsed
    ///
    /// ## Return
    /// - `Ok(XmlElement)`: The root element of the XML element tree
    /// - `Err(XmlError)`: The content is not a well-formed document
    pub fn parse(content: &str) -> Result<XmlElement, XmlError> {
        let mut reader = NsReader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut stack = Vec::<XmlElement>::new();
        let mut root = None;
        let mut namespace_map = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Eof) => break,

                Ok(Event::Start(e)) => {
                    let element = Self::build_element(&e, &mut namespace_map);
                    stack.push(element);
                }

                Ok(Event::End(_)) => {
                    if let Some(element) = stack.pop() {
                        // The element closing with an empty stack is the root
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(element);
                        } else if root.is_none() {
                            root = Some(element);
                        }
                    }
                }

                // Self-closing element
                Ok(Event::Empty(e)) => {
                    let element = Self::build_element(&e, &mut namespace_map);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    } else if root.is_none() {
                        root = Some(element);
                    }
                }

                Ok(Event::Text(e)) => {
                    if let Some(element) = stack.last_mut() {
                        // Keep only the text leading the first child; text
                        // trailing a child belongs to no element here
                        if element.text.is_none() && element.children.is_empty() {
                            let text = String::from_utf8_lossy(e.as_ref()).to_string();
                            if !text.trim().is_empty() {
                                element.text = Some(text);
                            }
                        }
                    }
                }

                Ok(Event::CData(e)) => {
                    if let Some(element) = stack.last_mut() {
                        if element.text.is_none() && element.children.is_empty() {
                            element.text = Some(String::from_utf8_lossy(e.as_ref()).to_string());
                        }
                    }
                }

                Err(source) => return Err(XmlError::Syntax { source }),

                // Ignore the following events (elements):
                // Comment, PI, Declaration, Doctype, GeneralRef
                _ => continue,
            }
        }

        if let Some(element) = root.as_mut() {
            Self::assign_namespace(element, &namespace_map);
        }

        root.ok_or(XmlError::NoRoot)
    }

    /// Builds an element from a start or self-closing tag
    ///
    /// Namespace declarations among the attributes are diverted into
    /// `namespace_map` (the default namespace under the empty-string key)
    /// instead of being stored on the element.
    fn build_element(e: &BytesStart, namespace_map: &mut HashMap<String, String>) -> XmlElement {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut element = XmlElement::new(name);

        if let Some(prefix) = e.name().prefix() {
            element.prefix = Some(String::from_utf8_lossy(prefix.as_ref()).to_string());
        }

        for attr in e.attributes().flatten() {
            let attr_key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
            let attr_value = String::from_utf8_lossy(&attr.value).to_string();

            if attr_key == "xmlns" {
                namespace_map.insert(String::new(), attr_value);
                continue;
            }
            if let Some(prefix) = attr_key.strip_prefix("xmlns:") {
                namespace_map.insert(prefix.to_string(), attr_value);
                continue;
            }

            let (prefix, name) = match attr_key.split_once(':') {
                Some((prefix, name)) => (Some(prefix.to_string()), name.to_string()),
                None => (None, attr_key),
            };

            element.attributes.push(XmlAttr {
                name,
                prefix,
                namespace: None,
                value: attr_value,
            });
        }

        element
    }

    /// Assign namespaces to an element tree recursively
    ///
    /// Elements resolve through their prefix, falling back to the default
    /// namespace; attributes resolve through their prefix only.
    fn assign_namespace(element: &mut XmlElement, namespace_map: &HashMap<String, String>) {
        let prefix = element.prefix.as_deref().unwrap_or("");
        element.namespace = namespace_map.get(prefix).cloned();

        for attr in element.attributes.iter_mut() {
            if let Some(prefix) = &attr.prefix {
                attr.namespace = namespace_map.get(prefix).cloned();
            }
        }

        for child in element.children.iter_mut() {
            Self::assign_namespace(child, namespace_map);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::utils::{DecodeBytes, XmlError, XmlReader};

    /// Testing text decoding with UTF-8 BOM
    #[test]
    fn test_decode_utf8_with_bom() {
        let data: Vec<u8> = vec![0xEF, 0xBB, 0xBF, b'H', b'e', b'l', b'l', b'o'];
        assert_eq!(data.decode(), "Hello");
    }

    /// Test text decoding with UTF-16 BE BOM
    #[test]
    fn test_decode_utf16_be_with_bom() {
        let data = vec![
            0xFE, 0xFF, // BOM
            0x00, b'H', // H
            0x00, b'i', // i
        ];
        assert_eq!(data.decode(), "Hi");
    }

    /// Testing text decoding with UTF-16 LE BOM
    #[test]
    fn test_decode_utf16_le_with_bom() {
        let data = vec![
            0xFF, 0xFE, // BOM
            b'H', 0x00, // H
            b'i', 0x00, // i
        ];
        assert_eq!(data.decode(), "Hi");
    }

    /// Testing ordinary UTF-8 text (without BOM)
    #[test]
    fn test_decode_plain_utf8() {
        let data = b"Hello, World!".to_vec();
        assert_eq!(data.decode(), "Hello, World!");
    }

    /// Invalid UTF-8 degrades to replacement characters instead of failing
    #[test]
    fn test_decode_invalid_utf8() {
        let data = vec![b'o', b'k', 0xFF, b'!'];
        assert_eq!(data.decode(), "ok\u{FFFD}!");
    }

    mod xml_reader_tests {
        use super::*;

        const DOCUMENT: &str = r#"<root xmlns="urn:default" xmlns:x="urn:extra">
            <first attr="one">alpha</first>
            <x:second x:attr="two" plain="three"/>
            <nested><inner>beta</inner>tail text</nested>
        </root>"#;

        #[test]
        fn test_parse_builds_tree() {
            let root = XmlReader::parse(DOCUMENT).unwrap();
            assert_eq!(root.name, "root");
            assert_eq!(root.children.len(), 3);
            assert_eq!(root.children[0].name, "first");
            assert_eq!(root.children[1].name, "second");
            assert_eq!(root.children[2].name, "nested");
        }

        #[test]
        fn test_parse_resolves_namespaces() {
            let root = XmlReader::parse(DOCUMENT).unwrap();
            assert!(root.in_namespace("urn:default"));
            assert!(root.children[0].in_namespace("urn:default"));
            assert!(root.children[1].in_namespace("urn:extra"));
        }

        #[test]
        fn test_attribute_lookup() {
            let root = XmlReader::parse(DOCUMENT).unwrap();
            let second = root.child_named("second").unwrap();

            // Written-name lookup distinguishes prefixed from plain
            assert_eq!(second.get_attr("x:attr"), Some("two"));
            assert_eq!(second.get_attr("plain"), Some("three"));
            assert_eq!(second.get_attr("attr"), None);

            // Namespace-resolved lookup
            assert_eq!(second.get_attr_in("urn:extra", "attr"), Some("two"));
            assert_eq!(second.get_attr_in("urn:default", "attr"), None);
        }

        #[test]
        fn test_direct_text_is_leading_only() {
            let root = XmlReader::parse(DOCUMENT).unwrap();
            let first = root.child_named("first").unwrap();
            assert_eq!(first.direct_text(), Some("alpha"));

            // Text trailing the <inner> child is not the element's own
            let nested = root.child_named("nested").unwrap();
            assert_eq!(nested.direct_text(), None);
            assert_eq!(nested.child_named("inner").unwrap().direct_text(), Some("beta"));
        }

        #[test]
        fn test_descendants_document_order() {
            let root = XmlReader::parse(DOCUMENT).unwrap();
            let names: Vec<&str> = root
                .descendants()
                .map(|element| element.name.as_str())
                .collect();
            assert_eq!(
                names,
                vec!["root", "first", "second", "nested", "inner"]
            );
        }

        #[test]
        fn test_find_in_picks_first_in_document_order() {
            let content = r#"<r xmlns:a="urn:a">
                <a:item>1</a:item>
                <a:item>2</a:item>
            </r>"#;
            let root = XmlReader::parse(content).unwrap();
            let found = root.find_in("urn:a", "item").unwrap();
            assert_eq!(found.direct_text(), Some("1"));
        }

        #[test]
        fn test_parse_truncated_tag_is_syntax_error() {
            let result = XmlReader::parse("<a></a");
            assert!(matches!(result, Err(XmlError::Syntax { .. })));
        }

        /// An unclosed root never yields a tree, whichever way the
        /// underlying parser reports it
        #[test]
        fn test_parse_unclosed_root_fails() {
            let result = XmlReader::parse("<html><nav></nav>");
            assert!(result.is_err());
        }

        #[test]
        fn test_parse_empty_input_has_no_root() {
            let result = XmlReader::parse("");
            assert!(matches!(result, Err(XmlError::NoRoot)));
        }

        #[test]
        fn test_cdata_counts_as_text() {
            let root = XmlReader::parse("<t><![CDATA[Chapter & Verse]]></t>").unwrap();
            assert_eq!(root.direct_text(), Some("Chapter & Verse"));
        }
    }
}
