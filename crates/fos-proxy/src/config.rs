//! Proxy Engine Configuration

use std::collections::BTreeMap;

use fos_xml::{HeapConfig, XML_NAMESPACE};
use serde::{Deserialize, Serialize};

use crate::{ProxyError, ProxyResult};

/// Prefixes tried first when a namespace must be declared for a known URI
const DEFAULT_NAMESPACE_PREFIXES: &[(&str, &str)] = &[
    (XML_NAMESPACE, "xml"),
    ("http://www.w3.org/1999/xhtml", "html"),
    ("http://www.w3.org/1999/XSL/Transform", "xsl"),
    ("http://www.w3.org/1999/02/22-rdf-syntax-ns#", "rdf"),
    ("http://schemas.xmlsoap.org/wsdl/", "wsdl"),
    // xml schema
    ("http://www.w3.org/2001/XMLSchema", "xs"),
    ("http://www.w3.org/2001/XMLSchema-instance", "xsi"),
    // dublin core
    ("http://purl.org/dc/elements/1.1/", "dc"),
    ("http://codespeak.net/lxml/objectify/pytype", "py"),
];

/// Engine configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Limits of the node heap
    pub heap: HeapConfig,

    /// Entry limit for dictionaries created by the engine (None = unbounded)
    pub dict_entry_limit: Option<usize>,

    /// Namespace URI → preferred prefix
    pub default_prefixes: BTreeMap<String, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            heap: HeapConfig::default(),
            dict_entry_limit: None,
            default_prefixes: DEFAULT_NAMESPACE_PREFIXES
                .iter()
                .map(|&(uri, prefix)| (uri.to_owned(), prefix.to_owned()))
                .collect(),
        }
    }
}

impl ProxyConfig {
    /// Preferred prefix for a namespace URI
    pub fn default_prefix(&self, uri: &str) -> Option<&str> {
        self.default_prefixes.get(uri).map(String::as_str)
    }

    /// Register a preferred prefix, replacing any entry that uses the same
    /// URI or the same prefix
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) -> ProxyResult<()> {
        if is_generated_prefix(prefix) {
            return Err(ProxyError::ReservedPrefix(prefix.to_owned()));
        }
        self.default_prefixes
            .retain(|known_uri, known_prefix| known_uri != uri && known_prefix != prefix);
        self.default_prefixes
            .insert(uri.to_owned(), prefix.to_owned());
        Ok(())
    }
}

/// `ns` followed by one or more digits
fn is_generated_prefix(prefix: &str) -> bool {
    prefix
        .strip_prefix("ns")
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
