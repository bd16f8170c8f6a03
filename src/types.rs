use indexmap::IndexMap;

/// Represents a resource item declared in the EPUB manifest
///
/// The `ManifestItem` structure represents a single resource file declared in
/// the package document's manifest. The manifest serves as a comprehensive
/// inventory of all resources in an EPUB publication; extraction only ever
/// inspects it to find the navigation documents, so the item keeps the raw
/// attribute values rather than interpreting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// The path to the resource file, exactly as written in the `href`
    /// attribute (relative to the package document's directory)
    pub href: String,

    /// The media type of the resource
    pub media_type: String,

    /// Optional properties associated with this resource
    ///
    /// This field contains a space-separated list of properties that apply
    /// to this resource. The `nav` property marks the EPUB 3 navigation
    /// document.
    pub properties: Option<String>,
}

/// The parsed content of a package document
///
/// Holds the bibliographic metadata, the manifest, and the resolved locations
/// of the navigation documents. The manifest preserves document order, so
/// scans over it are deterministic across runs and platforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    /// The publication title, absent when the package document declares no
    /// non-empty `dc:title`
    pub title: Option<String>,

    /// The publication author, taken from the first `dc:creator`
    pub author: Option<String>,

    /// The publication language, taken from the first `dc:language`
    pub language: Option<String>,

    /// All manifest items keyed by their `id` attribute, in document order
    pub manifest: IndexMap<String, ManifestItem>,

    /// Path of the EPUB 3 navigation document, resolved against the package
    /// document's directory
    ///
    /// Set when a manifest item carries the `nav` property token and a
    /// non-empty `href`.
    pub nav_href: Option<String>,

    /// Path of the legacy NCX navigation document, resolved against the
    /// package document's directory
    ///
    /// Set when a manifest item has the NCX media type and a non-empty
    /// `href`.
    pub ncx_href: Option<String>,
}

/// A single line of the flattened table of contents
///
/// Entries are produced in pre-order document order by flattening either
/// navigation source; the nesting level of the source element survives as
/// [depth](TocEntry::depth). Labels are trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Nesting level of the entry, starting at 0 for the top-level list
    pub depth: usize,

    /// The display text of the entry
    pub label: String,
}

impl TocEntry {
    /// Renders the entry as a text line, indented by two spaces per depth
    /// level
    pub fn indented(&self) -> String {
        format!("{}{}", "  ".repeat(self.depth), self.label)
    }
}

/// The extraction record emitted for one EPUB archive
///
/// This is the only output artifact of the pipeline. The three metadata
/// fields are `None` when the package document lacks them (or declares them
/// empty); `toc_text` is the newline-joined, depth-indented outline and is
/// empty when neither navigation source yields entries.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct EpubSummary {
    pub title: Option<String>,
    pub author: Option<String>,
    pub language: Option<String>,
    pub toc_text: String,
}
