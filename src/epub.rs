use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use log::warn;
use zip::{ZipArchive, result::ZipError};

use crate::{
    error::EpubError,
    types::{EpubSummary, ManifestItem, PackageInfo, TocEntry},
    utils::{DecodeBytes, XmlElement, XmlReader},
};

/// Namespace of the OCF container descriptor
const CONTAINER_NAMESPACE: &str = "urn:oasis:names:tc:opendocument:xmlns:container";

/// Dublin Core metadata vocabulary used for title, creator and language
const DC_NAMESPACE: &str = "http://purl.org/dc/elements/1.1/";

/// Package document vocabulary containing the manifest
const OPF_NAMESPACE: &str = "http://www.idpf.org/2007/opf";

/// Structural-semantics vocabulary carrying the `epub:type` attribute
const OPS_NAMESPACE: &str = "http://www.idpf.org/2007/ops";

/// Legacy navigation-control document vocabulary
const NCX_NAMESPACE: &str = "http://www.daisy.org/z3986/2005/ncx/";

/// Fixed location of the container descriptor inside the archive
const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Media type marking the legacy NCX document in the manifest
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// A parsed EPUB publication, reduced to its metadata and outline
///
/// The `EpubDoc` structure is the core of the extraction pipeline. It opens
/// an EPUB container, follows the container descriptor to the package
/// document, parses the publication metadata and manifest, and flattens the
/// navigation document (or the legacy NCX document as a fallback) into a
/// depth-ordered outline.
///
/// All parsing happens during construction; the resulting value is plain
/// immutable data, so repeated extraction of the same archive is trivially
/// reproducible.
///
/// # Notes
/// - The archive is read entry by entry, never unpacked to disk.
/// - Encrypted publications are not supported; their navigation documents
///   simply fail to parse.
#[derive(Debug)]
pub struct EpubDoc {
    /// The path to the package document inside the archive
    pub package_path: String,

    /// The parsed package document: metadata, manifest, navigation locations
    pub info: PackageInfo,

    /// The flattened table of contents, in pre-order document order
    pub outline: Vec<TocEntry>,
}

impl EpubDoc {
    /// Creates an EPUB document instance from a file path
    ///
    /// # Parameters
    /// - `path`: The path to the EPUB file
    ///
    /// # Return
    /// - `Ok(EpubDoc)`: The parsed publication
    /// - `Err(EpubError)`: An error occurred while opening or parsing
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let file = File::open(path).map_err(EpubError::from)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Creates an EPUB document instance from a reader
    ///
    /// This function carries the extraction sequence:
    /// 1. Parse `META-INF/container.xml` to locate the package document
    /// 2. Parse the package document: metadata, manifest, navigation
    ///    candidates
    /// 3. Flatten the navigation document, falling back to the NCX when the
    ///    preferred source yields nothing
    ///
    /// # Parameters
    /// - `reader`: The data source that implements the `Read` and `Seek`
    ///   traits, usually a file or memory buffer
    ///
    /// # Return
    /// - `Ok(EpubDoc)`: The parsed publication
    /// - `Err(EpubError)`: Errors encountered during parsing
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, EpubError> {
        let mut archive = ZipArchive::new(reader).map_err(EpubError::from)?;

        let container = read_archive_entry(&mut archive, CONTAINER_PATH)?.decode();
        let package_path = parse_container(&container)?;

        let package = read_archive_entry(&mut archive, &package_path)?.decode();
        let info = parse_package(&package, &package_path)?;

        let outline = resolve_outline(&mut archive, &info)?;

        Ok(EpubDoc {
            package_path,
            info,
            outline,
        })
    }

    /// Renders the outline as depth-indented text
    ///
    /// One entry per line, two spaces of indentation per nesting level,
    /// joined with `\n`. Empty when the publication has no usable navigation
    /// source.
    pub fn toc_text(&self) -> String {
        self.outline
            .iter()
            .filter(|entry| !entry.label.is_empty())
            .map(TocEntry::indented)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Assembles the extraction record for this publication
    pub fn summary(&self) -> EpubSummary {
        EpubSummary {
            title: self.info.title.clone(),
            author: self.info.author.clone(),
            language: self.info.language.clone(),
            toc_text: self.toc_text(),
        }
    }
}

/// Extracts the contents of a specified entry from a ZIP archive
///
/// This function reads the raw byte data of a named entry from an EPUB file
/// (which is essentially a ZIP archive). This is the fundamental capability
/// behind every parsing step; reads are whole-entry, no streaming.
///
/// # Parameters
/// - `archive`: A mutable reference to a ZIP archive object
/// - `entry_name`: The path of the entry to read, relative to the archive
///   root
///
/// # Return
/// - `Ok(Vec<u8>)`: The entry's raw bytes
/// - `Err(EpubError)`: The entry does not exist, or reading failed
fn read_archive_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    entry_name: &str,
) -> Result<Vec<u8>, EpubError> {
    let mut buffer = Vec::<u8>::new();
    match archive.by_name(entry_name) {
        Ok(mut file) => {
            file.read_to_end(&mut buffer).map_err(EpubError::from)?;
            Ok(buffer)
        }
        Err(ZipError::FileNotFound) => Err(EpubError::ResourceNotFound {
            resource: entry_name.to_string(),
        }),
        Err(err) => Err(EpubError::from(err)),
    }
}

/// Parse the EPUB container descriptor (META-INF/container.xml)
///
/// Returns the `full-path` attribute of the first `rootfile` element in the
/// container namespace, in document order. When multiple `rootfile` elements
/// exist, the first one wins.
///
/// # Parameters
/// - `content`: The content string of the container descriptor
///
/// # Return
/// - `Ok(String)`: The path of the package document inside the archive
/// - `Err(EpubError)`: The descriptor is malformed or points nowhere
fn parse_container(content: &str) -> Result<String, EpubError> {
    let root = XmlReader::parse(content).map_err(|_| EpubError::MissingRootfile)?;

    root.find_in(CONTAINER_NAMESPACE, "rootfile")
        .and_then(|rootfile| rootfile.get_attr("full-path"))
        .map(str::to_string)
        .ok_or(EpubError::MissingRootfile)
}

/// Parse the EPUB package document
///
/// Extracts the three bibliographic fields from the first matching Dublin
/// Core element each, collects the manifest in document order, and selects
/// the navigation document candidates:
/// - an item whose `properties` token list contains `nav` becomes the HTML
///   navigation document;
/// - an item with the NCX media type becomes the legacy fallback.
///
/// Selection is deterministic: the first qualifying item in document order
/// wins, later candidates are ignored. Both selected paths are resolved
/// against the package document's own directory.
///
/// # Parameters
/// - `content`: The content string of the package document
/// - `package_path`: The package document's path inside the archive, used
///   to resolve relative hrefs
fn parse_package(content: &str, package_path: &str) -> Result<PackageInfo, EpubError> {
    let root = XmlReader::parse(content)
        .map_err(|source| EpubError::MalformedPackageDocument { source })?;

    let mut info = PackageInfo {
        title: dc_metadata(&root, "title"),
        author: dc_metadata(&root, "creator"),
        language: dc_metadata(&root, "language"),
        ..PackageInfo::default()
    };

    for item in root
        .descendants()
        .filter(|element| element.name == "item" && element.in_namespace(OPF_NAMESPACE))
    {
        // An item without an id cannot be referenced; skip it
        let Some(id) = item.get_attr("id") else {
            continue;
        };

        info.manifest.insert(
            id.to_string(),
            ManifestItem {
                href: item.get_attr("href").unwrap_or_default().to_string(),
                media_type: item.get_attr("media-type").unwrap_or_default().to_string(),
                properties: item.get_attr("properties").map(str::to_string),
            },
        );
    }

    let base_dir = parent_directory(package_path);
    let mut nav_href = None;
    let mut ncx_href = None;

    for (id, item) in &info.manifest {
        if item.href.is_empty() {
            continue;
        }

        if has_property(item, "nav") {
            match nav_href {
                None => nav_href = Some(resolve_href(base_dir, &item.href)),
                Some(_) => warn!(
                    "Manifest item \"{id}\" also carries the \"nav\" property; keeping the first."
                ),
            }
        }

        if item.media_type == NCX_MEDIA_TYPE {
            match ncx_href {
                None => ncx_href = Some(resolve_href(base_dir, &item.href)),
                Some(_) => warn!(
                    "Manifest item \"{id}\" also has the NCX media type; keeping the first."
                ),
            }
        }
    }

    info.nav_href = nav_href;
    info.ncx_href = ncx_href;
    Ok(info)
}

/// The first Dublin Core element with the given name, as trimmed text
///
/// `None` when no such element exists or its own text is blank.
fn dc_metadata(root: &XmlElement, name: &str) -> Option<String> {
    root.find_in(DC_NAMESPACE, name)
        .and_then(|element| element.direct_text())
        .map(str::to_string)
}

/// Whether the item's `properties` list contains the given token
///
/// The attribute is a whitespace-separated token list; matching is by token
/// equality, so `navigation` does not count as `nav`.
fn has_property(item: &ManifestItem, token: &str) -> bool {
    item.properties
        .as_deref()
        .is_some_and(|properties| properties.split_whitespace().any(|t| t == token))
}

/// The directory component of an archive path, empty at the root
fn parent_directory(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Joins an href onto a directory component
///
/// Archive entry names always use `/`; an empty directory leaves the href
/// untouched.
fn resolve_href(base_dir: &str, href: &str) -> String {
    if base_dir.is_empty() {
        href.to_string()
    } else {
        format!("{base_dir}/{href}")
    }
}

/// Produces the outline from the publication's navigation sources
///
/// The HTML navigation document is preferred; when it is absent, yields no
/// entries, or cannot be parsed, the legacy NCX document takes over. A
/// publication with neither source has an empty outline.
fn resolve_outline<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    info: &PackageInfo,
) -> Result<Vec<TocEntry>, EpubError> {
    if let Some(nav_href) = &info.nav_href {
        let content = read_archive_entry(archive, nav_href)?.decode();
        let entries = parse_nav_document(&content);
        if !entries.is_empty() {
            return Ok(entries);
        }
    }

    if let Some(ncx_href) = &info.ncx_href {
        let content = read_archive_entry(archive, ncx_href)?.decode();
        return parse_ncx(&content);
    }

    Ok(Vec::new())
}

/// Flattens an HTML navigation document into outline entries
///
/// The navigation document is allowed to be non-strict HTML: content that
/// does not parse as XML yields an empty outline so the caller can fall back
/// to the NCX. This is the only recovered failure in the pipeline. A parsed
/// document without a "toc"-typed `nav` element, or without a list under it,
/// is likewise empty.
fn parse_nav_document(content: &str) -> Vec<TocEntry> {
    let root = match XmlReader::parse(content) {
        Ok(root) => root,
        Err(err) => {
            warn!("Navigation document is not well-formed XML, ignoring it: {err}");
            return Vec::new();
        }
    };

    let toc_nav = root
        .descendants()
        .filter(|element| element.name == "nav")
        .find(|element| nav_type(element).is_some_and(|indicator| indicator.contains("toc")));

    let Some(toc_nav) = toc_nav else {
        return Vec::new();
    };

    match toc_nav.child_named("ol") {
        Some(list) => flatten_list(list, 0),
        None => Vec::new(),
    }
}

/// The type indicator of a `nav` element
///
/// Checked in priority order: the structural-semantics `type` attribute,
/// the literal `epub:type` attribute (for documents that use the prefix
/// without declaring it), then a plain `type` attribute. An empty value
/// falls through to the next candidate.
fn nav_type(element: &XmlElement) -> Option<&str> {
    [
        element.get_attr_in(OPS_NAMESPACE, "type"),
        element.get_attr("epub:type"),
        element.get_attr("type"),
    ]
    .into_iter()
    .flatten()
    .find(|value| !value.is_empty())
}

/// Recursively flattens a navigation list into outline entries
///
/// Each `li` contributes its first anchor's own text, trimmed, at the
/// current depth; a nested `ol` inside the same `li` is descended at
/// depth + 1 whether or not the anchor produced a label.
fn flatten_list(list: &XmlElement, depth: usize) -> Vec<TocEntry> {
    let mut entries = Vec::new();

    for item in list.children_named("li") {
        let label = item
            .child_named("a")
            .and_then(|anchor| anchor.direct_text());
        if let Some(label) = label {
            entries.push(TocEntry {
                depth,
                label: label.to_string(),
            });
        }

        if let Some(nested) = item.child_named("ol") {
            entries.extend(flatten_list(nested, depth + 1));
        }
    }

    entries
}

/// Flattens a legacy NCX document into outline entries
///
/// Unlike the HTML variant this parse is strict: content that is not
/// well-formed XML is fatal, since there is nothing left to fall back to.
/// A well-formed document without a `navMap` produces an empty outline.
fn parse_ncx(content: &str) -> Result<Vec<TocEntry>, EpubError> {
    let root =
        XmlReader::parse(content).map_err(|source| EpubError::MalformedNavigation { source })?;

    let Some(nav_map) = root.find_in(NCX_NAMESPACE, "navMap") else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for nav_point in nav_map.children_in(NCX_NAMESPACE, "navPoint") {
        entries.extend(flatten_nav_point(nav_point, 0));
    }

    Ok(entries)
}

/// Recursively flattens an NCX navigation point
///
/// The point's `navLabel/text` content is emitted at the current depth when
/// non-empty; child points are always descended at depth + 1, so a
/// label-less point does not orphan its children.
fn flatten_nav_point(point: &XmlElement, depth: usize) -> Vec<TocEntry> {
    let mut entries = Vec::new();

    let label = point
        .child_in(NCX_NAMESPACE, "navLabel")
        .and_then(|nav_label| nav_label.child_in(NCX_NAMESPACE, "text"))
        .and_then(|text| text.direct_text());
    if let Some(label) = label {
        entries.push(TocEntry {
            depth,
            label: label.to_string(),
        });
    }

    for child in point.children_in(NCX_NAMESPACE, "navPoint") {
        entries.extend(flatten_nav_point(child, depth + 1));
    }

    entries
}
