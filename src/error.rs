//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while reading
//! an EPUB archive and extracting its metadata and outline. All errors are
//! uniformly wrapped in the [EpubError] enumeration for convenient error
//! handling by the caller.

use thiserror::Error;

use crate::utils::XmlError;

/// Types of errors that can occur during EPUB extraction
///
/// Every variant is fatal to the extraction run: once the container or the
/// package document is unreadable or malformed, the record cannot be
/// assembled. The one deliberately recovered condition, an HTML navigation
/// document that is not well-formed XML, never surfaces here; it degrades
/// to an empty outline inside the pipeline.
#[derive(Debug, Error)]
pub enum EpubError {
    /// ZIP archive related errors
    ///
    /// Errors occur when opening or reading the ZIP structure of an EPUB
    /// file, such as file corruption or a non-ZIP input.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// Malformed NCX navigation document error
    ///
    /// The legacy navigation-control document selected from the manifest is
    /// not well-formed XML. Unlike the HTML navigation document, there is no
    /// further fallback behind the NCX, so this is fatal.
    #[error("Malformed navigation document: {source}")]
    MalformedNavigation { source: XmlError },

    /// Malformed package document error
    ///
    /// The package document referenced by the container is not well-formed
    /// XML. Metadata extraction is meaningless without it.
    #[error("Malformed package document: {source}")]
    MalformedPackageDocument { source: XmlError },

    /// Missing rootfile error
    ///
    /// `META-INF/container.xml` is not well-formed XML, contains no
    /// `rootfile` element, or its first `rootfile` carries no `full-path`
    /// attribute.
    #[error(
        "Missing rootfile: The \"META-INF/container.xml\" file does not point to a package document."
    )]
    MissingRootfile,

    /// Unable to find the resource error
    ///
    /// This error occurs when an attempt is made to read an entry that does
    /// not exist in the EPUB container.
    #[error("Resource not found: Unable to find resource from \"{resource}\".")]
    ResourceNotFound { resource: String },
}

impl From<zip::result::ZipError> for EpubError {
    fn from(value: zip::result::ZipError) -> Self {
        EpubError::ArchiveError { source: value }
    }
}

impl From<std::io::Error> for EpubError {
    fn from(value: std::io::Error) -> Self {
        EpubError::IOError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::ResourceNotFound {
                    resource: l_resource,
                },
                Self::ResourceNotFound {
                    resource: r_resource,
                },
            ) => l_resource == r_resource,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
