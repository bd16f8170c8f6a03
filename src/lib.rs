//! Epub extract library
//!
//! A Rust library for extracting bibliographic metadata and a flattened
//! table of contents from EPUB eBook files.
//!
//! The extraction pipeline locates the package document through the OCF
//! container descriptor, reads the publication's title, creator and
//! language, and flattens the navigation document into depth-indented
//! outline text. Publications without an EPUB 3 navigation document fall
//! back to the legacy NCX table of contents. The result is a single
//! four-field record suitable for cataloguing and indexing pipelines that
//! do not want to touch EPUB internals themselves.
//!
//! ## Quick Start
//!
//! ```rust, ignore
//! # use epub_extract::epub::EpubDoc;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Open and parse an EPUB file
//! let doc = EpubDoc::new("path/to/epub/file.epub")?;
//!
//! // The assembled record
//! let summary = doc.summary();
//! println!("Title: {:?}", summary.title);
//! println!("{}", summary.toc_text);
//!
//! // Or the structured pieces
//! for entry in &doc.outline {
//!     println!("{} (depth {})", entry.label, entry.depth);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `cli` (default): Builds the `epub-extract` binary and enables
//!   `serde::Serialize` on the output record. Disable the feature for a
//!   dependency-light library build.

pub(crate) mod utils;

pub mod epub;
pub mod error;
pub mod types;

pub use utils::{DecodeBytes, XmlError};
