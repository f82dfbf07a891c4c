//! Report retrieval -- page discovery, fetching and document assembly.
//!
//! Split into focused submodules:
//! - [`source`] - Page source trait and the portal-backed implementation
//! - [`locator`] - Upper-bound plus binary search for the page count
//! - [`assembler`] - Sequential fetch loop, retry ceilings, abort conditions
//! - [`progress`] - Progress sinks (discard, log, channel, broadcast)
//! - [`document`] - Page decoding and PDF encoding

pub mod assembler;
pub mod document;
pub mod locator;
pub mod progress;
pub mod source;


pub use assembler::ReportAssembler;
pub use document::{WrittenDocument, decode_page, encode_pdf, report_filename};
pub use locator::PageLocator;
pub use progress::{
    BroadcastProgress, ChannelProgress, FanOut, LogProgress, NullProgress, ProgressSink,
};
pub use source::{HttpPageSource, PageSource, ProbeMode, ResourceCheck};
