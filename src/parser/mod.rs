//! Archive parsing: MBOX streaming splitter, OLM decoder, header and MIME
//! handling, Gmail labels and thread derivation.

pub mod header;
pub mod labels;
pub mod mbox;
pub mod mime;
pub mod olm;
pub mod thread;

pub use mbox::MboxParser;
pub use olm::OlmParser;
