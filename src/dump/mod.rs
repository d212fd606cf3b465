//! Offset-indexed access to multistream dumps.
//!
//! * [`fetch`] — artifact download with checksum verification.
//! * [`index`] — parsing of the compressed offset index.
//! * [`stream`] — lazy per-block decompression and decoding.

pub mod fetch;
pub mod index;
pub mod stream;

pub use fetch::ArtifactFetcher;
pub use index::load_stream_offsets;
pub use stream::{Block, BlockStream};
