//! Container capability traits for demuxing and muxing.
//!
//! Container formats are implemented outside this workspace. The transcoder
//! reads packets through a [`Demuxer`] and writes them through one [`Muxer`]
//! per output container.

pub mod traits;

pub use traits::{Demuxer, MuxSettings, Muxer, StreamInfo, VideoStreamInfo};
