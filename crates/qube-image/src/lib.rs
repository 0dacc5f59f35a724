//! # qube-image
//!
//! Image identification and the local tarball store.
//!
//! Images are addressed as `<user>:<image>:<version>` and cached as plain
//! gzip tarballs under the shared `images/` directory; absent images are
//! streamed down from the hub. The store is content-unaddressed: re-pulling
//! a cached spec touches nothing.

pub mod spec;
pub mod store;

pub use spec::ImageSpec;
pub use store::ImageStore;
