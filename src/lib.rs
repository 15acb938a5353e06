//! # retrograph
//!
//! Codecs for 1990s DOS game graphics archives.
//!
//! * `bitmap` reinterprets pixel data between packed scanlines and the bit-plane
//!   or column-interleaved layouts used by EGA era hardware.
//! * `bmp` reads and writes the uncompressed palettized BMP subset used to
//!   exchange those images.
//! * `huff` is the static byte-level Huffman coder used to store archive chunks.
//!
//! Archive layouts are left to the caller, which decides what bytes go through
//! the codecs and where the results land.

mod tools;
pub mod bitmap;
pub mod bmp;
pub mod huff;

pub use bitmap::{Bpp,Layout,PixelBuffer};
pub use tools::backup::create_with_backup;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

/// Codec Errors
#[derive(thiserror::Error,Debug,PartialEq)]
pub enum Error {
    #[error("unsupported bits per pixel")]
    UnsupportedBpp,
    #[error("plane range exceeds source bits per pixel")]
    PlaneRange,
    #[error("planes differ in size or bits per pixel")]
    PlaneMismatch,
    #[error("width is not divisible by plane count")]
    WidthNotDivisible,
    #[error("no planes")]
    NoPlanes,
    #[error("operation not possible in this pixel layout")]
    WrongLayout,
    #[error("file format mismatch")]
    FileFormatMismatch,
    #[error("Huffman tree is inconsistent")]
    TreeInconsistent,
    #[error("frequency counts too large")]
    FrequencyOverflow,
    #[error("dictionary is too short")]
    DictionaryTooShort
}
