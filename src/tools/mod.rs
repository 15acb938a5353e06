//! Helpers shared by the codecs
pub mod bits;
pub mod backup;
