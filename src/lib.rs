//! adpcm-stream is a family of pull-based ADPCM decoders for embedded and game audio.
//!
//! Each decoder reads a compressed block from a [`ByteSource`] and hands out 16bit PCM
//! samples on demand with [`AdpcmStream::read_buffer`]. Supported layouts:
//!
//! * OKI/VOX
//! * IMA (headerless, high nibble first) and DVI (headerless, low nibble first)
//! * Apple QuickTime IMA4
//! * Microsoft IMA (mono and stereo)
//! * Duck DK3 IMA
//! * Microsoft ADPCM
//!
//! # Examples
//!
//! Decode a Microsoft ADPCM block embedded in the program.
//! ```
//! use adpcm_stream::{AdpcmSpecs, AdpcmStream, SliceSource, Variant};
//!
//! # fn main() -> anyhow::Result<()> {
//! let block: [u8; 9] = [
//!     0x00, // predictor mode
//!     0x10, 0x00, // delta
//!     0x64, 0x00, // newer sample
//!     0x64, 0x00, // older sample
//!     0x20, 0x00, // nibbles
//! ];
//! let specs = AdpcmSpecs {
//!     variant: Variant::MsAdpcm,
//!     sample_rate: 22050,
//!     num_channels: 1,
//!     block_align: block.len() as u32,
//! };
//! let mut stream = AdpcmStream::new(SliceSource::new(&block), block.len() as u64, specs)?;
//!
//! let mut buffer = [0i16; 16];
//! let n = stream.read_buffer(&mut buffer);
//! assert_eq!(&buffer[..n], &[100, 100, 132, 132, 132, 132]);
//! assert!(stream.end_of_data());
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), no_std)]

mod apple;
mod dk3;
mod error;
pub mod imaadpcm;
pub mod msadpcm;
mod msima;
pub mod oki;
pub mod player;
mod source;
mod stream;
pub mod tables;

pub use error::{ConfigurationError, PlayerError, SeekError};
pub use source::{ByteSource, SliceSource};
pub use stream::{AdpcmSpecs, AdpcmStream, Variant, MAX_NUM_CHANNELS};

#[cfg(feature = "std")]
pub use source::IoSource;
