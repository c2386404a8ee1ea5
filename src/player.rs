//! Frame-by-frame playback on top of [`AdpcmStream`].
//!
//! # Examples
//!
//! ```
//! use adpcm_stream::player::{AdpcmPlayer, I1F15};
//! use adpcm_stream::{AdpcmSpecs, AdpcmStream, SliceSource, Variant};
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = [0x17u8; 64];
//! let specs = AdpcmSpecs {
//!     variant: Variant::Oki,
//!     sample_rate: 8000,
//!     num_channels: 1,
//!     block_align: 0,
//! };
//! let stream = AdpcmStream::new(SliceSource::new(&data), data.len() as u64, specs)?;
//! let mut player = AdpcmPlayer::new(stream);
//! player.set_loop_playing(true);
//! let mut buffer: [I1F15; 2] = [I1F15::ZERO, I1F15::ZERO];
//!
//! for _ in 0..1000 {
//!     player.get_next_frame(&mut buffer)?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::PlayerError;
use crate::source::ByteSource;
use crate::stream::{AdpcmStream, MAX_NUM_CHANNELS};
pub use fixed::types::I1F15;

/// High level of organized players for ADPCM playback.
#[derive(Debug)]
pub struct AdpcmPlayer<S> {
    stream: AdpcmStream<S>,
    loop_playing: bool,
}

impl<S: ByteSource> AdpcmPlayer<S> {
    pub fn new(stream: AdpcmStream<S>) -> Self {
        AdpcmPlayer {
            stream,
            loop_playing: false,
        }
    }

    /// Enable loop playback.
    /// true: Enable loop playback
    /// false: Disable loop playback
    pub fn set_loop_playing(&mut self, en: bool) {
        self.loop_playing = en;
    }

    /// The stream being played.
    pub fn stream(&self) -> &AdpcmStream<S> {
        &self.stream
    }

    /// Move the playback position back to the beginning.
    pub fn rewind(&mut self) -> Result<(), PlayerError> {
        Ok(self.stream.rewind()?)
    }

    /// Return samples value of the next frame.
    ///
    /// # Arguments
    ///
    /// * 'out' - Output buffer which the sample values are written. Number of elements must be equal to or greater than the number of channels.
    ///
    /// # Errors
    ///
    /// * `PlayerError::InsufficientOutputBufferChannels` - The number of elements in the output buffer is less than the number of channels.
    /// * `PlayerError::FinishPlaying` - The end of the block has been reached and loop playback is off.
    /// * `PlayerError::Seek` - Rewinding for loop playback failed.
    pub fn get_next_frame(&mut self, out: &mut [I1F15]) -> Result<(), PlayerError> {
        let num_channels = self.stream.specs().num_channels as usize;

        // outバッファーのチャンネル数が不足している場合はエラーを返す
        if out.len() < num_channels {
            return Err(PlayerError::InsufficientOutputBufferChannels);
        }

        let mut frame = [0i16; MAX_NUM_CHANNELS];
        let frame = &mut frame[..num_channels];
        if self.stream.read_buffer(frame) < num_channels {
            if !self.loop_playing {
                return Err(PlayerError::FinishPlaying);
            }
            self.stream.rewind()?;
            if self.stream.read_buffer(frame) < num_channels {
                // Not even one frame in the block.
                return Err(PlayerError::FinishPlaying);
            }
        }

        for (o, &sample) in out.iter_mut().zip(frame.iter()) {
            *o = I1F15::from_bits(sample);
        }
        Ok(())
    }
}
