//! Apple QuickTime IMA-ADPCM (IMA4)
//!
//! The block is a sequence of `block_align` byte chunks. In stereo the chunks alternate
//! between left and right, so each channel keeps its own cursor: channel 1 starts one chunk
//! after channel 0 and both skip the other channel's chunk when theirs ends.
//!
//! Each chunk starts with a big endian 16bit preamble: the upper 9 bits are the predictor,
//! the lower 7 bits the step index. The rest of the chunk is nibbles, low nibble first.
//!
//! Resources on Apple IMA4:
//! - MultimediaWiki's [Apple QuickTime IMA ADPCM](https://wiki.multimedia.cx/index.php?title=Apple_QuickTime_IMA_ADPCM) page

use arbitrary_int::u4;
use winnow::binary::be_u16;
use winnow::error::ModalResult;
use winnow::Parser;

use crate::imaadpcm::{decode_sample, ImaChannel};
use crate::source::ByteSource;
use crate::stream::{emit, Input, Pending, Step, MAX_NUM_CHANNELS};

/// Size of the chunk preamble in bytes.
pub(crate) const PREAMBLE_SIZE: usize = 2;

/// Parse the chunk preamble.
fn parse_preamble(input: &mut &[u8]) -> ModalResult<ImaChannel> {
    let word = be_u16.parse_next(input)?;
    Ok(ImaChannel::from_header(
        (word & 0xFF80) as i16,
        (word & 0x007F) as i32,
    ))
}

#[derive(Debug)]
pub(crate) struct AppleState {
    channels: [ImaChannel; MAX_NUM_CHANNELS],
    /// Next byte to read for each channel, relative to the start of the block.
    stream_pos: [u64; MAX_NUM_CHANNELS],
    /// Nibbles consumed in the current chunk. 0 means the preamble comes next.
    chunk_pos: [u32; MAX_NUM_CHANNELS],
    /// High nibble of the last byte, not decoded yet.
    held: [Option<u4>; MAX_NUM_CHANNELS],
    num_channels: usize,
    block_align: u32,
}

impl AppleState {
    pub(crate) fn new(block_align: u32, stereo: bool) -> Self {
        AppleState {
            channels: Default::default(),
            stream_pos: [0, block_align as u64],
            chunk_pos: [0; MAX_NUM_CHANNELS],
            held: [None; MAX_NUM_CHANNELS],
            num_channels: if stereo { 2 } else { 1 },
            block_align,
        }
    }

    fn nibbles_per_chunk(&self) -> u32 {
        (self.block_align - PREAMBLE_SIZE as u32) * 2
    }

    /// True when some channel has nothing left, so no complete frame can follow.
    pub(crate) fn is_exhausted(&self, len: u64) -> bool {
        (0..self.num_channels).any(|ch| self.held[ch].is_none() && self.stream_pos[ch] >= len)
    }

    fn next_nibble<S: ByteSource + ?Sized>(
        &mut self,
        ch: usize,
        input: &mut Input<'_, S>,
    ) -> Option<u4> {
        if let Some(nibble) = self.held[ch].take() {
            return Some(nibble);
        }
        if !input.seek_to(self.stream_pos[ch]) {
            return None;
        }
        if self.chunk_pos[ch] == 0 {
            let mut preamble = [0u8; PREAMBLE_SIZE];
            if !input.read_exact(&mut preamble) {
                return None;
            }
            let Ok(channel) = parse_preamble(&mut &preamble[..]) else {
                return None;
            };
            log::trace!(
                "IMA4 ch{} chunk at {}: predictor {}, index {}",
                ch,
                self.stream_pos[ch],
                channel.predictor,
                channel.step_index
            );
            self.channels[ch] = channel;
        }
        let byte = input.read_byte()?;
        self.stream_pos[ch] = input.offset();
        self.held[ch] = Some(u4::new(byte >> 4));
        Some(u4::new(byte & 0x0F))
    }

    /// Decode one frame: one sample per channel.
    pub(crate) fn decode_unit<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        let mut frame = [0i16; MAX_NUM_CHANNELS];
        for (ch, sample) in frame.iter_mut().enumerate().take(self.num_channels) {
            let Some(nibble) = self.next_nibble(ch, input) else {
                return Step::Exhausted;
            };
            *sample = decode_sample(nibble, &mut self.channels[ch]);

            self.chunk_pos[ch] += 1;
            if self.chunk_pos[ch] == self.nibbles_per_chunk() {
                // チャンク終端: ステレオなら相手チャンネルのチャンクを飛ばす
                self.chunk_pos[ch] = 0;
                self.held[ch] = None;
                if self.num_channels == 2 {
                    self.stream_pos[ch] += self.block_align as u64;
                }
            }
        }
        for &sample in &frame[..self.num_channels] {
            emit(pending, sample);
        }
        Step::Decoded
    }
}
