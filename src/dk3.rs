//! Duck DK3 IMA-ADPCM
//!
//! Stereo only. The two IMA channels carry the sum and the difference of left and right.
//! Nibbles come low-then-high from each byte in the pattern sum, diff, sum; every
//! three nibbles give two stereo frames.
//!
//! Block header (16 bytes, little endian):
//! ```text
//! [2 bytes] unknown
//! [2 bytes] sample rate copy
//! [6 bytes] unknown
//! [2 bytes] sum predictor
//! [2 bytes] diff predictor
//! [1 byte ] sum step index
//! [1 byte ] diff step index
//! ```
//!
//! Based on http://wiki.multimedia.cx/index.php?title=Duck_DK3_IMA_ADPCM

use arbitrary_int::u4;
use winnow::binary::{le_i16, le_u16, le_u8};
use winnow::error::ModalResult;
use winnow::token::take;
use winnow::Parser;

use crate::imaadpcm::{decode_sample, ImaChannel};
use crate::source::ByteSource;
use crate::stream::{emit, Input, Pending, Step};

/// Size of the block header in bytes.
pub(crate) const HEADER_SIZE: usize = 16;

#[derive(Debug)]
struct BlockHeader {
    rate: u16,
    sum: ImaChannel,
    diff: ImaChannel,
}

fn parse_block_header(input: &mut &[u8]) -> ModalResult<BlockHeader> {
    le_u16.void().parse_next(input)?; // unknown
    let rate = le_u16.parse_next(input)?;
    take(6usize).void().parse_next(input)?; // unknown
    let sum_predictor = le_i16.parse_next(input)?;
    let diff_predictor = le_i16.parse_next(input)?;
    let sum_index = le_u8.parse_next(input)?;
    let diff_index = le_u8.parse_next(input)?;

    Ok(BlockHeader {
        rate,
        sum: ImaChannel::from_header(sum_predictor, sum_index as i32),
        diff: ImaChannel::from_header(diff_predictor, diff_index as i32),
    })
}

/// Combine sum and difference into one channel, clamped to 16bit.
fn combine(sum: i16, diff: i16, negate: bool) -> i16 {
    let d = if negate { -(diff as i32) } else { diff as i32 };
    (sum as i32 + d).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

#[derive(Debug)]
pub(crate) struct Dk3State {
    sum: ImaChannel,
    diff: ImaChannel,
    /// The high nibble of `last_byte` is next.
    top_nibble: bool,
    last_byte: u8,
    block_align: u32,
    rate: u32,
}

impl Dk3State {
    pub(crate) fn new(block_align: u32, rate: u32) -> Self {
        Dk3State {
            sum: ImaChannel::default(),
            diff: ImaChannel::default(),
            top_nibble: false,
            last_byte: 0,
            block_align,
            rate,
        }
    }

    fn at_block_boundary<S: ByteSource + ?Sized>(&self, input: &Input<'_, S>) -> bool {
        input.offset() % self.block_align as u64 == 0
    }

    /// Next nibble, or `None` at the end of the block or the data.
    fn next_nibble<S: ByteSource + ?Sized>(&mut self, input: &mut Input<'_, S>) -> Option<u4> {
        if self.top_nibble {
            self.top_nibble = false;
            return Some(u4::new(self.last_byte >> 4));
        }
        if self.at_block_boundary(input) {
            return None;
        }
        self.last_byte = input.read_byte()?;
        self.top_nibble = true;
        Some(u4::new(self.last_byte & 0x0F))
    }

    fn emit_frame(&self, pending: &mut Pending) {
        emit(pending, combine(self.sum.predictor, self.diff.predictor, false));
        emit(pending, combine(self.sum.predictor, self.diff.predictor, true));
    }

    pub(crate) fn decode_unit<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        if !self.top_nibble && self.at_block_boundary(input) {
            let mut header = [0u8; HEADER_SIZE];
            if !input.read_exact(&mut header) {
                return Step::Exhausted;
            }
            let Ok(header) = parse_block_header(&mut &header[..]) else {
                return Step::Exhausted;
            };
            if header.rate as u32 != self.rate {
                log::warn!(
                    "DK3 block header rate {} differs from the stream rate {}",
                    header.rate,
                    self.rate
                );
            }
            log::trace!(
                "DK3 block: sum {}/{}, diff {}/{}",
                header.sum.predictor,
                header.sum.step_index,
                header.diff.predictor,
                header.diff.step_index
            );
            self.sum = header.sum;
            self.diff = header.diff;
        }

        // A group cut by the block boundary is dropped, the next unit reads the new header.
        let Some(nibble) = self.next_nibble(input) else {
            return self.end_of_group(input);
        };
        decode_sample(nibble, &mut self.sum);

        let Some(nibble) = self.next_nibble(input) else {
            return self.end_of_group(input);
        };
        decode_sample(nibble, &mut self.diff);
        self.emit_frame(pending);

        let Some(nibble) = self.next_nibble(input) else {
            return self.end_of_group(input);
        };
        decode_sample(nibble, &mut self.sum);
        self.emit_frame(pending);

        Step::Decoded
    }

    fn end_of_group<S: ByteSource + ?Sized>(&self, input: &Input<'_, S>) -> Step {
        if input.offset() < input.len() && self.at_block_boundary(input) {
            Step::Decoded
        } else {
            Step::Exhausted
        }
    }
}
