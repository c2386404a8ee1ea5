//! Microsoft ADPCM (WAVE format 0x02)
//!
//! Order-2 linear predictor with an adaptive delta. Every `block_align` bytes start with a
//! header (little endian):
//! ```text
//! [1 byte  x ch] predictor mode (index into the coefficient table)
//! [2 bytes x ch] initial delta
//! [2 bytes x ch] newer seed sample
//! [2 bytes x ch] older seed sample
//! ```
//! The seed samples are emitted first (older, then newer) and become `sample2`/`sample1`.
//! The rest of the block is nibbles, high nibble first; stereo alternates channel 0 and 1.

use arbitrary_int::u4;
use winnow::binary::{le_i16, le_u8};
use winnow::error::ModalResult;
use winnow::Parser;

use crate::source::ByteSource;
use crate::stream::{emit, Input, Pending, Step, MAX_NUM_CHANNELS};
use crate::tables::{ADAPTATION_TABLE, ADAPT_COEFF1, ADAPT_COEFF2, MIN_DELTA};

/// Size of the per-channel block header in bytes.
pub(crate) const HEADER_SIZE: usize = 7;

/// Keeps `delta * 768` and `nibble * delta` inside i32.
const MAX_DELTA: i32 = i32::MAX / 768;

/// Adaptive state of one Microsoft ADPCM channel.
/// * 'predictor_mode' - selects coeff1/coeff2. [0-6]
/// * 'sample1' - the most recent output, weighted by coeff1
/// * 'sample2' - the output before that, weighted by coeff2
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsChannel {
    pub predictor_mode: u8,
    pub delta: i32,
    pub coeff1: i32,
    pub coeff2: i32,
    pub sample1: i16,
    pub sample2: i16,
}

impl MsChannel {
    /// Channel state for a predictor mode, with the coefficient pair looked up.
    pub fn with_mode(predictor_mode: u8) -> Self {
        let mode = predictor_mode.min(ADAPT_COEFF1.len() as u8 - 1);
        MsChannel {
            predictor_mode: mode,
            coeff1: ADAPT_COEFF1[mode as usize],
            coeff2: ADAPT_COEFF2[mode as usize],
            ..Default::default()
        }
    }
}

/// Decode Microsoft ADPCM sample.
///
/// # Arguments
///
/// * 'nibble' - 4bit two's complement code
/// * 'channel' - history and delta, updated in place
pub fn decode_sample(nibble: u4, channel: &mut MsChannel) -> i16 {
    let code = nibble.value();
    let signed = if code & 0x08 == 0x08 {
        code as i32 - 16
    } else {
        code as i32
    };

    let predicted =
        (channel.sample1 as i32 * channel.coeff1 + channel.sample2 as i32 * channel.coeff2) >> 8;
    let output =
        (predicted + signed * channel.delta).clamp(i16::MIN as i32, i16::MAX as i32) as i16;

    channel.sample2 = channel.sample1;
    channel.sample1 = output;
    channel.delta =
        ((channel.delta * ADAPTATION_TABLE[code as usize]) >> 8).clamp(MIN_DELTA, MAX_DELTA);

    output
}

/// Parse the block header for `num_channels` channels.
fn parse_block_header(
    input: &mut &[u8],
    num_channels: usize,
) -> ModalResult<[MsChannel; MAX_NUM_CHANNELS]> {
    let mut channels = [MsChannel::default(); MAX_NUM_CHANNELS];
    for ch in channels.iter_mut().take(num_channels) {
        *ch = MsChannel::with_mode(le_u8.parse_next(input)?);
    }
    for ch in channels.iter_mut().take(num_channels) {
        ch.delta = le_i16.parse_next(input)? as i32;
    }
    for ch in channels.iter_mut().take(num_channels) {
        ch.sample1 = le_i16.parse_next(input)?;
    }
    for ch in channels.iter_mut().take(num_channels) {
        ch.sample2 = le_i16.parse_next(input)?;
    }
    Ok(channels)
}

#[derive(Debug)]
pub(crate) struct MsAdpcmState {
    channels: [MsChannel; MAX_NUM_CHANNELS],
    /// Bytes consumed in the current block. Starts at `block_align` so the first header is read.
    block_pos: u32,
    block_align: u32,
    num_channels: usize,
}

impl MsAdpcmState {
    pub(crate) fn new(block_align: u32, stereo: bool) -> Self {
        MsAdpcmState {
            channels: Default::default(),
            block_pos: block_align,
            block_align,
            num_channels: if stereo { 2 } else { 1 },
        }
    }

    fn update_block<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        let size = HEADER_SIZE * self.num_channels;
        let mut header = [0u8; HEADER_SIZE * MAX_NUM_CHANNELS];
        if !input.read_exact(&mut header[..size]) {
            return Step::Exhausted;
        }
        let Ok(channels) = parse_block_header(&mut &header[..size], self.num_channels) else {
            return Step::Exhausted;
        };
        self.channels = channels;
        self.block_pos = size as u32;

        for ch in &self.channels[..self.num_channels] {
            log::trace!(
                "MS ADPCM block: mode {}, delta {}, samples {} {}",
                ch.predictor_mode,
                ch.delta,
                ch.sample1,
                ch.sample2
            );
        }
        // Blockの最初のサンプルはHeaderに記録されている
        for ch in &self.channels[..self.num_channels] {
            emit(pending, ch.sample2);
        }
        for ch in &self.channels[..self.num_channels] {
            emit(pending, ch.sample1);
        }
        Step::Decoded
    }

    pub(crate) fn decode_unit<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        if self.block_pos >= self.block_align {
            return self.update_block(input, pending);
        }
        let Some(byte) = input.read_byte() else {
            return Step::Exhausted;
        };
        self.block_pos += 1;
        let last = self.num_channels - 1;
        emit(
            pending,
            decode_sample(u4::new(byte >> 4), &mut self.channels[0]),
        );
        emit(
            pending,
            decode_sample(u4::new(byte & 0x0F), &mut self.channels[last]),
        );
        Step::Decoded
    }
}
