//! Microsoft IMA-ADPCM (WAVE format 0x11)
//!
//! Every `block_align` bytes start with a 4 byte header per channel. The header sample only
//! seeds the predictor, it is not emitted.
//! Mono data is a plain byte sequence, low nibble first. Stereo data is interleaved in
//! 32bit data words: 8 nibbles for channel 0 followed by 8 nibbles for channel 1.
//!
//! Multimedia Data Standards Update April 15, 1994 Page 32 of 74
//! http://elm-chan.org/junk/adpcm/RIFF_NEW.pdf

use arbitrary_int::u4;
use winnow::binary::{le_i16, le_u8};
use winnow::error::ModalResult;
use winnow::Parser;

use crate::imaadpcm::{decode_sample, parse_data_word, ImaChannel};
use crate::source::ByteSource;
use crate::stream::{emit, Input, Pending, Step, MAX_NUM_CHANNELS};

/// Size of the per-channel block header in bytes.
pub(crate) const HEADER_SIZE: usize = 4;

/// Size of one channel's data word in a stereo group.
const DATA_WORD_SIZE: usize = 4;

const SAMPLES_PER_DATA_WORD: usize = DATA_WORD_SIZE * 2;

/// Parse "Header Word" of IMA-ADPCM.
/// * 'iSamp0' - 16bit predictor seed.
/// * 'bStepTableIndex' - step index, clamped to the table.
/// * 'bReserved' - ignored.
fn parse_block_header(input: &mut &[u8]) -> ModalResult<ImaChannel> {
    let i_samp_0 = le_i16.parse_next(input)?;
    let b_step_table_index = le_u8.parse_next(input)?;
    le_u8.void().parse_next(input)?; // reserved bits

    Ok(ImaChannel::from_header(i_samp_0, b_step_table_index as i32))
}

#[derive(Debug)]
pub(crate) struct MsImaState {
    channels: [ImaChannel; MAX_NUM_CHANNELS],
    /// Bytes consumed in the current block. Starts at `block_align` so the first header is read.
    block_pos: u32,
    block_align: u32,
    invert_samples: bool,
}

impl MsImaState {
    pub(crate) fn new(block_align: u32, invert_samples: bool) -> Self {
        MsImaState {
            channels: Default::default(),
            block_pos: block_align,
            block_align,
            invert_samples,
        }
    }

    fn nibble(&self, code: u4) -> u4 {
        if self.invert_samples {
            u4::new(code.value() ^ 0x08)
        } else {
            code
        }
    }

    /// Read the header of the next block if the current one is used up.
    fn update_block<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        num_channels: usize,
    ) -> bool {
        if self.block_pos < self.block_align {
            return true;
        }
        let mut header = [0u8; HEADER_SIZE * MAX_NUM_CHANNELS];
        let header = &mut header[..HEADER_SIZE * num_channels];
        if !input.read_exact(header) {
            return false;
        }
        let mut remains: &[u8] = header;
        for ch in 0..num_channels {
            let Ok(channel) = parse_block_header(&mut remains) else {
                return false;
            };
            log::trace!(
                "MS IMA block at {}: ch{} predictor {}, index {}",
                input.offset() - (HEADER_SIZE * num_channels) as u64,
                ch,
                channel.predictor,
                channel.step_index
            );
            self.channels[ch] = channel;
        }
        self.block_pos = (HEADER_SIZE * num_channels) as u32;
        true
    }

    pub(crate) fn decode_mono_unit<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        if !self.update_block(input, 1) {
            return Step::Exhausted;
        }
        let Some(byte) = input.read_byte() else {
            return Step::Exhausted;
        };
        self.block_pos += 1;
        let low = self.nibble(u4::new(byte & 0x0F));
        let high = self.nibble(u4::new(byte >> 4));
        emit(pending, decode_sample(low, &mut self.channels[0]));
        emit(pending, decode_sample(high, &mut self.channels[0]));
        Step::Decoded
    }

    pub(crate) fn decode_stereo_unit<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        if !self.update_block(input, 2) {
            return Step::Exhausted;
        }

        let group_size = (DATA_WORD_SIZE * MAX_NUM_CHANNELS) as u32;
        if self.block_align - self.block_pos < group_size {
            // Trailing bytes that can't hold a whole group.
            let rest = self.block_align - self.block_pos;
            self.block_pos = self.block_align;
            return if input.skip(rest as u64) {
                Step::Decoded
            } else {
                Step::Exhausted
            };
        }

        let mut group = [0u8; DATA_WORD_SIZE * MAX_NUM_CHANNELS];
        if !input.read_exact(&mut group) {
            return Step::Exhausted;
        }
        self.block_pos += group_size;

        let mut decoded = [[0i16; SAMPLES_PER_DATA_WORD]; MAX_NUM_CHANNELS];
        let mut remains = &group[..];
        for (ch, samples) in decoded.iter_mut().enumerate() {
            let Ok(nibbles) = parse_data_word(&mut remains) else {
                return Step::Exhausted;
            };
            for (sample, nibble) in samples.iter_mut().zip(nibbles) {
                *sample = decode_sample(self.nibble(nibble), &mut self.channels[ch]);
            }
        }

        // The data words are interleaved block-wise, the output sample-wise.
        for i in 0..SAMPLES_PER_DATA_WORD {
            emit(pending, decoded[0][i]);
            emit(pending, decoded[1][i]);
        }
        Step::Decoded
    }
}
