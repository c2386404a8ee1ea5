//! IMA-ADPCM
//!
//! The order-1 predictor shared by every IMA flavour, plus the two headerless layouts:
//! plain IMA (high nibble first) and DVI (low nibble first).
//!
//! # Examples
//!
//! Decode a headerless DVI stream.
//! ```
//! use adpcm_stream::{AdpcmSpecs, AdpcmStream, SliceSource, Variant};
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = [0x21u8, 0x43, 0x65, 0x87];
//! let specs = AdpcmSpecs {
//!     variant: Variant::Dvi,
//!     sample_rate: 22050,
//!     num_channels: 1,
//!     block_align: 0,
//! };
//! let mut stream = AdpcmStream::new(SliceSource::new(&data), data.len() as u64, specs)?;
//! let mut buffer = [0i16; 8];
//! assert_eq!(stream.read_buffer(&mut buffer), 8);
//! assert!(stream.end_of_data());
//! # Ok(())
//! # }
//! ```

use arbitrary_int::u4;
use winnow::binary::bits::{bits, take};
use winnow::error::{ContextError, ErrMode, ModalResult};
use winnow::Parser;

use crate::source::ByteSource;
use crate::stream::{emit, Input, Pending, Step, MAX_NUM_CHANNELS};
use crate::tables::{INDEX_TABLE, MAX_STEP_INDEX, STEP_SIZE_TABLE};

/// Adaptive state of one IMA channel.
/// * 'predictor' - The last decoded sample value. [16bitInt]
/// * 'step_index' - The current index into STEP_SIZE_TABLE. [0-88]
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImaChannel {
    pub predictor: i16,
    pub step_index: i8,
}

impl ImaChannel {
    /// Channel state seeded from a block header or preamble. The index is clamped to the table.
    pub fn from_header(predictor: i16, step_index: i32) -> Self {
        ImaChannel {
            predictor,
            step_index: step_index.clamp(0, MAX_STEP_INDEX as i32) as i8,
        }
    }
}

/// Decode IMA-ADPCM sample.
///
/// # Arguments
///
/// * 'nibble' - 4bit unsigned int data
/// * 'channel' - predictor and step index, updated in place
///
/// # Returns
///
/// * 'predicted_sample' - The new predictor value [16bitInt]
pub fn decode_sample(nibble: u4, channel: &mut ImaChannel) -> i16 {
    let step_size = STEP_SIZE_TABLE[channel.step_index as usize] as i32;
    let n = nibble.value() as i32;

    // difference = (magnitude + 1/2) * stepsize / 8
    let mut diff = (step_size * (n & 7) + step_size / 2) >> 3;

    // account for sign bit
    if (n & 8) == 8 {
        diff = -diff;
    }

    // |diff| <= (32767 * 7 + 16383) >> 3, always fits in i16
    channel.predictor = channel.predictor.saturating_add(diff as i16);
    channel.step_index = compute_step_size(nibble, channel.step_index);
    channel.predictor
}

/// Update step_size of IMA-ADPCM table.
pub(crate) fn compute_step_size(nibble: u4, mut step_size_table_index: i8) -> i8 {
    // adjust index into step_size lookup table using the code
    step_size_table_index += INDEX_TABLE[nibble.value() as usize];
    step_size_table_index = step_size_table_index.clamp(0, MAX_STEP_INDEX); //check overflow and underflow
    step_size_table_index
}

/// Which half of a byte carries the earlier code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NibbleOrder {
    HighFirst,
    LowFirst,
}

impl NibbleOrder {
    /// Split a byte into (first, second) codes.
    pub(crate) fn split(self, byte: u8) -> (u4, u4) {
        let high = u4::new(byte >> 4);
        let low = u4::new(byte & 0x0F);
        match self {
            NibbleOrder::HighFirst => (high, low),
            NibbleOrder::LowFirst => (low, high),
        }
    }
}

/// Headerless nibble stream (plain IMA and DVI).
///
/// Each byte holds two codes. Mono feeds both to channel 0, stereo feeds the first code to
/// channel 0 and the second to channel 1, so channel parity never needs a header to resync.
#[derive(Debug)]
pub(crate) struct NibbleStreamState {
    channels: [ImaChannel; MAX_NUM_CHANNELS],
    order: NibbleOrder,
    stereo: bool,
}

impl NibbleStreamState {
    pub(crate) fn new(order: NibbleOrder, stereo: bool) -> Self {
        NibbleStreamState {
            channels: Default::default(),
            order,
            stereo,
        }
    }

    pub(crate) fn decode_unit<S: ByteSource + ?Sized>(
        &mut self,
        input: &mut Input<'_, S>,
        pending: &mut Pending,
    ) -> Step {
        let Some(byte) = input.read_byte() else {
            return Step::Exhausted;
        };
        let (first, second) = self.order.split(byte);
        emit(pending, decode_sample(first, &mut self.channels[0]));
        emit(
            pending,
            decode_sample(second, &mut self.channels[self.stereo as usize]),
        );
        Step::Decoded
    }
}

/// IMA-ADPCMのData word (32bit長)を8つのnibble(4bit長)にパースしたもの
type DataWordNibbles = (u8, u8, u8, u8, u8, u8, u8, u8);

/// Parse a 32bit data word into 8 nibbles in stream order (low nibble of each byte first).
pub(crate) fn parse_data_word(input: &mut &[u8]) -> ModalResult<[u4; 8]> {
    let n: DataWordNibbles = bits::<_, _, ErrMode<ContextError>, _, _>((
        take(4usize),
        take(4usize),
        take(4usize),
        take(4usize),
        take(4usize),
        take(4usize),
        take(4usize),
        take(4usize),
    ))
    .parse_next(input)?;
    Ok([n.1, n.0, n.3, n.2, n.5, n.4, n.7, n.6].map(u4::new))
}
