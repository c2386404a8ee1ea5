//! Dialogic/OKI ADPCM (VOX).
//!
//! 12bit predictor with its own 49 entry step table; the output is scaled up to 16bit.
//! Each byte carries two codes, high nibble first.

use arbitrary_int::u4;

use crate::imaadpcm::ImaChannel;
use crate::source::ByteSource;
use crate::stream::{emit, Input, Pending, Step, MAX_NUM_CHANNELS};
use crate::tables::{INDEX_TABLE, MAX_OKI_STEP_INDEX, OKI_STEP_SIZE_TABLE};

const OKI_MIN: i16 = -2048;
const OKI_MAX: i16 = 2047;

/// Decode one OKI code. Returns the 16bit sample (12bit predictor * 16).
pub fn decode_sample(nibble: u4, channel: &mut ImaChannel) -> i16 {
    let n = nibble.value() as i32;
    let step_size = OKI_STEP_SIZE_TABLE[channel.step_index as usize] as i32;

    let e = (2 * (n & 7) + 1) * step_size / 8;
    let diff = if (n & 8) == 8 { -e } else { e };
    let sample = (channel.predictor as i32 + diff).clamp(OKI_MIN as i32, OKI_MAX as i32) as i16;

    channel.predictor = sample;
    channel.step_index =
        (channel.step_index + INDEX_TABLE[n as usize]).clamp(0, MAX_OKI_STEP_INDEX);

    // 12bit -> 16bit
    sample * 16
}

#[derive(Debug)]
pub(crate) struct OkiState {
    channels: [ImaChannel; MAX_NUM_CHANNELS],
    stereo: bool,
}

impl OkiState {
    pub(crate) fn new(stereo: bool) -> Self {
        OkiState {
            channels: Default::default(),
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
        emit(
            pending,
            decode_sample(u4::new(byte >> 4), &mut self.channels[0]),
        );
        emit(
            pending,
            decode_sample(
                u4::new(byte & 0x0F),
                &mut self.channels[self.stereo as usize],
            ),
        );
        Step::Decoded
    }
}
