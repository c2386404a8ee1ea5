//! Constant tables shared by the decoders.

/// Step index adjustment for the IMA family and OKI, indexed by the 4bit code.
///
/// The second half mirrors the first one, the sign bit never changes the adjustment.
pub const INDEX_TABLE: [i8; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

/// Quantizer lookup table for decode IMA-ADPCM.
pub const STEP_SIZE_TABLE: [i16; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449,
    494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066, 2272,
    2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630, 9493,
    10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794, 32767,
];

/// Largest valid index into [`STEP_SIZE_TABLE`].
pub const MAX_STEP_INDEX: i8 = (STEP_SIZE_TABLE.len() - 1) as i8;

/// Dialogic/OKI step sizes, 12bit output range.
pub const OKI_STEP_SIZE_TABLE: [i16; 49] = [
    16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66, 73, 80, 88, 97, 107, 118, 130,
    143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408, 449, 494, 544, 598, 658, 724, 796,
    876, 963, 1060, 1166, 1282, 1411, 1552,
];

/// Largest valid index into [`OKI_STEP_SIZE_TABLE`].
pub const MAX_OKI_STEP_INDEX: i8 = (OKI_STEP_SIZE_TABLE.len() - 1) as i8;

/// Microsoft ADPCM delta adaptation factors (x256), indexed by the 4bit code.
pub const ADAPTATION_TABLE: [i32; 16] = [
    230, 230, 230, 230, 307, 409, 512, 614, 768, 614, 512, 409, 307, 230, 230, 230,
];

/// Microsoft ADPCM predictor coefficients (x256), one pair per predictor mode.
pub const ADAPT_COEFF1: [i32; 7] = [256, 512, 0, 192, 240, 460, 392];
pub const ADAPT_COEFF2: [i32; 7] = [0, -256, 0, 64, 0, -208, -232];

/// Floor for the Microsoft ADPCM delta.
pub const MIN_DELTA: i32 = 16;
