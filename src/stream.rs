//! The decode stream shared by every variant.

use core::fmt;

use heapless::Deque;

use crate::apple::AppleState;
use crate::dk3::Dk3State;
use crate::error::{ConfigurationError, SeekError};
use crate::imaadpcm::{NibbleOrder, NibbleStreamState};
use crate::msadpcm::MsAdpcmState;
use crate::msima::MsImaState;
use crate::oki::OkiState;
use crate::source::ByteSource;

/// Maximum number of channels.
pub const MAX_NUM_CHANNELS: usize = 2;

/// Samples decoded but not yet handed to the caller.
/// The largest unit is one stereo MS IMA group (2 x 8 samples).
pub(crate) const PENDING_CAPACITY: usize = 16;

pub(crate) type Pending = Deque<i16, PENDING_CAPACITY>;

/// ADPCM layout of the compressed block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Dialogic/OKI (VOX), headerless, high nibble first.
    Oki,
    /// Headerless IMA, high nibble first.
    #[default]
    Ima,
    /// Headerless DVI IMA, low nibble first, alternating channels in stereo.
    Dvi,
    /// Apple QuickTime IMA4, per-channel chunks with a 2 byte preamble.
    AppleIma,
    /// Microsoft IMA (WAVE 0x11), 4 byte header per channel per block.
    MsIma {
        /// Flip the sign bit of every nibble, for encoders that store signs the other way round.
        invert_samples: bool,
    },
    /// Duck DK3 IMA, stereo only, sum/difference channels.
    Dk3,
    /// Microsoft ADPCM (WAVE 0x02), order-2 linear predictor.
    MsAdpcm,
}

impl Variant {
    /// Whether a per-block header is read every `block_align` bytes.
    pub fn needs_block_align(&self) -> bool {
        matches!(
            self,
            Variant::AppleIma | Variant::MsIma { .. } | Variant::Dk3 | Variant::MsAdpcm
        )
    }

    /// Smallest block align that leaves room for the block header and at least one data byte.
    fn min_block_align(&self, num_channels: u32) -> u32 {
        match self {
            Variant::AppleIma => crate::apple::PREAMBLE_SIZE as u32 + 1,
            Variant::MsIma { .. } => crate::msima::HEADER_SIZE as u32 * num_channels + 1,
            Variant::Dk3 => crate::dk3::HEADER_SIZE as u32 + 1,
            Variant::MsAdpcm => crate::msadpcm::HEADER_SIZE as u32 * num_channels + 1,
            Variant::Oki | Variant::Ima | Variant::Dvi => 0,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Variant::Oki => "OKI ADPCM",
            Variant::Ima => "IMA-ADPCM",
            Variant::Dvi => "DVI IMA-ADPCM",
            Variant::AppleIma => "Apple QuickTime IMA-ADPCM",
            Variant::MsIma { .. } => "Microsoft IMA-ADPCM",
            Variant::Dk3 => "Duck DK3 IMA-ADPCM",
            Variant::MsAdpcm => "Microsoft ADPCM",
        };
        f.write_str(name)
    }
}

/// Basic information on the compressed block.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmSpecs {
    /// ADPCM layout.
    pub variant: Variant,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels. Mono: 1, Stereo: 2.
    pub num_channels: u16,
    /// Number of bytes per block. Ignored by the headerless variants.
    pub block_align: u32,
}

impl AdpcmSpecs {
    /// Check the specs before any decoding happens.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !(1..=MAX_NUM_CHANNELS as u16).contains(&self.num_channels) {
            return Err(ConfigurationError::UnsupportedChannelCount(
                self.num_channels,
            ));
        }
        if self.variant == Variant::Dk3 && self.num_channels != 2 {
            return Err(ConfigurationError::Dk3RequiresStereo(self.num_channels));
        }
        if self.variant.needs_block_align() {
            if self.block_align == 0 {
                return Err(ConfigurationError::MissingBlockAlign(self.variant));
            }
            if self.block_align < self.variant.min_block_align(self.num_channels as u32) {
                return Err(ConfigurationError::BlockAlignTooSmall {
                    variant: self.variant,
                    block_align: self.block_align,
                });
            }
        }
        Ok(())
    }
}

/// Per-variant decoder state. Replaced as a whole on reset.
#[derive(Debug)]
enum Codec {
    Oki(OkiState),
    Ima(NibbleStreamState),
    Dvi(NibbleStreamState),
    Apple(AppleState),
    MsImaMono(MsImaState),
    MsImaStereo(MsImaState),
    Dk3(Dk3State),
    MsAdpcm(MsAdpcmState),
}

impl Codec {
    fn new(specs: &AdpcmSpecs) -> Self {
        let stereo = specs.num_channels == 2;
        match specs.variant {
            Variant::Oki => Codec::Oki(OkiState::new(stereo)),
            Variant::Ima => Codec::Ima(NibbleStreamState::new(NibbleOrder::HighFirst, stereo)),
            Variant::Dvi => Codec::Dvi(NibbleStreamState::new(NibbleOrder::LowFirst, stereo)),
            Variant::AppleIma => Codec::Apple(AppleState::new(specs.block_align, stereo)),
            Variant::MsIma { invert_samples } if stereo => {
                Codec::MsImaStereo(MsImaState::new(specs.block_align, invert_samples))
            }
            Variant::MsIma { invert_samples } => {
                Codec::MsImaMono(MsImaState::new(specs.block_align, invert_samples))
            }
            Variant::Dk3 => Codec::Dk3(Dk3State::new(specs.block_align, specs.sample_rate)),
            Variant::MsAdpcm => Codec::MsAdpcm(MsAdpcmState::new(specs.block_align, stereo)),
        }
    }
}

/// Result of decoding one unit (a byte, a group, a header...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Progress was made, possibly without producing samples (e.g. a block boundary).
    Decoded,
    /// Nothing more can be decoded.
    Exhausted,
}

/// View of the source bounded to `[start, end)`, handed to the variant decoders.
pub(crate) struct Input<'s, S: ?Sized> {
    source: &'s mut S,
    start: u64,
    end: u64,
    truncated: &'s mut bool,
}

impl<S: ByteSource + ?Sized> Input<'_, S> {
    /// Offset relative to the start of the compressed block.
    pub fn offset(&self) -> u64 {
        self.source.pos().saturating_sub(self.start)
    }

    /// Length of the compressed block.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.source.pos())
    }

    /// Fill `buf` entirely or return false.
    ///
    /// A request crossing the end of the block, or a source that runs dry early, marks the
    /// stream as truncated.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> bool {
        let remaining = self.remaining();
        if remaining == 0 {
            return false;
        }
        if remaining < buf.len() as u64 {
            log::warn!(
                "{} byte(s) requested but only {} left in the block",
                buf.len(),
                remaining
            );
            *self.truncated = true;
            return false;
        }
        let n = self.source.read(buf);
        if n < buf.len() {
            log::warn!(
                "source exhausted at offset {}: {} of {} byte(s) read",
                self.source.pos(),
                n,
                buf.len()
            );
            *self.truncated = true;
            return false;
        }
        true
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte).then_some(byte[0])
    }

    /// Discard up to `n` bytes, stopping at the end of the block.
    pub fn skip(&mut self, n: u64) -> bool {
        let target = self.source.pos().saturating_add(n).min(self.end);
        self.seek_absolute(target)
    }

    /// Move to `offset` relative to the start of the block.
    pub fn seek_to(&mut self, offset: u64) -> bool {
        let target = self.start.saturating_add(offset);
        if target > self.end {
            return false;
        }
        self.seek_absolute(target)
    }

    fn seek_absolute(&mut self, target: u64) -> bool {
        if self.source.pos() == target {
            return true;
        }
        match self.source.seek(target) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("{}", e);
                *self.truncated = true;
                false
            }
        }
    }
}

/// Push a decoded sample to the pending queue.
pub(crate) fn emit(pending: &mut Pending, sample: i16) {
    if pending.push_back(sample).is_err() {
        log::warn!("pending sample queue overflow, sample dropped");
    }
}

/// Pull-based ADPCM decoder over a compressed block `[start, start + size)`.
///
/// Construct one per compressed block. The block starts at the source's position at construction.
/// Pass `&mut source` to keep ownership of the source, or the source itself to hand it over
/// (it can be taken back with [`AdpcmStream::into_inner`]).
#[derive(Debug)]
pub struct AdpcmStream<S> {
    source: S,
    specs: AdpcmSpecs,
    start_pos: u64,
    end_pos: u64,
    codec: Codec,
    pending: Pending,
    truncated: bool,
    finished: bool,
}

impl<S: ByteSource> AdpcmStream<S> {
    /// # Arguments
    ///
    /// * 'source' - Byte source positioned at the start of the compressed block.
    /// * 'size' - Length of the compressed block in bytes.
    /// * 'specs' - Variant, sample rate, channels and block align.
    ///
    /// # Errors
    ///
    /// * `ConfigurationError` - The specs can't describe a valid stream for the variant.
    pub fn new(source: S, size: u64, specs: AdpcmSpecs) -> Result<Self, ConfigurationError> {
        specs.validate()?;
        let start_pos = source.pos();
        log::debug!(
            "{}: {} ch, {} Hz, block align {}, bytes {}..{}",
            specs.variant,
            specs.num_channels,
            specs.sample_rate,
            specs.block_align,
            start_pos,
            start_pos + size
        );
        Ok(AdpcmStream {
            source,
            specs,
            start_pos,
            end_pos: start_pos.saturating_add(size),
            codec: Codec::new(&specs),
            pending: Deque::new(),
            truncated: false,
            finished: false,
        })
    }

    /// Decode up to `out.len()` samples, interleaved L/R for stereo.
    ///
    /// Returns the number of samples written. A short count means the end of the block or a
    /// truncated source, see [`AdpcmStream::end_of_data`] and [`AdpcmStream::is_truncated`].
    pub fn read_buffer(&mut self, out: &mut [i16]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if let Some(sample) = self.pending.pop_front() {
                out[written] = sample;
                written += 1;
                continue;
            }
            if self.end_of_data() {
                break;
            }
            if self.decode_unit() == Step::Exhausted {
                self.finished = true;
            }
        }
        written
    }

    fn decode_unit(&mut self) -> Step {
        let mut input = Input {
            source: &mut self.source,
            start: self.start_pos,
            end: self.end_pos,
            truncated: &mut self.truncated,
        };
        let pending = &mut self.pending;
        match &mut self.codec {
            Codec::Oki(s) => s.decode_unit(&mut input, pending),
            Codec::Ima(s) | Codec::Dvi(s) => s.decode_unit(&mut input, pending),
            Codec::Apple(s) => s.decode_unit(&mut input, pending),
            Codec::MsImaMono(s) => s.decode_mono_unit(&mut input, pending),
            Codec::MsImaStereo(s) => s.decode_stereo_unit(&mut input, pending),
            Codec::Dk3(s) => s.decode_unit(&mut input, pending),
            Codec::MsAdpcm(s) => s.decode_unit(&mut input, pending),
        }
    }

    /// True when every decodable sample has been returned.
    pub fn end_of_data(&self) -> bool {
        if !self.pending.is_empty() {
            return false;
        }
        if self.truncated || self.finished {
            return true;
        }
        match &self.codec {
            Codec::Apple(s) => s.is_exhausted(self.end_pos - self.start_pos),
            _ => self.source.eos() || self.source.pos() >= self.end_pos,
        }
    }

    /// True if decoding stopped because the source had fewer bytes than the block claims.
    pub fn is_truncated(&self) -> bool {
        if self.truncated {
            return true;
        }
        // Apple IMA4 cursors jump around, the source position says nothing about them.
        !matches!(self.codec, Codec::Apple(_))
            && self.source.eos()
            && self.source.pos() < self.end_pos
    }

    pub fn is_stereo(&self) -> bool {
        self.specs.num_channels == 2
    }

    pub fn rate(&self) -> u32 {
        self.specs.sample_rate
    }

    pub fn specs(&self) -> &AdpcmSpecs {
        &self.specs
    }

    /// Re-initialize channel state and layout trackers without moving the source.
    pub fn reset(&mut self) {
        self.codec = Codec::new(&self.specs);
        self.pending.clear();
        self.truncated = false;
        self.finished = false;
    }

    /// Move the decode position back to the beginning of the block.
    ///
    /// The state is reset even if the seek fails; the position is then undefined until a
    /// later successful rewind.
    pub fn rewind(&mut self) -> Result<(), SeekError> {
        self.reset();
        log::debug!("{}: rewind to {}", self.specs.variant, self.start_pos);
        self.source.seek(self.start_pos)
    }

    /// Give the source back.
    pub fn into_inner(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SliceSource;

    fn specs(variant: Variant, num_channels: u16, block_align: u32) -> AdpcmSpecs {
        AdpcmSpecs {
            variant,
            sample_rate: 22050,
            num_channels,
            block_align,
        }
    }

    #[test]
    fn rejects_bad_channel_counts() {
        for n in [0u16, 3] {
            let r = AdpcmStream::new(SliceSource::new(&[]), 0, specs(Variant::Ima, n, 0));
            assert_eq!(
                r.err(),
                Some(ConfigurationError::UnsupportedChannelCount(n))
            );
        }
    }

    #[test]
    fn rejects_missing_block_align() {
        let variants = [
            Variant::MsIma {
                invert_samples: false,
            },
            Variant::MsAdpcm,
            Variant::AppleIma,
            Variant::Dk3,
        ];
        for v in variants {
            let r = AdpcmStream::new(SliceSource::new(&[]), 0, specs(v, 2, 0));
            assert_eq!(r.err(), Some(ConfigurationError::MissingBlockAlign(v)));
        }
    }

    #[test]
    fn rejects_block_align_smaller_than_header() {
        let r = AdpcmStream::new(SliceSource::new(&[]), 0, specs(Variant::MsAdpcm, 2, 14));
        assert_eq!(
            r.err(),
            Some(ConfigurationError::BlockAlignTooSmall {
                variant: Variant::MsAdpcm,
                block_align: 14
            })
        );
    }

    #[test]
    fn dk3_needs_two_channels() {
        let r = AdpcmStream::new(SliceSource::new(&[]), 0, specs(Variant::Dk3, 1, 64));
        assert_eq!(r.err(), Some(ConfigurationError::Dk3RequiresStereo(1)));
    }

    #[test]
    fn headerless_variants_ignore_block_align() {
        for v in [Variant::Oki, Variant::Ima, Variant::Dvi] {
            assert!(AdpcmStream::new(SliceSource::new(&[]), 0, specs(v, 1, 0)).is_ok());
        }
    }

    #[test]
    fn block_starts_at_source_position() {
        let data = [0xFFu8, 0xFF, 0x22, 0x22];
        let src = SliceSource::at(&data, 2);
        let mut stream = AdpcmStream::new(src, 2, specs(Variant::Ima, 1, 0)).unwrap();
        let mut out = [0i16; 8];
        assert_eq!(stream.read_buffer(&mut out), 4);
        assert!(out[..4].iter().all(|&s| s > 0));
        assert!(stream.end_of_data());
        assert!(!stream.is_truncated());
    }

    #[test]
    fn truncated_source_sets_end_of_data() {
        // MS ADPCM stereo header needs 14 bytes, only 10 are there.
        let data = [0u8; 10];
        let mut stream =
            AdpcmStream::new(SliceSource::new(&data), 64, specs(Variant::MsAdpcm, 2, 32)).unwrap();
        let mut out = [0i16; 16];
        assert_eq!(stream.read_buffer(&mut out), 0);
        assert!(stream.is_truncated());
        assert!(stream.end_of_data());
        assert_eq!(stream.read_buffer(&mut out), 0);
    }

    #[test]
    fn odd_capacity_keeps_second_nibble() {
        let data = [0x12u8, 0x34];
        let mut stream =
            AdpcmStream::new(SliceSource::new(&data), 2, specs(Variant::Ima, 1, 0)).unwrap();
        let mut all = [0i16; 4];
        assert_eq!(stream.read_buffer(&mut all), 4);

        stream.rewind().unwrap();
        let mut one = [0i16; 1];
        let mut pieces = [0i16; 4];
        for p in pieces.iter_mut() {
            assert_eq!(stream.read_buffer(&mut one), 1);
            *p = one[0];
        }
        assert_eq!(pieces, all);
        assert_eq!(stream.read_buffer(&mut one), 0);
    }

    #[test]
    fn rewind_clears_end_of_data() {
        let data = [0x77u8; 4];
        let mut src = SliceSource::new(&data);
        let mut stream = AdpcmStream::new(&mut src, 4, specs(Variant::Dvi, 1, 0)).unwrap();
        let mut out = [0i16; 8];
        assert_eq!(stream.read_buffer(&mut out), 8);
        assert!(stream.end_of_data());
        assert!(stream.rewind().is_ok());
        assert!(!stream.end_of_data());
    }

    /// Source that refuses every seek.
    struct Unseekable<'a>(SliceSource<'a>);

    impl ByteSource for Unseekable<'_> {
        fn read(&mut self, buf: &mut [u8]) -> usize {
            self.0.read(buf)
        }
        fn seek(&mut self, offset: u64) -> Result<(), SeekError> {
            Err(SeekError { offset })
        }
        fn eos(&self) -> bool {
            self.0.eos()
        }
        fn pos(&self) -> u64 {
            self.0.pos()
        }
    }

    #[test]
    fn rewind_reports_seek_failure() {
        let data = [0x31u8; 4];
        let src = Unseekable(SliceSource::new(&data));
        let mut stream = AdpcmStream::new(src, 4, specs(Variant::Ima, 2, 0)).unwrap();
        let mut out = [0i16; 3];
        assert_eq!(stream.read_buffer(&mut out), 3);
        assert_eq!(stream.rewind(), Err(SeekError { offset: 0 }));
        assert!(!stream.is_truncated());
    }
}
