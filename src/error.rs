use crate::Variant;

/// Error type for constructing an [`AdpcmStream`](crate::AdpcmStream).
///
/// These are fatal: no decoder is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Unsupported number of channels: {0}. Only mono and stereo are supported.")]
    UnsupportedChannelCount(u16),
    #[error("{0} needs a non-zero block align.")]
    MissingBlockAlign(Variant),
    #[error("Block align {block_align} is too small for the {variant} block header.")]
    BlockAlignTooSmall { variant: Variant, block_align: u32 },
    #[error("Duck DK3 IMA-ADPCM only works as a stereo stream, got {0} channel(s).")]
    Dk3RequiresStereo(u16),
}

/// The byte source could not be moved to the requested offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Failed to seek the source to offset {offset}.")]
pub struct SeekError {
    pub offset: u64,
}

/// Error type for [`AdpcmPlayer`](crate::player::AdpcmPlayer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error(
        "The number of elements in the output buffer must be at least equal to the number of channels."
    )]
    InsufficientOutputBufferChannels,
    #[error("Finish playing.")]
    FinishPlaying,
    #[error(transparent)]
    Seek(#[from] SeekError),
}
