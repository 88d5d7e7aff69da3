use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JpeglsError {
    /// The codestream is malformed at a specific byte offset under a known marker.
    #[error("malformed codestream at offset {offset} (marker {marker:#04x})")]
    MalformedCodestream { offset: usize, marker: u8 },

    /// The input buffer ended before the expected amount of data was available.
    #[error("truncated input: expected {expected} bytes, {available} available")]
    TruncatedInput { expected: usize, available: usize },

    /// A feature that is recognized but intentionally unimplemented (an explicit Non-goal).
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// An arithmetic coder (MQ or Golomb) register overflowed or underflowed.
    #[error("arithmetic coder overflow")]
    ArithmeticOverflow,

    #[error("Not enough memory")]
    NotEnoughMemory,
    #[error("Callback failed")]
    CallbackFailed,
    #[error("Destination too small")]
    DestinationTooSmall,
    #[error("Need more data")]
    NeedMoreData,
    #[error("Invalid data")]
    InvalidData,
    #[error("Encoding not supported")]
    EncodingNotSupported,
    #[error("Parameter value not supported")]
    ParameterValueNotSupported,
    #[error("Color transform not supported")]
    ColorTransformNotSupported,
    #[error("JPEG-LS preset extended parameter type not supported")]
    JpeglsPresetExtendedParameterTypeNotSupported,
    #[error("JPEG marker start byte not found")]
    JpegMarkerStartByteNotFound,
    #[error("Start of image marker not found")]
    StartOfImageMarkerNotFound,
    #[error("Invalid SPIFF header")]
    InvalidSpiffHeader,
    #[error("Unknown JPEG marker found")]
    UnknownJpegMarkerFound,
    #[error("Unexpected start of scan marker")]
    UnexpectedStartOfScanMarker,
    #[error("Invalid marker segment size")]
    InvalidMarkerSegmentSize,
    #[error("Duplicate start of image marker")]
    DuplicateStartOfImageMarker,
    #[error("Duplicate start of frame marker")]
    DuplicateStartOfFrameMarker,
    #[error("Duplicate component ID in SOF segment")]
    DuplicateComponentIdInSofSegment,
    #[error("Unexpected end of image marker")]
    UnexpectedEndOfImageMarker,
    #[error("Invalid JPEG-LS preset parameter type")]
    InvalidJpeglsPresetParameterType,
    #[error("Missing end of SPIFF directory")]
    MissingEndOfSpiffDirectory,
    #[error("Unexpected restart marker")]
    UnexpectedRestartMarker,
    #[error("Restart marker not found")]
    RestartMarkerNotFound,
    #[error("End of image marker not found")]
    EndOfImageMarkerNotFound,
    #[error("Unexpected define number of lines marker")]
    UnexpectedDefineNumberOfLinesMarker,
    #[error("Define number of lines marker not found")]
    DefineNumberOfLinesMarkerNotFound,
    #[error("Unknown component ID")]
    UnknownComponentId,
    #[error("Abbreviated format and SPIFF header mismatch")]
    AbbreviatedFormatAndSpiffHeaderMismatch,
    #[error("Invalid parameter width")]
    InvalidParameterWidth,
    #[error("Invalid parameter height")]
    InvalidParameterHeight,
    #[error("Invalid parameter bits per sample")]
    InvalidParameterBitsPerSample,
    #[error("Invalid parameter component count")]
    InvalidParameterComponentCount,
    #[error("Invalid parameter interleave mode")]
    InvalidParameterInterleaveMode,
    #[error("Invalid parameter near lossless")]
    InvalidParameterNearLossless,
    #[error("Invalid parameter JPEG-LS preset parameters")]
    InvalidParameterJpeglsPresetParameters,
    #[error("Invalid parameter color transformation")]
    InvalidParameterColorTransformation,
    #[error("Invalid parameter mapping table ID")]
    InvalidParameterMappingTableId,
    #[error("Invalid parameter mapping table continuation")]
    InvalidParameterMappingTableContinuation,

    // Logic errors
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Invalid argument width")]
    InvalidArgumentWidth,
    #[error("Invalid argument height")]
    InvalidArgumentHeight,
    #[error("Invalid argument bits per sample")]
    InvalidArgumentBitsPerSample,
    #[error("Invalid argument component count")]
    InvalidArgumentComponentCount,
    #[error("Invalid argument interleave mode")]
    InvalidArgumentInterleaveMode,
    #[error("Invalid argument near lossless")]
    InvalidArgumentNearLossless,
    #[error("Invalid argument JPEG-LS PC parameters")]
    InvalidArgumentJpeglsPcParameters,
    #[error("Invalid argument color transformation")]
    InvalidArgumentColorTransformation,
    #[error("Invalid argument size")]
    InvalidArgumentSize,
    #[error("Invalid argument stride")]
    InvalidArgumentStride,
    #[error("Invalid argument encoding options")]
    InvalidArgumentEncodingOptions,
}
