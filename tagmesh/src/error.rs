use core::fmt;

/// Errors returned by the node's core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Unexpectedly reached the end of a buffer while reading or writing data.
    ///
    /// This is returned when a frame doesn't fit into its bounded payload buffer, and also when
    /// reaching EOF prematurely while reading data from a buffer.
    Eof,

    /// A message payload was shorter than its fixed wire layout requires.
    InvalidLength,

    /// Invalid value supplied for a field.
    InvalidValue,

    /// The backing storage handed to the dedup set cannot hold the requested layout.
    StorageTooSmall,

    /// A configured parameter is outside its permitted range.
    InvalidConfig,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::Eof => "end of buffer",
            Error::InvalidLength => "payload shorter than wire layout",
            Error::InvalidValue => "invalid value for field",
            Error::StorageTooSmall => "backing storage too small",
            Error::InvalidConfig => "configured parameter out of range",
        })
    }
}
