use core::fmt::{self, Debug, Display, Formatter};

/// Error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E: Sized + Debug> {
    /// Wire not high
    WireFault,
    /// No presence on wire
    NoPresence,
    PortError(E),

    /// CRC8 computed vs received
    CrcMismatch(u8, u8),
    /// CRC16 register value after the frame (expected [`crate::CRC16_RESIDUE`])
    Crc16Mismatch(u16),
    /// Copy scratchpad returned an unexpected status byte
    CopyFailed(u8),
    /// Data read back does not match data written
    VerifyMismatch { address: u16 },
    /// Scratchpad answered with inconsistent address or ending offset
    InvalidFrame,
    /// Packet length byte out of range
    InvalidPacket(u8),

    NotSupport,
    FamilyCodeMismatch(u8, u8),
    /// Address range exceeds the bank
    OutOfBounds,
    PageOutOfRange(usize),
    /// Data does not fit the scratchpad or packet
    TooLong,
    /// Scratchpad requires whole row writes
    Unaligned,
    /// Copy requested without matching staged scratchpad data
    NotStaged,
    /// Continued read does not follow the previous one
    NotContinuous,
    NoPowerDelivery,
    NoProgramPulse,
    PageLocked(usize),
    /// Lock and redirect transitions cannot be undone
    Irreversible,
}

/// Coarse classification of [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Device absent or the port failed
    Transport,
    /// Data arrived but failed a CRC, status or read-back check
    Integrity,
    /// Request rejected before any bus traffic
    Capability,
}

impl<E: Sized + Debug> Error<E> {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::WireFault | Error::NoPresence | Error::PortError(_) => ErrorKind::Transport,
            Error::CrcMismatch(..)
            | Error::Crc16Mismatch(_)
            | Error::CopyFailed(_)
            | Error::VerifyMismatch { .. }
            | Error::InvalidFrame
            | Error::InvalidPacket(_) => ErrorKind::Integrity,
            _ => ErrorKind::Capability,
        }
    }

    /// Whether the bus may have been left in an unknown selection state
    pub fn needs_verify(&self) -> bool {
        self.kind() != ErrorKind::Capability
    }
}

impl<E: Sized + Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::PortError(e)
    }
}

impl<E: Sized + Debug> Display for Error<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::WireFault => write!(f, "wire is held low"),
            Error::NoPresence => write!(f, "no presence pulse"),
            Error::PortError(e) => write!(f, "port error: {:?}", e),
            Error::CrcMismatch(computed, received) => write!(
                f,
                "CRC8 mismatch: computed 0x{:02X}, received 0x{:02X}",
                computed, received
            ),
            Error::Crc16Mismatch(residue) => {
                write!(f, "CRC16 mismatch: residue 0x{:04X}", residue)
            }
            Error::CopyFailed(status) => {
                write!(f, "copy scratchpad failed: status 0x{:02X}", status)
            }
            Error::VerifyMismatch { address } => {
                write!(f, "read back mismatch at 0x{:04X}", address)
            }
            Error::InvalidFrame => write!(f, "inconsistent scratchpad frame"),
            Error::InvalidPacket(len) => write!(f, "invalid packet length {}", len),
            Error::NotSupport => write!(f, "operation not supported"),
            Error::FamilyCodeMismatch(expected, got) => write!(
                f,
                "family code mismatch: expected 0x{:02X}, got 0x{:02X}",
                expected, got
            ),
            Error::OutOfBounds => write!(f, "address out of bounds"),
            Error::PageOutOfRange(page) => write!(f, "page {} out of range", page),
            Error::TooLong => write!(f, "data too long"),
            Error::Unaligned => write!(f, "scratchpad write not row aligned"),
            Error::NotStaged => write!(f, "no staged scratchpad data to copy"),
            Error::NotContinuous => write!(f, "read does not continue the previous one"),
            Error::NoPowerDelivery => write!(f, "bus cannot deliver strong pullup"),
            Error::NoProgramPulse => write!(f, "bus cannot deliver program pulse"),
            Error::PageLocked(page) => write!(f, "page {} is locked", page),
            Error::Irreversible => write!(f, "lock or redirect cannot be undone"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: Sized + Debug> std::error::Error for Error<E> {}
