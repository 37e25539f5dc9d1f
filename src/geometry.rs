use bitflags::bitflags;

/// Longest page any bank may have
pub const MAX_PAGE_LENGTH: usize = 32;

/// How a bank's contents may change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    /// Bits can only be cleared; a write ANDs into the existing contents
    WriteOnce,
    ReadOnly,
}

bitflags! {
    /// Properties of a memory bank besides its access mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        /// Free for application data
        const GENERAL_PURPOSE    = 1 << 0;
        /// Survives power loss
        const NON_VOLATILE       = 1 << 1;
        /// Device appends a CRC16 to every page it sends
        const PAGE_AUTO_CRC      = 1 << 2;
        /// Writes need an EPROM programming pulse
        const PROGRAM_PULSE      = 1 << 3;
        /// Writes need a strong pullup during the copy
        const POWER_DELIVERY     = 1 << 4;
    }
}

/// Fixed layout of one bank, set when the device is assembled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    /// Bank size in bytes
    pub size: usize,
    pub page_length: usize,
    /// Device address of the first byte of the bank
    pub start: u16,
    pub pages: usize,
    /// Payload bytes of a page packet: page minus length byte and CRC16
    pub max_packet_len: usize,
    pub extra_info_len: usize,
    pub access: Access,
    pub capabilities: Capabilities,
}

impl Geometry {
    pub const fn paged(
        start: u16,
        pages: usize,
        page_length: usize,
        access: Access,
        capabilities: Capabilities,
    ) -> Self {
        assert!(pages > 0 && page_length > 3 && page_length <= MAX_PAGE_LENGTH);
        Geometry {
            size: pages * page_length,
            page_length,
            start,
            pages,
            max_packet_len: page_length - 3,
            extra_info_len: 0,
            access,
            capabilities,
        }
    }

    pub const fn with_extra_info(mut self, len: usize) -> Self {
        self.extra_info_len = len;
        self
    }

    pub fn is_read_write(&self) -> bool {
        self.access == Access::ReadWrite
    }

    pub fn is_write_once(&self) -> bool {
        self.access == Access::WriteOnce
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    pub fn is_general_purpose(&self) -> bool {
        self.capabilities.contains(Capabilities::GENERAL_PURPOSE)
    }

    pub fn is_non_volatile(&self) -> bool {
        self.capabilities.contains(Capabilities::NON_VOLATILE)
    }

    pub fn has_page_auto_crc(&self) -> bool {
        self.capabilities.contains(Capabilities::PAGE_AUTO_CRC)
    }

    pub fn needs_program_pulse(&self) -> bool {
        self.capabilities.contains(Capabilities::PROGRAM_PULSE)
    }

    pub fn needs_power_delivery(&self) -> bool {
        self.capabilities.contains(Capabilities::POWER_DELIVERY)
    }

    /// Device address of `page`
    pub fn page_address(&self, page: usize) -> u16 {
        self.start + (page * self.page_length) as u16
    }

    pub(crate) fn check_range<E: core::fmt::Debug>(
        &self,
        address: usize,
        len: usize,
    ) -> Result<(), crate::Error<E>> {
        if address.checked_add(len).map_or(true, |end| end > self.size) {
            Err(crate::Error::OutOfBounds)
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_page<E: core::fmt::Debug>(&self, page: usize) -> Result<(), crate::Error<E>> {
        if page >= self.pages {
            Err(crate::Error::PageOutOfRange(page))
        } else {
            Ok(())
        }
    }
}
