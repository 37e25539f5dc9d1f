use crate::{
    Access, Address, Bank, BankIo, Capabilities, Device, EpromCommands, Geometry, Link,
    LockScheme, MemoryBank, OtpBank, OtpLayout, RedirectScheme,
};

/// 1Kb add-only memory.
///
/// Bits are programmed from 1 to 0 with a 12 V pulse, one byte per
/// transaction. The status memory carries a write protect bit per page in
/// byte 0 and the redirection bytes in bytes 1..4.
#[derive(Debug)]
pub struct Ds2502 {
    link: Link,
    memory: MemoryBank,
    status: MemoryBank,
}

impl From<Ds2502> for Address {
    fn from(device: Ds2502) -> Self {
        *device.link.address()
    }
}

impl Ds2502 {
    pub const MEMORY: Geometry = Geometry::paged(
        0x0000,
        4,
        32,
        Access::WriteOnce,
        Capabilities::GENERAL_PURPOSE
            .union(Capabilities::NON_VOLATILE)
            .union(Capabilities::PROGRAM_PULSE),
    );

    pub const STATUS: Geometry = Geometry::paged(
        0x0000,
        1,
        8,
        Access::WriteOnce,
        Capabilities::NON_VOLATILE.union(Capabilities::PROGRAM_PULSE),
    );

    pub const OTP: OtpLayout = OtpLayout {
        lock: Some(LockScheme::Bit { base: 0 }),
        redirect: Some(RedirectScheme { base: 1 }),
        redirect_lock: None,
    };

    pub fn link(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn memory(&mut self) -> Bank<'_> {
        Bank::new(&mut self.memory, &mut self.link, None)
    }

    pub fn status(&mut self) -> Bank<'_> {
        Bank::new(&mut self.status, &mut self.link, None)
    }

    pub fn otp(&mut self) -> OtpBank<'_> {
        OtpBank::new(
            &mut self.memory,
            &mut self.status,
            Self::OTP,
            &mut self.link,
            None,
        )
    }
}

impl Device for Ds2502 {
    const FAMILY_CODE: u8 = 0x09;
    const NAME: &'static str = "DS2502";
    const DESCRIPTION: &'static str =
        "1024 bit EPROM in four pages of 256 bits with page write protection and redirection";

    fn address(&self) -> &Address {
        self.link.address()
    }

    unsafe fn from_address_unchecked(address: Address) -> Self {
        Self {
            link: Link::new(address),
            memory: MemoryBank::new(
                "Write-once memory",
                Self::MEMORY,
                BankIo::Eprom(EpromCommands::DATA),
            ),
            status: MemoryBank::new(
                "Status memory",
                Self::STATUS,
                BankIo::Eprom(EpromCommands::STATUS),
            ),
        }
    }
}
