use crate::{
    Access, Address, Bank, BankIo, Capabilities, CopyMode, Device, ExtraInfo, Flavor, Geometry,
    Link, LockScheme, MemoryBank, MemoryCommands, OtpBank, OtpLayout, Scratchpad,
    ScratchpadConfig, EEPROM_WRITE_PROTECT,
};

/// 1Kb protected EEPROM.
///
/// Four pages of 32 bytes, written in 8 byte rows through an 8 byte
/// scratchpad. Registers at 0x80..0x87 hold a protection byte per page;
/// writing 0x55 there locks the page for good.
#[derive(Debug)]
pub struct Ds2431 {
    link: Link,
    pad: Scratchpad,
    scratchpad: MemoryBank,
    memory: MemoryBank,
    registers: MemoryBank,
}

impl From<Ds2431> for Address {
    fn from(device: Ds2431) -> Self {
        *device.link.address()
    }
}

impl Ds2431 {
    pub const SCRATCHPAD: ScratchpadConfig = ScratchpadConfig::new(
        MemoryCommands::EEPROM,
        Flavor::Extended,
        8,
        CopyMode::Powered { delay_ms: 10 },
    );

    pub const SCRATCHPAD_BANK: Geometry =
        Geometry::paged(0x0000, 1, 8, Access::ReadWrite, Capabilities::PAGE_AUTO_CRC)
            .with_extra_info(ExtraInfo::LEN);

    pub const MEMORY: Geometry = Geometry::paged(
        0x0000,
        4,
        32,
        Access::ReadWrite,
        Capabilities::GENERAL_PURPOSE
            .union(Capabilities::NON_VOLATILE)
            .union(Capabilities::POWER_DELIVERY),
    );

    pub const REGISTERS: Geometry = Geometry::paged(
        0x0080,
        1,
        8,
        Access::ReadWrite,
        Capabilities::NON_VOLATILE.union(Capabilities::POWER_DELIVERY),
    );

    pub const OTP: OtpLayout = OtpLayout {
        lock: Some(LockScheme::Byte {
            base: 0,
            locked: EEPROM_WRITE_PROTECT,
        }),
        redirect: None,
        redirect_lock: None,
    };

    pub fn link(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn scratchpad(&mut self) -> Bank<'_> {
        Bank::new(&mut self.scratchpad, &mut self.link, Some(&mut self.pad))
    }

    pub fn memory(&mut self) -> Bank<'_> {
        Bank::new(&mut self.memory, &mut self.link, Some(&mut self.pad))
    }

    pub fn registers(&mut self) -> Bank<'_> {
        Bank::new(&mut self.registers, &mut self.link, Some(&mut self.pad))
    }

    /// Main memory with page write protection
    pub fn otp(&mut self) -> OtpBank<'_> {
        OtpBank::new(
            &mut self.memory,
            &mut self.registers,
            Self::OTP,
            &mut self.link,
            Some(&mut self.pad),
        )
    }
}

impl Device for Ds2431 {
    const FAMILY_CODE: u8 = 0x2D;
    const NAME: &'static str = "DS2431";
    const DESCRIPTION: &'static str =
        "1024 bit EEPROM in four pages of 256 bits with 64 bit scratchpad and page write protection";

    fn address(&self) -> &Address {
        self.link.address()
    }

    unsafe fn from_address_unchecked(address: Address) -> Self {
        Self {
            link: Link::new(address),
            pad: Scratchpad::new(Self::SCRATCHPAD),
            scratchpad: MemoryBank::new("Scratchpad", Self::SCRATCHPAD_BANK, BankIo::Scratchpad),
            memory: MemoryBank::new(
                "Main memory",
                Self::MEMORY,
                BankIo::Eeprom(MemoryCommands::EEPROM),
            ),
            registers: MemoryBank::new(
                "Protection registers",
                Self::REGISTERS,
                BankIo::Eeprom(MemoryCommands::EEPROM),
            ),
        }
    }
}
