use crate::{
    Access, Address, Bank, BankIo, Capabilities, CopyMode, Device, ExtraInfo, Flavor, Geometry,
    Link, MemoryBank, MemoryCommands, Scratchpad, ScratchpadConfig,
};

/// 4Kb EEPROM, 16 pages of 32 bytes behind a 32 byte scratchpad.
///
/// The copy needs a strong pullup for 5 ms after the E/S byte.
#[derive(Debug)]
pub struct Ds2433 {
    link: Link,
    pad: Scratchpad,
    scratchpad: MemoryBank,
    memory: MemoryBank,
}

impl From<Ds2433> for Address {
    fn from(device: Ds2433) -> Self {
        *device.link.address()
    }
}

impl Ds2433 {
    pub const SCRATCHPAD: ScratchpadConfig = ScratchpadConfig::new(
        MemoryCommands::EEPROM,
        Flavor::Plain,
        32,
        CopyMode::Powered { delay_ms: 5 },
    );

    pub const SCRATCHPAD_BANK: Geometry =
        Geometry::paged(0x0000, 1, 32, Access::ReadWrite, Capabilities::empty())
            .with_extra_info(ExtraInfo::LEN);

    pub const MEMORY: Geometry = Geometry::paged(
        0x0000,
        16,
        32,
        Access::ReadWrite,
        Capabilities::GENERAL_PURPOSE
            .union(Capabilities::NON_VOLATILE)
            .union(Capabilities::POWER_DELIVERY),
    );

    pub fn link(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn scratchpad(&mut self) -> Bank<'_> {
        Bank::new(&mut self.scratchpad, &mut self.link, Some(&mut self.pad))
    }

    pub fn memory(&mut self) -> Bank<'_> {
        Bank::new(&mut self.memory, &mut self.link, Some(&mut self.pad))
    }
}

impl Device for Ds2433 {
    const FAMILY_CODE: u8 = 0x23;
    const NAME: &'static str = "DS2433";
    const DESCRIPTION: &'static str = "4096 bit EEPROM organized as sixteen pages of 256 bits";

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
        }
    }
}
