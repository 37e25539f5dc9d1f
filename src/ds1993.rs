use crate::{
    Access, Address, Bank, BankIo, Capabilities, CopyMode, Device, ExtraInfo, Flavor, Geometry,
    Link, MemoryBank, MemoryCommands, Scratchpad, ScratchpadConfig,
};

/// 4Kb NV RAM iButton
#[derive(Debug)]
pub struct Ds1993 {
    link: Link,
    pad: Scratchpad,
    scratchpad: MemoryBank,
    memory: MemoryBank,
}

impl From<Ds1993> for Address {
    fn from(device: Ds1993) -> Self {
        *device.link.address()
    }
}

impl Ds1993 {
    pub const SCRATCHPAD: ScratchpadConfig =
        ScratchpadConfig::new(MemoryCommands::EEPROM, Flavor::Plain, 32, CopyMode::Echo);

    pub const SCRATCHPAD_BANK: Geometry =
        Geometry::paged(0x0000, 1, 32, Access::ReadWrite, Capabilities::empty())
            .with_extra_info(ExtraInfo::LEN);

    pub const MEMORY: Geometry = Geometry::paged(
        0x0000,
        16,
        32,
        Access::ReadWrite,
        Capabilities::GENERAL_PURPOSE.union(Capabilities::NON_VOLATILE),
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

impl Device for Ds1993 {
    const FAMILY_CODE: u8 = 0x06;
    const NAME: &'static str = "DS1993";
    const DESCRIPTION: &'static str =
        "4096 bit read/write nonvolatile memory partitioned into sixteen pages of 256 bits";

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
