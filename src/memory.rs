//! Byte addressed access to one memory bank of a device.
//!
//! A [`MemoryBank`] only describes a bank. Talking to it needs the device's
//! [`Link`] and, for the scratchpad families, its [`Scratchpad`]; a [`Bank`]
//! borrows the three together for the duration of a call sequence.

use crate::link::Cursor;
use crate::scratchpad::MAX_SCRATCHPAD;
use crate::{
    compute_partial_crc8, Bus, EpromCommands, Error, Exclusive, Flavor, Geometry, Link,
    MemoryCommands, Scratchpad,
};
use embedded_hal::delay::DelayNs;

/// How the contents of a bank reach the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankIo {
    /// The scratchpad itself; read and written with the scratchpad commands
    Scratchpad,
    /// Read memory command, writes staged through the scratchpad
    Eeprom(MemoryCommands),
    /// Byte programming with a pulse per byte, CRC8 on command and address
    Eprom(EpromCommands),
}

#[derive(Clone, Debug)]
pub struct MemoryBank {
    description: &'static str,
    geometry: Geometry,
    io: BankIo,
    write_verification: bool,
}

impl MemoryBank {
    pub const fn new(description: &'static str, geometry: Geometry, io: BankIo) -> Self {
        MemoryBank {
            description,
            geometry,
            io,
            write_verification: true,
        }
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn io(&self) -> BankIo {
        self.io
    }

    pub fn write_verification(&self) -> bool {
        self.write_verification
    }

    /// Turns the read-backs of [`Memory::write`] on or off.
    ///
    /// Without them a write-once bank silently ANDs the new data into what
    /// is already programmed.
    pub fn set_write_verification(&mut self, enabled: bool) {
        self.write_verification = enabled;
    }
}

/// Reads and writes at byte offsets inside a bank
pub trait Memory {
    fn geometry(&self) -> &Geometry;

    fn description(&self) -> &'static str;

    /// Fills `buf` from `address` on.
    ///
    /// With `continue_prior` no new command is sent and the bytes are clocked
    /// out where the previous read stopped; `address` must be exactly that
    /// point, and the bus has to be held with an [`Exclusive`] since then.
    /// Otherwise the read fails with [`Error::NotContinuous`] before any I/O.
    fn read<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<(), Error<B::Error>>;

    /// Writes `data` at `address`, one scratchpad row (or EPROM byte) at a time.
    ///
    /// Rows committed before a failure stay written.
    fn write<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        data: &[u8],
    ) -> Result<(), Error<B::Error>>;
}

/// A [`MemoryBank`] bound to its device
pub struct Bank<'a> {
    bank: &'a mut MemoryBank,
    link: &'a mut Link,
    pad: Option<&'a mut Scratchpad>,
}

impl<'a> Bank<'a> {
    pub fn new(bank: &'a mut MemoryBank, link: &'a mut Link, pad: Option<&'a mut Scratchpad>) -> Self {
        Bank { bank, link, pad }
    }

    pub fn bank(&self) -> &MemoryBank {
        &*self.bank
    }

    pub fn bank_mut(&mut self) -> &mut MemoryBank {
        &mut *self.bank
    }

    pub fn link(&mut self) -> &mut Link {
        &mut *self.link
    }

    pub fn scratchpad(&mut self) -> Option<&mut Scratchpad> {
        self.pad.as_deref_mut()
    }

    pub(crate) fn split(&mut self) -> Option<(&mut Link, &mut Scratchpad)> {
        let link = &mut *self.link;
        self.pad.as_deref_mut().map(|pad| (link, pad))
    }

    fn read_scratchpad_bank<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        buf: &mut [u8],
    ) -> Result<(), Error<B::Error>> {
        let pad = self.pad.as_deref_mut().ok_or(Error::NotSupport)?;
        let len = pad.length();
        let mut page = [0xFF; MAX_SCRATCHPAD];
        pad.read_scratchpad(self.link, bus, delay, &mut page[..len])?;
        buf.copy_from_slice(&page[address..address + buf.len()]);
        Ok(())
    }

    fn write_scratchpad_bank<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        data: &[u8],
    ) -> Result<(), Error<B::Error>> {
        let verify = self.bank.write_verification;
        let pad = self.pad.as_deref_mut().ok_or(Error::NotSupport)?;
        pad.write_scratchpad(self.link, bus, delay, address as u16, data)?;
        if verify {
            pad.verify_scratchpad(self.link, bus, delay, address as u16, data)?;
        }
        Ok(())
    }

    fn write_rows<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        data: &[u8],
        commands: MemoryCommands,
    ) -> Result<(), Error<B::Error>> {
        let geometry = self.bank.geometry;
        let verify = self.bank.write_verification;
        let pad = self.pad.as_deref_mut().ok_or(Error::NotSupport)?;
        let link = &mut *self.link;
        let row = pad.length();
        let whole_rows = pad.config().flavor == Flavor::Extended;
        // bits of a write-once bank only ever clear
        let and_in = geometry.is_write_once() && !verify;

        let mut written = 0;
        while written < data.len() {
            let target = geometry.start as usize + address + written;
            let row_start = target - target % row;
            let len = (row_start + row - target).min(data.len() - written);
            let chunk = &data[written..written + len];

            let (at, span) = if whole_rows && len != row {
                (row_start, row)
            } else {
                (target, len)
            };
            let mut merged = [0xFF; MAX_SCRATCHPAD];
            let bytes: &[u8] = if span != len || and_in {
                read_memory(
                    link,
                    bus,
                    delay,
                    commands.read_memory,
                    at as u16,
                    false,
                    &mut merged[..span],
                    false,
                )?;
                let slot = &mut merged[target - at..][..len];
                for (old, new) in slot.iter_mut().zip(chunk) {
                    *old = if and_in { *old & new } else { *new };
                }
                &merged[..span]
            } else {
                chunk
            };

            pad.write_scratchpad(link, bus, delay, at as u16, bytes)?;
            if verify {
                pad.verify_scratchpad(link, bus, delay, at as u16, bytes)?;
            }
            pad.copy_scratchpad(link, bus, delay, at as u16, bytes.len())?;

            if verify && geometry.is_write_once() {
                let mut back = [0u8; MAX_SCRATCHPAD];
                read_memory(
                    link,
                    bus,
                    delay,
                    commands.read_memory,
                    at as u16,
                    false,
                    &mut back[..bytes.len()],
                    false,
                )?;
                if let Some(i) = back.iter().zip(bytes).position(|(got, want)| got != want) {
                    return link.settle(Err(Error::VerifyMismatch {
                        address: (at + i) as u16,
                    }));
                }
            }
            written += len;
        }
        Ok(())
    }

    fn write_eprom<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        data: &[u8],
        commands: EpromCommands,
    ) -> Result<(), Error<B::Error>> {
        let start = self.bank.geometry.start as usize + address;
        let verify = self.bank.write_verification;
        for (i, byte) in data.iter().enumerate() {
            let target = (start + i) as u16;
            let result = program_byte(self.link, bus, delay, commands.write, target, *byte, verify);
            self.link.settle(result)?;
        }
        Ok(())
    }
}

impl Memory for Bank<'_> {
    fn geometry(&self) -> &Geometry {
        &self.bank.geometry
    }

    fn description(&self) -> &'static str {
        self.bank.description
    }

    fn read<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<(), Error<B::Error>> {
        let geometry = self.bank.geometry;
        geometry.check_range(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        let target = geometry.start + address as u16;
        match self.bank.io {
            // every scratchpad read starts with its own command
            BankIo::Scratchpad if continue_prior => Err(Error::NotContinuous),
            BankIo::Scratchpad => self.read_scratchpad_bank(bus, delay, address, buf),
            BankIo::Eeprom(commands) => read_memory(
                self.link,
                bus,
                delay,
                commands.read_memory,
                target,
                continue_prior,
                buf,
                false,
            ),
            BankIo::Eprom(commands) => read_memory(
                self.link,
                bus,
                delay,
                commands.read,
                target,
                continue_prior,
                buf,
                true,
            ),
        }
    }

    fn write<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        data: &[u8],
    ) -> Result<(), Error<B::Error>> {
        let geometry = self.bank.geometry;
        geometry.check_range(address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }
        if geometry.is_read_only() {
            return Err(Error::NotSupport);
        }
        if geometry.needs_power_delivery() && !bus.can_deliver_power() {
            return Err(Error::NoPowerDelivery);
        }
        if geometry.needs_program_pulse() && !bus.can_program() {
            return Err(Error::NoProgramPulse);
        }

        log::debug!(
            "{}: write {} {:04x} +{}",
            self.link.address(),
            self.bank.description,
            address,
            data.len()
        );
        let mut bus = Exclusive::begin(bus)?;
        match self.bank.io {
            BankIo::Scratchpad => self.write_scratchpad_bank(&mut *bus, delay, address, data),
            BankIo::Eeprom(commands) => self.write_rows(&mut *bus, delay, address, data, commands),
            BankIo::Eprom(commands) => self.write_eprom(&mut *bus, delay, address, data, commands),
        }
    }
}

/// Read memory transaction, or its continuation when `continue_prior` is set.
///
/// With `address_crc` the device answers the command and address with their
/// CRC8 before the data, as the EPROM parts do.
#[allow(clippy::too_many_arguments)]
pub(crate) fn read_memory<B: Bus>(
    link: &mut Link,
    bus: &mut B,
    delay: &mut impl DelayNs,
    cmd: u8,
    address: u16,
    continue_prior: bool,
    buf: &mut [u8],
    address_crc: bool,
) -> Result<(), Error<B::Error>> {
    if continue_prior
        && (!bus.is_exclusive() || link.cursor() != Some(Cursor::Plain(address)))
    {
        return Err(Error::NotContinuous);
    }
    let result = if continue_prior {
        bus.read_bytes(delay, buf)
    } else {
        send_read(link, bus, delay, cmd, address, buf, address_crc)
    };
    let result = link.settle(result);
    link.set_cursor(
        result
            .is_ok()
            .then(|| Cursor::Plain(address.wrapping_add(buf.len() as u16))),
    );
    result
}

fn send_read<B: Bus>(
    link: &mut Link,
    bus: &mut B,
    delay: &mut impl DelayNs,
    cmd: u8,
    address: u16,
    buf: &mut [u8],
    address_crc: bool,
) -> Result<(), Error<B::Error>> {
    let [lo, hi] = address.to_le_bytes();
    link.select(bus, delay)?;
    if address_crc {
        let mut raw = [cmd, lo, hi, 0xFF];
        bus.block(delay, &mut raw)?;
        let crc = compute_partial_crc8(0, &raw[..3]);
        if crc != raw[3] {
            return Err(Error::CrcMismatch(crc, raw[3]));
        }
    } else {
        bus.block(delay, &mut [cmd, lo, hi])?;
    }
    bus.read_bytes(delay, buf)?;
    log::trace!("read memory {:04x} {:02x?}", address, buf);
    Ok(())
}

/// One EPROM byte: command, address, data, CRC8 check, pulse, read back
fn program_byte<B: Bus>(
    link: &mut Link,
    bus: &mut B,
    delay: &mut impl DelayNs,
    cmd: u8,
    address: u16,
    byte: u8,
    verify: bool,
) -> Result<(), Error<B::Error>> {
    let [lo, hi] = address.to_le_bytes();
    link.select(bus, delay)?;
    let mut raw = [cmd, lo, hi, byte, 0xFF];
    bus.block(delay, &mut raw)?;
    let crc = compute_partial_crc8(0, &raw[..4]);
    if crc != raw[4] {
        return Err(Error::CrcMismatch(crc, raw[4]));
    }
    bus.program_pulse(delay)?;
    let programmed = bus.read_byte(delay)?;
    log::trace!("program {:04x} {:02x} -> {:02x}", address, byte, programmed);
    if verify && programmed != byte {
        return Err(Error::VerifyMismatch { address });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{Clock, Event, Sim};
    use crate::{Access, Capabilities, CopyMode, ErrorKind, ScratchpadConfig};
    use proptest::prelude::*;

    const CRC32: ScratchpadConfig = ScratchpadConfig::new(
        MemoryCommands::EEPROM,
        Flavor::Crc,
        32,
        CopyMode::Powered { delay_ms: 5 },
    );

    const EXT8: ScratchpadConfig = ScratchpadConfig::new(
        MemoryCommands::EEPROM,
        Flavor::Extended,
        8,
        CopyMode::Powered { delay_ms: 10 },
    );

    const MAIN: Geometry = Geometry::paged(
        0,
        16,
        32,
        Access::ReadWrite,
        Capabilities::GENERAL_PURPOSE
            .union(Capabilities::NON_VOLATILE)
            .union(Capabilities::POWER_DELIVERY),
    );

    const EPROM: Geometry = Geometry::paged(
        0,
        4,
        32,
        Access::WriteOnce,
        Capabilities::GENERAL_PURPOSE
            .union(Capabilities::NON_VOLATILE)
            .union(Capabilities::PROGRAM_PULSE),
    );

    struct Part {
        bank: MemoryBank,
        link: Link,
        pad: Option<Scratchpad>,
    }

    impl Part {
        fn new(sim: &Sim, bank: MemoryBank, pad: Option<ScratchpadConfig>) -> Self {
            Part {
                bank,
                link: Link::new(sim.address),
                pad: pad.map(Scratchpad::new),
            }
        }

        fn bank(&mut self) -> Bank<'_> {
            Bank::new(&mut self.bank, &mut self.link, self.pad.as_mut())
        }
    }

    fn eeprom() -> (Sim, Part) {
        let sim = Sim::eeprom(512, 32, true, true);
        let part = Part::new(
            &sim,
            MemoryBank::new("Main memory", MAIN, BankIo::Eeprom(MemoryCommands::EEPROM)),
            Some(CRC32),
        );
        (sim, part)
    }

    fn transactions(sim: &mut Sim) -> Vec<Event> {
        sim.events()
            .iter()
            .filter(|e| **e != Event::Select)
            .cloned()
            .collect()
    }

    #[test]
    fn page_write_is_one_cycle() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();
        let data: [u8; 32] = core::array::from_fn(|i| (i * 3) as u8);

        part.bank().write(&mut sim, &mut clock, 0, &data).unwrap();
        assert_eq!(
            transactions(&mut sim),
            [
                Event::WriteScratchpad { address: 0, len: 32 },
                Event::ReadScratchpad,
                Event::Copy { address: 0, es: 31 },
            ]
        );
        assert_eq!(&sim.memory[..32], &data);
        assert_eq!(sim.exclusive, 0);
        assert_eq!(sim.max_exclusive, 1);
    }

    #[test]
    fn write_across_rows() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 0, &[0x11; 40]).unwrap();
        let copies: Vec<_> = transactions(&mut sim)
            .into_iter()
            .filter(|e| matches!(e, Event::Copy { .. }))
            .collect();
        assert_eq!(
            copies,
            [
                Event::Copy { address: 0, es: 31 },
                Event::Copy { address: 32, es: 7 },
            ]
        );
        assert_eq!(&sim.memory[..40], &[0x11; 40]);
        assert_eq!(sim.memory[40], 0xFF);
    }

    #[test]
    fn unaligned_write_starts_mid_row() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 60, &[1, 2, 3, 4, 5, 6]).unwrap();
        let events = transactions(&mut sim);
        assert!(events.contains(&Event::Copy { address: 60, es: 31 }));
        assert!(events.contains(&Event::Copy { address: 64, es: 1 }));
        assert_eq!(&sim.memory[60..66], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn copy_failure_marks_link() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();

        sim.copy_status = Some(0x30);
        let err = part.bank().write(&mut sim, &mut clock, 0, &[0; 8]).unwrap_err();
        assert_eq!(err, Error::CopyFailed(0x30));
        assert!(part.link.force_verify());
        assert_eq!(sim.exclusive, 0);

        sim.copy_status = None;
        part.bank().write(&mut sim, &mut clock, 0, &[0; 8]).unwrap();
        assert!(!part.link.force_verify());
        assert_eq!(&sim.memory[..8], &[0; 8]);
    }

    #[test]
    fn failure_keeps_committed_rows() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();

        // write, read back and copy of the first row, then the bus drops out
        sim.fail_select = Some(4);
        let err = part.bank().write(&mut sim, &mut clock, 0, &[0x42; 40]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(&sim.memory[..32], &[0x42; 32]);
        assert_eq!(&sim.memory[32..40], &[0xFF; 8]);
        assert!(part.link.force_verify());
        assert_eq!(sim.exclusive, 0);
    }

    #[test]
    fn out_of_range_rejected_before_io() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();

        let mut buf = [0; 4];
        assert_eq!(
            part.bank().read(&mut sim, &mut clock, 510, false, &mut buf),
            Err(Error::OutOfBounds)
        );
        assert_eq!(
            part.bank().write(&mut sim, &mut clock, 500, &[0; 13]),
            Err(Error::OutOfBounds)
        );
        assert_eq!(sim.selects, 0);
        assert!(!part.link.force_verify());
    }

    #[test]
    fn power_checked_before_io() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();
        sim.can_power = false;

        assert_eq!(
            part.bank().write(&mut sim, &mut clock, 0, &[1]),
            Err(Error::NoPowerDelivery)
        );
        assert_eq!(sim.selects, 0);
        assert_eq!(sim.max_exclusive, 0);
    }

    #[test]
    fn read_only_bank() {
        let mut sim = Sim::eeprom(512, 32, true, true);
        let geometry = Geometry::paged(0, 16, 32, Access::ReadOnly, Capabilities::NON_VOLATILE);
        let mut part = Part::new(
            &sim,
            MemoryBank::new("ROM", geometry, BankIo::Eeprom(MemoryCommands::EEPROM)),
            Some(CRC32),
        );
        let mut clock = Clock::default();
        assert_eq!(
            part.bank().write(&mut sim, &mut clock, 0, &[1]),
            Err(Error::NotSupport)
        );
    }

    #[test]
    fn continued_read() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();
        for (i, byte) in sim.memory.iter_mut().enumerate() {
            *byte = i as u8;
        }

        let mut bank = part.bank();
        let mut bus = Exclusive::begin(&mut sim).unwrap();
        let mut head = [0; 16];
        let mut tail = [0; 16];
        bank.read(&mut *bus, &mut clock, 16, false, &mut head).unwrap();
        bank.read(&mut *bus, &mut clock, 32, true, &mut tail).unwrap();
        assert_eq!(
            bank.read(&mut *bus, &mut clock, 0, true, &mut tail),
            Err(Error::NotContinuous)
        );
        drop(bus);

        assert_eq!(head[0], 16);
        assert_eq!(tail[15], 47);
        let reads = transactions(&mut sim)
            .into_iter()
            .filter(|e| matches!(e, Event::ReadMemory { .. }))
            .count();
        assert_eq!(reads, 1);
    }

    #[test]
    fn continued_read_needs_exclusive() {
        let (mut sim, mut part) = eeprom();
        let mut clock = Clock::default();

        let mut buf = [0; 8];
        part.bank().read(&mut sim, &mut clock, 0, false, &mut buf).unwrap();
        assert_eq!(
            part.bank().read(&mut sim, &mut clock, 8, true, &mut buf),
            Err(Error::NotContinuous)
        );
        assert_eq!(sim.selects, 1);
        assert!(!part.link.force_verify());
    }

    #[test]
    fn extended_partial_row_is_merged() {
        let mut sim = Sim::eeprom(32, 8, true, true);
        for (i, byte) in sim.memory.iter_mut().enumerate() {
            *byte = i as u8;
        }
        let geometry = Geometry::paged(
            0,
            1,
            32,
            Access::ReadWrite,
            Capabilities::GENERAL_PURPOSE
                .union(Capabilities::NON_VOLATILE)
                .union(Capabilities::POWER_DELIVERY),
        );
        let mut part = Part::new(
            &sim,
            MemoryBank::new("Data memory", geometry, BankIo::Eeprom(MemoryCommands::EEPROM)),
            Some(EXT8),
        );
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 10, &[0xA0, 0xA1, 0xA2]).unwrap();
        assert_eq!(
            transactions(&mut sim),
            [
                Event::ReadMemory { address: 8 },
                Event::WriteScratchpad { address: 8, len: 8 },
                Event::ReadScratchpad,
                Event::Copy { address: 8, es: 7 },
            ]
        );
        assert_eq!(&sim.memory[8..16], &[8, 9, 0xA0, 0xA1, 0xA2, 13, 14, 15]);
    }

    #[test]
    fn write_once_eeprom_ands_without_verification() {
        let mut sim = Sim::eeprom(512, 32, true, true);
        sim.write_once = vec![true; 512];
        let geometry = Geometry::paged(0, 16, 32, Access::WriteOnce, MAIN.capabilities);
        let mut part = Part::new(
            &sim,
            MemoryBank::new("OTP", geometry, BankIo::Eeprom(MemoryCommands::EEPROM)),
            Some(CRC32),
        );
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 0, &[0xF0]).unwrap();
        assert_eq!(
            part.bank().write(&mut sim, &mut clock, 0, &[0x0F]),
            Err(Error::VerifyMismatch { address: 0 })
        );
        assert!(part.link.force_verify());

        part.bank.set_write_verification(false);
        part.bank().write(&mut sim, &mut clock, 1, &[0xF0]).unwrap();
        part.bank().write(&mut sim, &mut clock, 1, &[0x0F]).unwrap();
        assert_eq!(sim.memory[1], 0x00);
    }

    fn write_once_eeprom() -> (Sim, Part) {
        let sim = Sim::eeprom(512, 32, true, true);
        let geometry = Geometry::paged(0, 16, 32, Access::WriteOnce, MAIN.capabilities);
        let mut part = Part::new(
            &sim,
            MemoryBank::new("OTP", geometry, BankIo::Eeprom(MemoryCommands::EEPROM)),
            Some(CRC32),
        );
        part.bank.set_write_verification(false);
        (sim, part)
    }

    #[test]
    fn write_once_eeprom_merges_before_staging() {
        let (mut sim, mut part) = write_once_eeprom();
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 1, &[0xF0]).unwrap();
        sim.clear_events();
        part.bank().write(&mut sim, &mut clock, 1, &[0x0F, 0x3C]).unwrap();
        assert_eq!(
            transactions(&mut sim),
            [
                Event::ReadMemory { address: 1 },
                Event::WriteScratchpad { address: 1, len: 2 },
                Event::Copy { address: 1, es: 2 },
            ]
        );
        assert_eq!(&sim.memory[..4], &[0xFF, 0x00, 0x3C, 0xFF]);
    }

    #[test]
    fn scratchpad_bank() {
        let mut sim = Sim::eeprom(512, 32, true, true);
        let geometry = Geometry::paged(0, 1, 32, Access::ReadWrite, Capabilities::PAGE_AUTO_CRC)
            .with_extra_info(3);
        let mut part = Part::new(
            &sim,
            MemoryBank::new("Scratchpad", geometry, BankIo::Scratchpad),
            Some(CRC32),
        );
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 4, &[1, 2, 3]).unwrap();
        let mut buf = [0; 3];
        part.bank().read(&mut sim, &mut clock, 4, false, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(&sim.memory[4..7], &[0xFF; 3]);

        let selects = sim.selects;
        let mut bus = Exclusive::begin(&mut sim).unwrap();
        assert_eq!(
            part.bank().read(&mut *bus, &mut clock, 7, true, &mut buf),
            Err(Error::NotContinuous)
        );
        drop(bus);
        assert_eq!(sim.selects, selects);
    }

    fn eprom() -> (Sim, Part) {
        let sim = Sim::eprom(128, 8);
        let part = Part::new(
            &sim,
            MemoryBank::new("Main memory", EPROM, BankIo::Eprom(EpromCommands::DATA)),
            None,
        );
        (sim, part)
    }

    #[test]
    fn eprom_program_and_read() {
        let (mut sim, mut part) = eprom();
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 5, &[0x12, 0x34, 0x56]).unwrap();
        assert_eq!(
            transactions(&mut sim),
            [
                Event::Program { address: 5 },
                Event::Program { address: 6 },
                Event::Program { address: 7 },
            ]
        );

        let mut buf = [0; 4];
        part.bank().read(&mut sim, &mut clock, 4, false, &mut buf).unwrap();
        assert_eq!(buf, [0xFF, 0x12, 0x34, 0x56]);
    }

    #[test]
    fn eprom_crc_stops_before_pulse() {
        let (mut sim, mut part) = eprom();
        let mut clock = Clock::default();

        sim.corrupt_crc = true;
        let err = part.bank().write(&mut sim, &mut clock, 0, &[0x00]).unwrap_err();
        assert!(matches!(err, Error::CrcMismatch(..)));
        assert_eq!(sim.memory[0], 0xFF);
        assert!(part.link.force_verify());
        assert!(!transactions(&mut sim)
            .iter()
            .any(|e| matches!(e, Event::Program { .. })));
    }

    #[test]
    fn eprom_needs_program_pulse() {
        let (mut sim, mut part) = eprom();
        let mut clock = Clock::default();
        sim.can_program = false;

        assert_eq!(
            part.bank().write(&mut sim, &mut clock, 0, &[0x00]),
            Err(Error::NoProgramPulse)
        );
        assert_eq!(sim.selects, 0);
    }

    #[test]
    fn eprom_cannot_set_bits() {
        let (mut sim, mut part) = eprom();
        let mut clock = Clock::default();

        part.bank().write(&mut sim, &mut clock, 0, &[0x0F]).unwrap();
        assert_eq!(
            part.bank().write(&mut sim, &mut clock, 0, &[0xF0]),
            Err(Error::VerifyMismatch { address: 0 })
        );
        assert_eq!(sim.memory[0], 0x00);
    }

    proptest! {
        #[test]
        fn written_data_reads_back(address in 0usize..480, data in prop::collection::vec(any::<u8>(), 1..32)) {
            let (mut sim, mut part) = eeprom();
            let mut clock = Clock::default();

            part.bank().write(&mut sim, &mut clock, address, &data).unwrap();
            let mut back = vec![0; data.len()];
            part.bank().read(&mut sim, &mut clock, address, false, &mut back).unwrap();
            prop_assert_eq!(back, data);
            prop_assert_eq!(sim.exclusive, 0);
        }

        #[test]
        fn write_once_keeps_cleared_bits(
            address in 0usize..96,
            pairs in prop::collection::vec(any::<(u8, u8)>(), 1..32),
        ) {
            let first: Vec<u8> = pairs.iter().map(|p| p.0).collect();
            let second: Vec<u8> = pairs.iter().map(|p| p.1).collect();
            let expected: Vec<u8> = pairs.iter().map(|p| p.0 & p.1).collect();

            let (eeprom_sim, eeprom_part) = write_once_eeprom();
            let (eprom_sim, mut eprom_part) = eprom();
            eprom_part.bank.set_write_verification(false);

            for (mut sim, mut part) in [(eeprom_sim, eeprom_part), (eprom_sim, eprom_part)] {
                let mut clock = Clock::default();
                part.bank().write(&mut sim, &mut clock, address, &first).unwrap();
                part.bank().write(&mut sim, &mut clock, address, &second).unwrap();

                let mut back = vec![0; pairs.len()];
                part.bank().read(&mut sim, &mut clock, address, false, &mut back).unwrap();
                prop_assert_eq!(&back, &expected);
                prop_assert_eq!(&sim.memory[address..address + pairs.len()], &expected[..]);
            }
        }
    }
}
