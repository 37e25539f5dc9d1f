//! Scratchpad write / verify / copy protocol of the EEPROM families.
//!
//! Data is first staged in the device's volatile scratchpad, optionally read
//! back, and only then committed to the addressed row by the copy command.

use crate::{
    compute_crc16, crc16_frame_valid, Bus, Error, Link, MemoryCommands, PowerCondition,
};
use byteorder::{ByteOrder, LittleEndian};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// Largest scratchpad handled; the ending offset must leave bits 5..7 of
/// the E/S byte for status flags.
pub const MAX_SCRATCHPAD: usize = 32;

/// Command, two address bytes, E/S, scratchpad, CRC16
type Frame = heapless::Vec<u8, { MAX_SCRATCHPAD + 6 }>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flavor {
    /// No CRC anywhere
    Plain,
    /// CRC16 on read scratchpad and on writes that end at the scratchpad end
    Crc,
    /// Like `Crc`, but the device only copies whole scratchpad rows
    Extended,
}

impl Flavor {
    pub fn has_crc(&self) -> bool {
        !matches!(self, Flavor::Plain)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyMode {
    /// Strong pullup after the E/S byte for the device's internal write
    /// cycle, then one status byte is read
    Powered { delay_ms: u32 },
    /// Status is clocked out right behind the E/S byte
    Echo,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScratchpadConfig {
    pub commands: MemoryCommands,
    pub flavor: Flavor,
    pub length: usize,
    pub copy: CopyMode,
}

impl ScratchpadConfig {
    pub const fn new(
        commands: MemoryCommands,
        flavor: Flavor,
        length: usize,
        copy: CopyMode,
    ) -> Self {
        assert!(length.is_power_of_two() && length <= MAX_SCRATCHPAD);
        ScratchpadConfig {
            commands,
            flavor,
            length,
            copy,
        }
    }

    pub const fn needs_power_delivery(&self) -> bool {
        matches!(self.copy, CopyMode::Powered { .. })
    }
}

/// Target address and E/S byte reported by read scratchpad
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtraInfo {
    pub address: u16,
    pub ending_offset: u8,
    /// High bits of the E/S byte
    pub status: u8,
}

impl ExtraInfo {
    pub const LEN: usize = 3;

    /// AA: last copy completed
    pub const COPIED: u8 = 0x80;
    /// PF: last scratchpad write was cut short
    pub const PARTIAL: u8 = 0x20;

    pub fn copied(&self) -> bool {
        self.status & Self::COPIED != 0
    }

    pub fn partial(&self) -> bool {
        self.status & Self::PARTIAL != 0
    }

    /// Bytes as they came off the wire
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let [lo, hi] = self.address.to_le_bytes();
        [lo, hi, self.ending_offset | self.status]
    }
}

/// Where the write transaction stands
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Selecting,
    Written { address: u16, ending: u8 },
    CopyRequested,
    Committed,
    Failed,
}

#[derive(Debug)]
pub struct Scratchpad {
    config: ScratchpadConfig,
    phase: Phase,
}

fn frame<E: Debug>(head: &[u8], body: &[u8], read_slots: usize) -> Result<Frame, Error<E>> {
    let mut frame = Frame::new();
    frame.extend_from_slice(head).map_err(|_| Error::TooLong)?;
    frame.extend_from_slice(body).map_err(|_| Error::TooLong)?;
    frame
        .resize(frame.len() + read_slots, 0xFF)
        .map_err(|_| Error::TooLong)?;
    Ok(frame)
}

impl Scratchpad {
    pub const fn new(config: ScratchpadConfig) -> Self {
        Scratchpad {
            config,
            phase: Phase::Idle,
        }
    }

    pub fn config(&self) -> &ScratchpadConfig {
        &self.config
    }

    pub fn length(&self) -> usize {
        self.config.length
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn mask(&self) -> u16 {
        (self.config.length - 1) as u16
    }

    /// Records the outcome of a transaction that reached the bus
    fn finish<T, E: Debug>(
        &mut self,
        link: &mut Link,
        result: Result<T, Error<E>>,
        next: Phase,
    ) -> Result<T, Error<E>> {
        self.phase = match result {
            Ok(_) => next,
            Err(_) => Phase::Failed,
        };
        link.settle(result)
    }

    /// Reads the scratchpad.
    ///
    /// The valid bytes (from the target address offset up to the ending
    /// offset) are stored at the same offsets of `page`, which must hold a
    /// whole scratchpad; other bytes of `page` are left alone. CRC-capable
    /// flavors reject the frame unless its CRC16 checks.
    pub fn read_scratchpad<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: &mut [u8],
    ) -> Result<ExtraInfo, Error<B::Error>> {
        if page.len() < self.length() {
            return Err(Error::OutOfBounds);
        }
        let staged = match self.phase {
            Phase::Written { .. } => self.phase,
            _ => Phase::Idle,
        };
        self.phase = Phase::Selecting;
        let result = self.read_frame(link, bus, delay, page);
        self.finish(link, result, staged)
    }

    fn read_frame<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: &mut [u8],
    ) -> Result<ExtraInfo, Error<B::Error>> {
        let crc = self.config.flavor.has_crc();
        let slots = 3 + self.length() + if crc { 2 } else { 0 };
        let mut raw = frame::<B::Error>(&[self.config.commands.read_scratchpad], &[], slots)?;

        link.select(bus, delay)?;
        bus.block(delay, &mut raw)?;
        log::trace!("read scratchpad {:02x?}", &raw[..]);

        let address = LittleEndian::read_u16(&raw[1..3]);
        let es = raw[3];
        let mask = self.mask();
        let start = (address & mask) as usize;
        let end = (es as u16 & mask) as usize;
        if end < start {
            return Err(Error::InvalidFrame);
        }
        let len = end - start + 1;
        if crc {
            let checked = &raw[..4 + len + 2];
            if !crc16_frame_valid(0, checked) {
                return Err(Error::Crc16Mismatch(compute_crc16(0, checked)));
            }
        }
        page[start..=end].copy_from_slice(&raw[4..4 + len]);
        Ok(ExtraInfo {
            address,
            ending_offset: end as u8,
            status: es & !(mask as u8),
        })
    }

    /// Stages `data` at `address` (offset bits select the scratchpad position).
    ///
    /// When the write ends exactly at the end of the scratchpad, CRC-capable
    /// devices answer with a CRC16 over the whole transaction, which is
    /// checked. Shorter writes get no CRC from the device.
    pub fn write_scratchpad<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: u16,
        data: &[u8],
    ) -> Result<(), Error<B::Error>> {
        let start = (address & self.mask()) as usize;
        if data.is_empty() || start + data.len() > self.length() {
            return Err(Error::TooLong);
        }
        if self.config.flavor == Flavor::Extended && data.len() != self.length() {
            return Err(Error::Unaligned);
        }
        let ending = (start + data.len() - 1) as u8;
        let with_crc = self.config.flavor.has_crc() && start + data.len() == self.length();

        self.phase = Phase::Selecting;
        let result = self.send_data(link, bus, delay, address, data, with_crc);
        self.finish(link, result, Phase::Written { address, ending })
    }

    fn send_data<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: u16,
        data: &[u8],
        with_crc: bool,
    ) -> Result<(), Error<B::Error>> {
        let [lo, hi] = address.to_le_bytes();
        let head = [self.config.commands.write_scratchpad, lo, hi];
        let mut raw = frame::<B::Error>(&head, data, if with_crc { 2 } else { 0 })?;

        log::debug!("{}: write scratchpad {:04x} +{}", link.address(), address, data.len());
        link.select(bus, delay)?;
        bus.block(delay, &mut raw)?;
        if with_crc && !crc16_frame_valid(0, &raw) {
            return Err(Error::Crc16Mismatch(compute_crc16(0, &raw)));
        }
        Ok(())
    }

    /// Reads the scratchpad back and checks it holds exactly `data` staged at `address`
    pub fn verify_scratchpad<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: u16,
        data: &[u8],
    ) -> Result<ExtraInfo, Error<B::Error>> {
        let start = (address & self.mask()) as usize;
        if data.is_empty() || start + data.len() > self.length() {
            return Err(Error::TooLong);
        }
        let end = start + data.len();
        let mut page = [0u8; MAX_SCRATCHPAD];
        for (slot, byte) in page[start..end].iter_mut().zip(data) {
            *slot = !byte;
        }
        let len = self.length();
        let info = self.read_scratchpad(link, bus, delay, &mut page[..len])?;

        if info.address == address
            && info.ending_offset as usize == end - 1
            && &page[start..end] == data
        {
            Ok(info)
        } else {
            self.phase = Phase::Failed;
            link.settle(Err(Error::VerifyMismatch { address }))
        }
    }

    /// Commits the staged `len` bytes at `address` to memory.
    ///
    /// Must follow a successful [`Scratchpad::write_scratchpad`] of the same
    /// range. Powered copies hold the strong pullup for the whole write
    /// cycle; that wait is not interrupted.
    pub fn copy_scratchpad<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: u16,
        len: usize,
    ) -> Result<(), Error<B::Error>> {
        let start = (address & self.mask()) as usize;
        if len == 0 || start + len > self.length() {
            return Err(Error::TooLong);
        }
        let ending = (start + len - 1) as u8;
        match self.phase {
            Phase::Written {
                address: staged,
                ending: staged_ending,
            } if staged == address && staged_ending == ending => {}
            _ => return Err(Error::NotStaged),
        }
        if self.config.needs_power_delivery() && !bus.can_deliver_power() {
            return Err(Error::NoPowerDelivery);
        }

        self.phase = Phase::CopyRequested;
        let result = self.send_copy(link, bus, delay, address, ending);
        self.finish(link, result, Phase::Committed)
    }

    fn send_copy<B: Bus>(
        &mut self,
        link: &mut Link,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: u16,
        es: u8,
    ) -> Result<(), Error<B::Error>> {
        let [lo, hi] = address.to_le_bytes();
        let cmd = self.config.commands.copy_scratchpad;

        log::debug!("{}: copy scratchpad {:04x} es {:02x}", link.address(), address, es);
        link.select(bus, delay)?;
        let status = match self.config.copy {
            CopyMode::Powered { delay_ms } => {
                bus.block(delay, &mut [cmd, lo, hi])?;
                bus.start_power_delivery(delay, PowerCondition::AfterNextByte)?;
                let sent = bus.write_byte(delay, es);
                if sent.is_ok() {
                    delay.delay_ms(delay_ms);
                }
                let restored = bus.set_power_normal(delay);
                sent?;
                restored?;
                bus.read_byte(delay)?
            }
            CopyMode::Echo => {
                let mut raw = [cmd, lo, hi, es, 0xFF, 0xFF];
                bus.block(delay, &mut raw)?;
                raw[5]
            }
        };

        match status & 0xF0 {
            0xA0 | 0x50 => Ok(()),
            _ => Err(Error::CopyFailed(status)),
        }
    }
}
