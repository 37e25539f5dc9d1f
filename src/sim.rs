//! Simulated memory parts for the unit tests.
//!
//! A [`Sim`] is one device on its own bus: it answers match ROM for its
//! address and interprets the byte stream of the EEPROM scratchpad families
//! or the EPROM families. Every byte exchanged is the wired AND of what the
//! master sent and what the device drove.

use crate::{compute_partial_crc8, crc16_trailer, Address, Bus, Error, PowerCondition, Speed};
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use std::collections::VecDeque;

/// Delay that only counts
#[derive(Default)]
pub(crate) struct Clock {
    pub ns: u64,
}

impl Clock {
    pub fn ms(&self) -> u64 {
        self.ns / 1_000_000
    }
}

impl DelayNs for Clock {
    fn delay_ns(&mut self, ns: u32) {
        self.ns += ns as u64;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Event {
    Select,
    WriteScratchpad { address: u16, len: usize },
    ReadScratchpad,
    Copy { address: u16, es: u8 },
    ReadMemory { address: u16 },
    Program { address: u16 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Power {
    Normal,
    Armed,
    Strong,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Kind {
    Eeprom { crc: bool, powered: bool },
    Eprom,
}

/// Write protect register byte per data page, DS2431 style
#[derive(Clone, Copy, Debug)]
pub(crate) struct Protect {
    pub register: usize,
    pub page_length: usize,
    pub pages: usize,
    pub locked: u8,
}

enum State {
    Idle,
    Command,
    Header { cmd: u8, bytes: Vec<u8>, need: usize },
    ScratchIn { offset: usize, frame: Vec<u8> },
    Out(VecDeque<u8>),
}

pub(crate) struct Sim {
    pub address: Address,
    pub kind: Kind,
    pub memory: Vec<u8>,
    pub write_once: Vec<bool>,
    pub status: Vec<u8>,
    pub protect: Option<Protect>,
    pub scratch: Vec<u8>,
    pub page_length: usize,
    pub copy_opcode: u8,
    pub present: bool,
    pub corrupt_crc: bool,
    pub copy_status: Option<u8>,
    /// Select number (1-based) that finds no presence pulse
    pub fail_select: Option<usize>,
    pub can_power: bool,
    pub can_program: bool,
    pub overdrive: bool,
    pub events: Vec<Event>,
    pub selects: usize,
    pub exclusive: usize,
    pub max_exclusive: usize,
    ta: u16,
    es: u8,
    state: State,
    power: Power,
    speed: Speed,
    program: Option<(usize, u8, bool)>,
    pending: Option<Event>,
}

impl Sim {
    pub fn eeprom(size: usize, scratch_len: usize, crc: bool, powered: bool) -> Self {
        Sim {
            address: Address::new(0x23, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]),
            kind: Kind::Eeprom { crc, powered },
            memory: vec![0xFF; size],
            write_once: vec![false; size],
            status: Vec::new(),
            protect: None,
            scratch: vec![0xFF; scratch_len],
            page_length: scratch_len,
            copy_opcode: 0x55,
            present: true,
            corrupt_crc: false,
            copy_status: None,
            fail_select: None,
            can_power: true,
            can_program: false,
            overdrive: false,
            events: Vec::new(),
            selects: 0,
            exclusive: 0,
            max_exclusive: 0,
            ta: 0,
            es: 0,
            state: State::Idle,
            power: Power::Normal,
            speed: Speed::Standard,
            program: None,
            pending: None,
        }
    }

    pub fn eprom(size: usize, status_size: usize) -> Self {
        let mut sim = Sim::eeprom(size, 0, false, false);
        sim.kind = Kind::Eprom;
        sim.address = Address::new(0x09, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);
        sim.write_once = vec![true; size];
        sim.page_length = 32;
        sim.status = vec![0xFF; status_size];
        sim.can_power = false;
        sim.can_program = true;
        sim
    }

    pub fn events(&mut self) -> &[Event] {
        self.flush();
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.flush();
        self.events.clear();
    }

    fn flush(&mut self) {
        if let Some(event) = self.pending.take() {
            self.events.push(event);
        }
    }

    fn scratch_mask(&self) -> usize {
        self.scratch.len().saturating_sub(1)
    }

    fn crc(&self, data: &[u8]) -> [u8; 2] {
        let mut trailer = crc16_trailer(0, data);
        if self.corrupt_crc {
            trailer[0] ^= 0x01;
        }
        trailer
    }

    fn locked(&self, address: usize) -> bool {
        match (self.kind, self.protect) {
            (Kind::Eeprom { .. }, Some(p)) => {
                let page = address / p.page_length;
                page < p.pages && self.memory[p.register + page] == p.locked
            }
            (Kind::Eprom, _) => {
                let page = address / self.page_length;
                !self.status.is_empty() && page < 8 && self.status[0] & (1 << page) == 0
            }
            _ => false,
        }
    }

    fn start(&mut self, cmd: u8) -> State {
        match (self.kind, cmd) {
            (Kind::Eeprom { .. }, 0x0F) | (Kind::Eeprom { .. }, 0xF0) | (Kind::Eeprom { .. }, 0xA5) => {
                State::Header { cmd, bytes: Vec::new(), need: 2 }
            }
            (Kind::Eeprom { .. }, 0xAA) => {
                self.pending = Some(Event::ReadScratchpad);
                self.read_scratchpad()
            }
            (Kind::Eeprom { .. }, c) if c == self.copy_opcode => State::Header {
                cmd,
                bytes: Vec::new(),
                need: 3,
            },
            (Kind::Eprom, 0x0F) | (Kind::Eprom, 0x55) => State::Header {
                cmd,
                bytes: Vec::new(),
                need: 3,
            },
            (Kind::Eprom, 0xF0) | (Kind::Eprom, 0xAA) => State::Header {
                cmd,
                bytes: Vec::new(),
                need: 2,
            },
            _ => State::Idle,
        }
    }

    fn read_scratchpad(&mut self) -> State {
        let mask = self.scratch_mask();
        let [lo, hi] = self.ta.to_le_bytes();
        let mut frame = vec![0xAA, lo, hi, self.es];
        let start = self.ta as usize & mask;
        let end = self.es as usize & mask;
        if end >= start {
            frame.extend_from_slice(&self.scratch[start..=end]);
        }
        if let Kind::Eeprom { crc: true, .. } = self.kind {
            let trailer = self.crc(&frame);
            frame.extend_from_slice(&trailer);
        }
        State::Out(frame.into_iter().skip(1).collect())
    }

    fn header_done(&mut self, cmd: u8, bytes: &[u8]) -> State {
        let ta = u16::from_le_bytes([bytes[0], bytes[1]]);
        match (self.kind, cmd) {
            (Kind::Eeprom { .. }, 0x0F) => {
                self.ta = ta;
                let offset = ta as usize & self.scratch_mask();
                self.es = offset as u8;
                self.pending = Some(Event::WriteScratchpad { address: ta, len: 0 });
                State::ScratchIn {
                    offset,
                    frame: vec![cmd, bytes[0], bytes[1]],
                }
            }
            (Kind::Eeprom { .. }, 0xF0) => {
                self.pending = Some(Event::ReadMemory { address: ta });
                State::Out(self.memory.iter().skip(ta as usize).copied().collect())
            }
            (Kind::Eeprom { .. }, 0xA5) => {
                self.pending = Some(Event::ReadMemory { address: ta });
                self.extended_read(ta as usize)
            }
            (Kind::Eeprom { powered, .. }, _) => {
                let es = bytes[2];
                self.pending = Some(Event::Copy { address: ta, es });
                let powered_ok = !powered || self.power != Power::Normal;
                if ta != self.ta || es != self.es || !powered_ok {
                    return State::Out(VecDeque::new());
                }
                self.commit();
                let status = self.copy_status;
                State::Out(
                    (0..8)
                        .map(|i| status.unwrap_or(if i % 2 == 0 { 0xAA } else { 0x55 }))
                        .collect(),
                )
            }
            (Kind::Eprom, 0xF0) | (Kind::Eprom, 0xAA) => {
                self.pending = Some(Event::ReadMemory { address: ta });
                let area = if cmd == 0xF0 { &self.memory } else { &self.status };
                let mut out: VecDeque<u8> = VecDeque::new();
                out.push_back(compute_partial_crc8(0, &[cmd, bytes[0], bytes[1]]));
                out.extend(area.iter().skip(ta as usize).copied());
                State::Out(out)
            }
            (Kind::Eprom, _) => {
                let data = bytes[2];
                self.program = Some((ta as usize, data, cmd == 0x55));
                let mut crc = compute_partial_crc8(0, &[cmd, bytes[0], bytes[1], data]);
                if self.corrupt_crc {
                    crc ^= 0x01;
                }
                State::Out(VecDeque::from(vec![crc]))
            }
        }
    }

    fn extended_read(&self, address: usize) -> State {
        let page_length = self.page_length;
        let [lo, hi] = (address as u16).to_le_bytes();
        let mut out = VecDeque::new();
        let mut crc_input = vec![0xA5, lo, hi];
        let mut next = address;
        while next < self.memory.len() {
            let page_end = (next / page_length + 1) * page_length;
            crc_input.extend_from_slice(&self.memory[next..page_end]);
            out.extend(self.memory[next..page_end].iter().copied());
            out.extend(self.crc(&crc_input));
            crc_input.clear();
            next = page_end;
        }
        State::Out(out)
    }

    fn commit(&mut self) {
        let mask = self.scratch_mask();
        let base = self.ta as usize & !mask;
        let start = self.ta as usize & mask;
        let end = self.es as usize & mask;
        for offset in start..=end {
            let address = base + offset;
            if address >= self.memory.len() || self.locked(address) {
                continue;
            }
            if self.write_once[address] {
                self.memory[address] &= self.scratch[offset];
            } else {
                self.memory[address] = self.scratch[offset];
            }
        }
        self.es |= 0x80;
    }

    fn touch(&mut self, out: u8) -> u8 {
        let (next, driven) = match core::mem::replace(&mut self.state, State::Idle) {
            State::Idle => (State::Idle, 0xFF),
            State::Command => (self.start(out), 0xFF),
            State::Header {
                cmd,
                mut bytes,
                need,
            } => {
                bytes.push(out);
                if bytes.len() == need {
                    (self.header_done(cmd, &bytes), 0xFF)
                } else {
                    (State::Header { cmd, bytes, need }, 0xFF)
                }
            }
            State::ScratchIn { offset, mut frame } => {
                self.scratch[offset] = out;
                self.es = offset as u8;
                frame.push(out);
                if let Some(Event::WriteScratchpad { len, .. }) = &mut self.pending {
                    *len += 1;
                }
                if offset + 1 < self.scratch.len() {
                    (
                        State::ScratchIn {
                            offset: offset + 1,
                            frame,
                        },
                        0xFF,
                    )
                } else if let Kind::Eeprom { crc: true, .. } = self.kind {
                    (State::Out(self.crc(&frame).into_iter().collect()), 0xFF)
                } else {
                    (State::Idle, 0xFF)
                }
            }
            State::Out(mut queue) => {
                let byte = queue.pop_front().unwrap_or(0xFF);
                (State::Out(queue), byte)
            }
        };
        self.state = next;
        out & driven
    }
}

impl Bus for Sim {
    type Error = Infallible;

    fn reset(&mut self, _delay: &mut impl DelayNs) -> Result<(), Error<Infallible>> {
        self.flush();
        self.state = State::Idle;
        self.program = None;
        if self.present {
            Ok(())
        } else {
            Err(Error::NoPresence)
        }
    }

    fn select(
        &mut self,
        delay: &mut impl DelayNs,
        address: &Address,
    ) -> Result<(), Error<Infallible>> {
        self.reset(delay)?;
        self.selects += 1;
        if self.fail_select == Some(self.selects) {
            return Err(Error::NoPresence);
        }
        self.events.push(Event::Select);
        if *address == self.address {
            self.state = State::Command;
        }
        Ok(())
    }

    fn block(&mut self, _delay: &mut impl DelayNs, data: &mut [u8]) -> Result<(), Error<Infallible>> {
        for byte in data.iter_mut() {
            *byte = self.touch(*byte);
        }
        Ok(())
    }

    fn write_byte(&mut self, _delay: &mut impl DelayNs, byte: u8) -> Result<(), Error<Infallible>> {
        if self.power == Power::Armed {
            // the device samples the last bit before the pullup switches on
            self.touch(byte);
            self.power = Power::Strong;
        } else {
            self.touch(byte);
        }
        Ok(())
    }

    fn can_deliver_power(&self) -> bool {
        self.can_power
    }

    fn start_power_delivery(
        &mut self,
        _delay: &mut impl DelayNs,
        condition: PowerCondition,
    ) -> Result<(), Error<Infallible>> {
        if !self.can_power {
            return Err(Error::NoPowerDelivery);
        }
        self.power = match condition {
            PowerCondition::Now => Power::Strong,
            PowerCondition::AfterNextByte => Power::Armed,
        };
        Ok(())
    }

    fn set_power_normal(&mut self, _delay: &mut impl DelayNs) -> Result<(), Error<Infallible>> {
        self.power = Power::Normal;
        Ok(())
    }

    fn can_program(&self) -> bool {
        self.can_program
    }

    fn program_pulse(&mut self, _delay: &mut impl DelayNs) -> Result<(), Error<Infallible>> {
        if !self.can_program {
            return Err(Error::NoProgramPulse);
        }
        if let Some((address, data, status)) = self.program.take() {
            self.pending = Some(Event::Program {
                address: address as u16,
            });
            let locked = !status && self.locked_eprom(address);
            let area = if status {
                &mut self.status
            } else {
                &mut self.memory
            };
            if let Some(byte) = area.get_mut(address) {
                if !locked {
                    *byte &= data;
                }
                let value = *byte;
                self.state = State::Out(VecDeque::from(vec![value]));
            }
        }
        Ok(())
    }

    fn speed(&self) -> Speed {
        self.speed
    }

    fn set_speed(&mut self, _delay: &mut impl DelayNs, speed: Speed) -> Result<(), Error<Infallible>> {
        if speed == Speed::Overdrive && !self.overdrive {
            return Err(Error::NotSupport);
        }
        self.speed = speed;
        Ok(())
    }

    fn begin_exclusive(&mut self) -> Result<(), Error<Infallible>> {
        self.exclusive += 1;
        self.max_exclusive = self.max_exclusive.max(self.exclusive);
        Ok(())
    }

    fn end_exclusive(&mut self) {
        self.exclusive -= 1;
    }

    fn is_exclusive(&self) -> bool {
        self.exclusive > 0
    }
}

impl Sim {
    fn locked_eprom(&self, address: usize) -> bool {
        self.kind == Kind::Eprom && self.locked(address)
    }
}
