use crate::{Address, Bus, Error, Speed};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// How the previous read left the device's address counter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Cursor {
    Plain(u16),
    /// Inside a CRC-per-page read, positioned at a page start
    Crc(u16),
}

/// Per-device selection state shared by all banks of one device.
///
/// `force_verify` is raised by any transaction that failed for a reason other
/// than a rejected request; the next transaction re-applies the device speed
/// and checks presence before selecting.
#[derive(Debug)]
pub struct Link {
    address: Address,
    speed: Speed,
    force_verify: bool,
    cursor: Option<Cursor>,
}

impl Link {
    pub fn new(address: Address) -> Self {
        Link {
            address,
            speed: Speed::Standard,
            force_verify: false,
            cursor: None,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// Speed the device should be talked to at; takes effect on the next transaction
    pub fn set_speed(&mut self, speed: Speed) {
        if speed != self.speed {
            self.speed = speed;
            self.force_verify = true;
        }
    }

    pub fn force_verify(&self) -> bool {
        self.force_verify
    }

    pub fn set_force_verify(&mut self) {
        self.force_verify = true;
        self.cursor = None;
    }

    /// Re-applies the device speed when the last transaction failed or the bus drifted
    pub fn check_speed<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<B::Error>> {
        if !self.force_verify && bus.speed() == self.speed {
            return Ok(());
        }
        log::debug!("{}: verifying speed {:?}", self.address, self.speed);
        if bus.speed() != self.speed {
            bus.set_speed(delay, self.speed)?;
        }
        bus.reset(delay)?;
        self.force_verify = false;
        Ok(())
    }

    /// Speed check followed by a fresh match ROM
    pub fn select<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
    ) -> Result<(), Error<B::Error>> {
        self.cursor = None;
        self.check_speed(bus, delay)?;
        bus.select(delay, &self.address)
    }

    /// Raises `force_verify` when `result` failed on the bus or on data integrity
    pub fn settle<T, E: Debug>(&mut self, result: Result<T, Error<E>>) -> Result<T, Error<E>> {
        if let Err(e) = &result {
            if e.needs_verify() {
                log::warn!("{}: {}, verify before next transaction", self.address, e);
                self.set_force_verify();
            }
        }
        result
    }

    pub(crate) fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: Option<Cursor>) {
        self.cursor = cursor;
    }
}
