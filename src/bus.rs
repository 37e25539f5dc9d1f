use crate::{Address, Error};
use core::{
    fmt::Debug,
    ops::{Deref, DerefMut},
};
use embedded_hal::delay::DelayNs;

/// Bus timing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Speed {
    #[default]
    Standard,
    Overdrive,
}

/// When a requested strong pullup takes effect
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerCondition {
    Now,
    /// After the next byte written with [`Bus::write_byte`]
    AfterNextByte,
}

/// What the memory protocol needs from a 1-Wire master.
///
/// One implementation drives one physical bus. Nothing here is reentrant
/// across callers: a user sharing the bus between threads must serialize
/// access per bus.
pub trait Bus {
    type Error: Sized + Debug;

    /// Reset pulse; fails with [`Error::NoPresence`] when nothing answers
    fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<Self::Error>>;

    /// Reset followed by a match ROM for `address` at the current speed
    fn select(
        &mut self,
        delay: &mut impl DelayNs,
        address: &Address,
    ) -> Result<(), Error<Self::Error>>;

    /// Sends every byte of `data` and replaces it with what was sampled.
    ///
    /// Bytes sent as `0xFF` are read slots.
    fn block(&mut self, delay: &mut impl DelayNs, data: &mut [u8])
        -> Result<(), Error<Self::Error>>;

    fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), Error<Self::Error>> {
        self.block(delay, &mut [byte])
    }

    fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, Error<Self::Error>> {
        let mut byte = [0xFF];
        self.block(delay, &mut byte)?;
        Ok(byte[0])
    }

    fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), Error<Self::Error>> {
        dst.fill(0xFF);
        self.block(delay, dst)
    }

    fn can_deliver_power(&self) -> bool {
        false
    }

    fn start_power_delivery(
        &mut self,
        _delay: &mut impl DelayNs,
        _condition: PowerCondition,
    ) -> Result<(), Error<Self::Error>> {
        Err(Error::NoPowerDelivery)
    }

    fn set_power_normal(&mut self, _delay: &mut impl DelayNs) -> Result<(), Error<Self::Error>> {
        Ok(())
    }

    fn can_program(&self) -> bool {
        false
    }

    /// EPROM programming pulse on the data line
    fn program_pulse(&mut self, _delay: &mut impl DelayNs) -> Result<(), Error<Self::Error>> {
        Err(Error::NoProgramPulse)
    }

    fn speed(&self) -> Speed;

    fn set_speed(&mut self, delay: &mut impl DelayNs, speed: Speed)
        -> Result<(), Error<Self::Error>>;

    /// Claims the bus for a sequence of transactions. Calls nest.
    fn begin_exclusive(&mut self) -> Result<(), Error<Self::Error>> {
        Ok(())
    }

    fn end_exclusive(&mut self) {}

    /// Whether an [`Exclusive`] scope is open; continued reads need one
    fn is_exclusive(&self) -> bool;
}

/// Holds [`Bus::begin_exclusive`] until dropped, error paths included
pub struct Exclusive<'a, B: Bus> {
    bus: &'a mut B,
}

impl<'a, B: Bus> Exclusive<'a, B> {
    pub fn begin(bus: &'a mut B) -> Result<Self, Error<B::Error>> {
        bus.begin_exclusive()?;
        Ok(Exclusive { bus })
    }
}

impl<B: Bus> Deref for Exclusive<'_, B> {
    type Target = B;

    fn deref(&self) -> &B {
        self.bus
    }
}

impl<B: Bus> DerefMut for Exclusive<'_, B> {
    fn deref_mut(&mut self) -> &mut B {
        self.bus
    }
}

impl<B: Bus> Drop for Exclusive<'_, B> {
    fn drop(&mut self) {
        self.bus.end_exclusive();
    }
}
