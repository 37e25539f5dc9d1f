use crate::{Address, Bus, Command, Error, IoWire, OpCode, PowerCondition, Speed};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Power {
    Normal,
    Armed,
    Strong,
}

/// Bit-banged master at standard speed
pub struct Driver<W: IoWire> {
    io_wire: W,
    power: Power,
    exclusive: u8,
}

impl<E: Debug, W: IoWire<Error = E>> Driver<W> {
    pub fn new(io_wire: W) -> Self {
        Driver {
            io_wire,
            power: Power::Normal,
            exclusive: 0,
        }
    }

    pub fn release(self) -> W {
        self.io_wire
    }

    /// Performs a reset and listens for a presence pulse
    /// Returns Err(WireFault) if the wire seems to be shortened,
    /// Err(NoPresence) if no device pulled the line low
    pub fn reset_pulse(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.io_wire.release()?;
        self.ensure_wire_high(delay)?;
        self.io_wire.set_low()?;
        delay.delay_us(480);
        self.io_wire.release()?;

        let mut presence = false;
        for _ in 0..7 {
            delay.delay_us(10);
            presence |= self.io_wire.is_low()?;
        }
        delay.delay_us(410);
        if presence {
            Ok(())
        } else {
            Err(Error::NoPresence)
        }
    }

    fn ensure_wire_high(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        for _ in 0..125 {
            if self.io_wire.is_high()? {
                return Ok(());
            }
            delay.delay_us(2);
        }
        Err(Error::WireFault)
    }

    pub(crate) fn touch_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<u8, E> {
        let mut out = byte;
        let mut sampled = 0_u8;
        for _ in 0..8 {
            sampled >>= 1;
            if self.touch_bit(delay, (out & 0x01) == 0x01)? {
                sampled |= 0x80;
            }
            out >>= 1;
        }
        Ok(sampled)
    }

    /// A one bit is a read slot: the line is sampled after the short low pulse
    pub(crate) fn touch_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<bool, E> {
        self.io_wire.set_low()?;
        if high {
            delay.delay_us(3);
            self.io_wire.release()?;
            delay.delay_us(7);
            let val = self.io_wire.is_high();
            delay.delay_us(55);
            val
        } else {
            delay.delay_us(65);
            self.io_wire.release()?;
            delay.delay_us(5);
            Ok(false)
        }
    }

    fn strong_pullup(&mut self, enable: bool) -> Result<(), E> {
        self.io_wire.strong_pullup(enable)?;
        self.power = if enable { Power::Strong } else { Power::Normal };
        Ok(())
    }
}

impl<E: Debug, W: IoWire<Error = E>> Bus for Driver<W> {
    type Error = E;

    fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.reset_pulse(delay)
    }

    fn select(&mut self, delay: &mut impl DelayNs, address: &Address) -> Result<(), Error<E>> {
        self.reset_pulse(delay)?;
        self.touch_byte(delay, Command::MatchRom.op_code())?;
        for byte in address.iter() {
            self.touch_byte(delay, *byte)?;
        }
        Ok(())
    }

    fn block(&mut self, delay: &mut impl DelayNs, data: &mut [u8]) -> Result<(), Error<E>> {
        for byte in data.iter_mut() {
            *byte = self.touch_byte(delay, *byte)?;
        }
        Ok(())
    }

    fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), Error<E>> {
        self.touch_byte(delay, byte)?;
        if self.power == Power::Armed {
            self.strong_pullup(true)?;
        }
        Ok(())
    }

    fn can_deliver_power(&self) -> bool {
        self.io_wire.has_strong_pullup()
    }

    fn start_power_delivery(
        &mut self,
        _delay: &mut impl DelayNs,
        condition: PowerCondition,
    ) -> Result<(), Error<E>> {
        if !self.io_wire.has_strong_pullup() {
            return Err(Error::NoPowerDelivery);
        }
        match condition {
            PowerCondition::Now => self.strong_pullup(true)?,
            PowerCondition::AfterNextByte => self.power = Power::Armed,
        }
        Ok(())
    }

    fn set_power_normal(&mut self, _delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.strong_pullup(false)?;
        Ok(())
    }

    fn speed(&self) -> Speed {
        Speed::Standard
    }

    fn set_speed(&mut self, _delay: &mut impl DelayNs, speed: Speed) -> Result<(), Error<E>> {
        match speed {
            Speed::Standard => Ok(()),
            Speed::Overdrive => Err(Error::NotSupport),
        }
    }

    fn begin_exclusive(&mut self) -> Result<(), Error<E>> {
        self.exclusive = self.exclusive.saturating_add(1);
        Ok(())
    }

    fn end_exclusive(&mut self) {
        self.exclusive = self.exclusive.saturating_sub(1);
    }

    fn is_exclusive(&self) -> bool {
        self.exclusive > 0
    }
}
