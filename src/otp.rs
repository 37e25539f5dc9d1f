//! Write protection and page redirection of one-time-programmable banks.
//!
//! The state of every page lives in a separate register bank of the part.
//! Registers are programmed like any other memory, so every transition is
//! one-directional: a lock or redirect never comes undone.

use crate::{
    Bank, Bus, Error, ExtraInfo, Geometry, Link, Memory, MemoryBank, PagedMemory, Scratchpad,
};
use embedded_hal::delay::DelayNs;

/// Register value that write protects a page of the EEPROM parts
pub const EEPROM_WRITE_PROTECT: u8 = 0x55;

/// Where the lock flag of a page is kept in the register bank
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockScheme {
    /// One register byte per page, locked when it holds `locked`
    Byte { base: usize, locked: u8 },
    /// One bit per page, locked when cleared
    Bit { base: usize },
}

impl LockScheme {
    fn register(&self, page: usize) -> usize {
        match *self {
            LockScheme::Byte { base, .. } => base + page,
            LockScheme::Bit { base } => base + page / 8,
        }
    }

    fn is_locked(&self, page: usize, value: u8) -> bool {
        match *self {
            LockScheme::Byte { locked, .. } => value == locked,
            LockScheme::Bit { .. } => value & (1 << (page % 8)) == 0,
        }
    }

    fn locked_value(&self, page: usize, value: u8) -> u8 {
        match *self {
            LockScheme::Byte { locked, .. } => locked,
            LockScheme::Bit { .. } => value & !(1 << (page % 8)),
        }
    }
}

/// One register byte per page holding the one's complement of the page it
/// is redirected to. An unprogrammed `0xFF` therefore names page 0, which
/// stands for "not redirected".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RedirectScheme {
    pub base: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OtpLayout {
    pub lock: Option<LockScheme>,
    pub redirect: Option<RedirectScheme>,
    /// Freezes the redirect register of a page
    pub redirect_lock: Option<LockScheme>,
}

/// Lock and redirect flags of one page
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageState {
    pub locked: bool,
    pub redirected_to: Option<usize>,
    pub redirect_locked: bool,
}

pub trait OtpMemory: PagedMemory {
    fn layout(&self) -> &OtpLayout;

    fn can_lock_page(&self) -> bool {
        self.layout().lock.is_some()
    }

    fn can_redirect_page(&self) -> bool {
        self.layout().redirect.is_some()
    }

    fn can_lock_redirect_page(&self) -> bool {
        self.layout().redirect_lock.is_some()
    }

    fn is_page_locked<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<bool, Error<B::Error>>;

    /// Write protects `page`; locking a locked page succeeds without writing
    fn lock_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<(), Error<B::Error>>;

    /// Succeeds only for a page that is not locked
    fn unlock_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<(), Error<B::Error>>;

    /// Page `page` is redirected to, 0 when it is not
    fn redirected_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<usize, Error<B::Error>>;

    /// Points `page` at `new_page`. A redirected page can not be pointed
    /// elsewhere or back at itself; `new_page` 0 is a no-op on a page that
    /// is not redirected.
    fn redirect_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        new_page: usize,
    ) -> Result<(), Error<B::Error>>;

    fn is_redirect_page_locked<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<bool, Error<B::Error>>;

    fn lock_redirect_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<(), Error<B::Error>>;

    fn page_state<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<PageState, Error<B::Error>> {
        let locked = self.is_page_locked(bus, delay, page)?;
        let redirected = self.redirected_page(bus, delay, page)?;
        let redirect_locked = self.is_redirect_page_locked(bus, delay, page)?;
        Ok(PageState {
            locked,
            redirected_to: (redirected != 0).then_some(redirected),
            redirect_locked,
        })
    }
}

/// A data bank bound to its device together with the register bank that
/// holds its lock and redirect flags
pub struct OtpBank<'a> {
    data: &'a mut MemoryBank,
    registers: &'a mut MemoryBank,
    layout: OtpLayout,
    link: &'a mut Link,
    pad: Option<&'a mut Scratchpad>,
}

impl<'a> OtpBank<'a> {
    pub fn new(
        data: &'a mut MemoryBank,
        registers: &'a mut MemoryBank,
        layout: OtpLayout,
        link: &'a mut Link,
        pad: Option<&'a mut Scratchpad>,
    ) -> Self {
        OtpBank {
            data,
            registers,
            layout,
            link,
            pad,
        }
    }

    fn data(&mut self) -> Bank<'_> {
        Bank::new(self.data, self.link, self.pad.as_deref_mut())
    }

    fn registers(&mut self) -> Bank<'_> {
        Bank::new(self.registers, self.link, self.pad.as_deref_mut())
    }

    fn read_register<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        offset: usize,
    ) -> Result<u8, Error<B::Error>> {
        let mut value = [0];
        self.registers().read(bus, delay, offset, false, &mut value)?;
        Ok(value[0])
    }

    /// Programs a register and checks the value read back with `accept`
    fn program_register<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        offset: usize,
        value: u8,
        accept: impl Fn(u8) -> bool,
    ) -> Result<(), Error<B::Error>> {
        log::debug!("{}: register {:02x} <- {:02x}", self.link.address(), offset, value);
        self.registers().write(bus, delay, offset, &[value])?;
        let stuck = self.read_register(bus, delay, offset)?;
        if accept(stuck) {
            Ok(())
        } else {
            let address = self.registers.geometry().start + offset as u16;
            self.link.settle(Err(Error::VerifyMismatch { address }))
        }
    }

    fn lock_with<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        scheme: LockScheme,
        page: usize,
    ) -> Result<(), Error<B::Error>> {
        self.data.geometry().check_page(page)?;
        let offset = scheme.register(page);
        let current = self.read_register(bus, delay, offset)?;
        if scheme.is_locked(page, current) {
            return Ok(());
        }
        let value = scheme.locked_value(page, current);
        self.program_register(bus, delay, offset, value, |stuck| {
            scheme.is_locked(page, stuck)
        })
    }

    fn locked_with<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        scheme: Option<LockScheme>,
        page: usize,
    ) -> Result<bool, Error<B::Error>> {
        self.data.geometry().check_page(page)?;
        match scheme {
            Some(scheme) => {
                let value = self.read_register(bus, delay, scheme.register(page))?;
                Ok(scheme.is_locked(page, value))
            }
            None => Ok(false),
        }
    }
}

impl Memory for OtpBank<'_> {
    fn geometry(&self) -> &Geometry {
        self.data.geometry()
    }

    fn description(&self) -> &'static str {
        self.data.description()
    }

    fn read<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<(), Error<B::Error>> {
        self.data().read(bus, delay, address, continue_prior, buf)
    }

    /// Refuses with [`Error::PageLocked`] when any page touched is write protected
    fn write<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        address: usize,
        data: &[u8],
    ) -> Result<(), Error<B::Error>> {
        let geometry = *self.data.geometry();
        geometry.check_range(address, data.len())?;
        if !data.is_empty() && self.layout.lock.is_some() {
            let first = address / geometry.page_length;
            let last = (address + data.len() - 1) / geometry.page_length;
            for page in first..=last {
                if self.is_page_locked(bus, delay, page)? {
                    return Err(Error::PageLocked(page));
                }
            }
        }
        self.data().write(bus, delay, address, data)
    }
}

impl PagedMemory for OtpBank<'_> {
    fn read_page_crc<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<Option<ExtraInfo>, Error<B::Error>> {
        self.data().read_page_crc(bus, delay, page, continue_prior, buf)
    }
}

impl OtpMemory for OtpBank<'_> {
    fn layout(&self) -> &OtpLayout {
        &self.layout
    }

    fn is_page_locked<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<bool, Error<B::Error>> {
        let scheme = self.layout.lock;
        self.locked_with(bus, delay, scheme, page)
    }

    fn lock_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<(), Error<B::Error>> {
        let scheme = self.layout.lock.ok_or(Error::NotSupport)?;
        self.lock_with(bus, delay, scheme, page)
    }

    fn unlock_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<(), Error<B::Error>> {
        if self.is_page_locked(bus, delay, page)? {
            Err(Error::Irreversible)
        } else {
            Ok(())
        }
    }

    fn redirected_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<usize, Error<B::Error>> {
        self.data.geometry().check_page(page)?;
        match self.layout.redirect {
            Some(scheme) => Ok(!self.read_register(bus, delay, scheme.base + page)? as usize),
            None => Ok(0),
        }
    }

    fn redirect_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        new_page: usize,
    ) -> Result<(), Error<B::Error>> {
        let scheme = self.layout.redirect.ok_or(Error::NotSupport)?;
        let geometry = *self.data.geometry();
        geometry.check_page(page)?;
        if new_page != 0 {
            geometry.check_page(new_page)?;
        }
        let target = u8::try_from(new_page).map_err(|_| Error::PageOutOfRange(new_page))?;

        let current = self.redirected_page(bus, delay, page)?;
        if current == new_page {
            return Ok(());
        }
        if current != 0 {
            return Err(Error::Irreversible);
        }
        if self.is_redirect_page_locked(bus, delay, page)? {
            return Err(Error::PageLocked(page));
        }
        self.program_register(bus, delay, scheme.base + page, !target, |stuck| stuck == !target)
    }

    fn is_redirect_page_locked<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<bool, Error<B::Error>> {
        let scheme = self.layout.redirect_lock;
        self.locked_with(bus, delay, scheme, page)
    }

    fn lock_redirect_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
    ) -> Result<(), Error<B::Error>> {
        let scheme = self.layout.redirect_lock.ok_or(Error::NotSupport)?;
        self.lock_with(bus, delay, scheme, page)
    }
}
