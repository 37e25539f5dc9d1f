use crate::link::Cursor;
use crate::memory::BankIo;
use crate::{
    compute_crc16, crc16_frame_valid, crc16_trailer, Bank, Bus, Error, ExtraInfo, Link, Memory,
    MAX_PAGE_LENGTH,
};
use embedded_hal::delay::DelayNs;

/// Page oriented access on top of [`Memory`].
///
/// A page packet is `[len][data; len][!crc16 LE]` where the CRC16 runs over
/// the length byte and the data, seeded with the page number. Packets carry
/// at most [`crate::Geometry::max_packet_len`] bytes.
pub trait PagedMemory: Memory {
    /// Reads page `page` into the first page length bytes of `buf`
    fn read_page<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<(), Error<B::Error>> {
        let geometry = *self.geometry();
        geometry.check_page(page)?;
        let buf = buf
            .get_mut(..geometry.page_length)
            .ok_or(Error::OutOfBounds)?;
        self.read(bus, delay, page * geometry.page_length, continue_prior, buf)
    }

    /// Reads a page the device protects with a CRC16; fails with
    /// [`Error::NotSupport`] unless the bank has `PAGE_AUTO_CRC`.
    ///
    /// Banks that report extra information along with the page return it.
    fn read_page_crc<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<Option<ExtraInfo>, Error<B::Error>>;

    /// Reads the packet stored in `page`, returns the payload length
    fn read_page_packet<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<usize, Error<B::Error>> {
        let geometry = *self.geometry();
        let mut raw = [0u8; MAX_PAGE_LENGTH];
        if geometry.has_page_auto_crc() {
            self.read_page_crc(bus, delay, page, continue_prior, &mut raw)?;
        } else {
            self.read_page(bus, delay, page, continue_prior, &mut raw)?;
        }

        let len = raw[0] as usize;
        if len > geometry.max_packet_len {
            return Err(Error::InvalidPacket(raw[0]));
        }
        let packet = &raw[..len + 3];
        if !crc16_frame_valid(page as u16, packet) {
            return Err(Error::Crc16Mismatch(compute_crc16(page as u16, packet)));
        }
        let buf = buf.get_mut(..len).ok_or(Error::TooLong)?;
        buf.copy_from_slice(&raw[1..len + 1]);
        Ok(len)
    }

    /// Writes `data` as a packet at the start of `page`
    fn write_page_packet<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        data: &[u8],
    ) -> Result<(), Error<B::Error>> {
        let geometry = *self.geometry();
        geometry.check_page(page)?;
        if data.len() > geometry.max_packet_len {
            return Err(Error::TooLong);
        }

        let len = data.len();
        let mut raw = [0u8; MAX_PAGE_LENGTH];
        raw[0] = len as u8;
        raw[1..len + 1].copy_from_slice(data);
        let trailer = crc16_trailer(page as u16, &raw[..len + 1]);
        raw[len + 1..len + 3].copy_from_slice(&trailer);
        self.write(bus, delay, page * geometry.page_length, &raw[..len + 3])
    }
}

impl PagedMemory for Bank<'_> {
    fn read_page_crc<B: Bus>(
        &mut self,
        bus: &mut B,
        delay: &mut impl DelayNs,
        page: usize,
        continue_prior: bool,
        buf: &mut [u8],
    ) -> Result<Option<ExtraInfo>, Error<B::Error>> {
        let geometry = *self.geometry();
        if !geometry.has_page_auto_crc() {
            return Err(Error::NotSupport);
        }
        geometry.check_page(page)?;
        let buf = buf
            .get_mut(..geometry.page_length)
            .ok_or(Error::OutOfBounds)?;

        match self.bank().io() {
            BankIo::Scratchpad if continue_prior => Err(Error::NotContinuous),
            BankIo::Scratchpad => {
                let (link, pad) = self.split().ok_or(Error::NotSupport)?;
                pad.read_scratchpad(link, bus, delay, buf).map(Some)
            }
            BankIo::Eeprom(commands) => {
                let cmd = commands.read_memory_crc.ok_or(Error::NotSupport)?;
                let address = geometry.page_address(page);
                read_crc_page(self.link(), bus, delay, cmd, address, continue_prior, buf)?;
                Ok(None)
            }
            BankIo::Eprom(_) => Err(Error::NotSupport),
        }
    }
}

/// Page read where the device follows every page with its inverted CRC16.
///
/// The first page's CRC also covers the command and address; continued
/// pages are checked over their data alone.
fn read_crc_page<B: Bus>(
    link: &mut Link,
    bus: &mut B,
    delay: &mut impl DelayNs,
    cmd: u8,
    address: u16,
    continue_prior: bool,
    buf: &mut [u8],
) -> Result<(), Error<B::Error>> {
    if continue_prior && (!bus.is_exclusive() || link.cursor() != Some(Cursor::Crc(address))) {
        return Err(Error::NotContinuous);
    }
    let result = fetch_crc_page(link, bus, delay, cmd, address, continue_prior, buf);
    let result = link.settle(result);
    link.set_cursor(
        result
            .is_ok()
            .then(|| Cursor::Crc(address.wrapping_add(buf.len() as u16))),
    );
    result
}

fn fetch_crc_page<B: Bus>(
    link: &mut Link,
    bus: &mut B,
    delay: &mut impl DelayNs,
    cmd: u8,
    address: u16,
    continue_prior: bool,
    buf: &mut [u8],
) -> Result<(), Error<B::Error>> {
    let mut raw = [0xFF; MAX_PAGE_LENGTH + 5];
    let head = if continue_prior {
        0
    } else {
        let [lo, hi] = address.to_le_bytes();
        raw[..3].copy_from_slice(&[cmd, lo, hi]);
        link.select(bus, delay)?;
        3
    };
    let raw = &mut raw[..head + buf.len() + 2];
    bus.block(delay, raw)?;
    log::trace!("read page crc {:04x} {:02x?}", address, &raw[..]);

    if !crc16_frame_valid(0, raw) {
        return Err(Error::Crc16Mismatch(compute_crc16(0, raw)));
    }
    buf.copy_from_slice(&raw[head..head + buf.len()]);
    Ok(())
}
