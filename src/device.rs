use crate::{Address, Error};
use core::fmt::Debug;

/// Generic device interface
pub trait Device: Sized {
    /// Device family code
    const FAMILY_CODE: u8;

    /// Part number
    const NAME: &'static str;

    /// One line summary of the part
    const DESCRIPTION: &'static str;

    /// Get device address
    fn address(&self) -> &Address;

    /// Instantiate device using address without checks
    ///
    /// # Safety
    ///
    /// This is marked as unsafe because it does not check whether the given address
    /// is compatible with a specific device. It assumes so.
    unsafe fn from_address_unchecked(address: Address) -> Self;

    /// Instantiate device from address
    fn from_address<E: Sized + Debug>(address: Address) -> Result<Self, Error<E>> {
        if address.family_code() != Self::FAMILY_CODE {
            Err(Error::FamilyCodeMismatch(
                Self::FAMILY_CODE,
                address.family_code(),
            ))
        } else {
            Ok(unsafe { Self::from_address_unchecked(address) })
        }
    }
}
