#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

mod address;
mod bus;
mod command;
mod crc;
mod device;
mod driver;
#[cfg(feature = "ds1993")]
pub mod ds1993;
#[cfg(feature = "ds2431")]
pub mod ds2431;
#[cfg(feature = "ds2433")]
pub mod ds2433;
#[cfg(feature = "ds2502")]
pub mod ds2502;
#[cfg(feature = "ds28ec20")]
pub mod ds28ec20;
mod geometry;
mod iowire;
mod link;
mod memory;
mod otp;
mod paged;
mod result;
mod scratchpad;
#[cfg(test)]
mod sim;

pub use address::{Address, AddressError};
pub use bus::{Bus, Exclusive, PowerCondition, Speed};
pub use command::{Command, EpromCommands, MemoryCommands, OpCode};
pub use crc::{
    compute_crc16, compute_partial_crc8, crc16_frame_valid, crc16_trailer, CRC16_RESIDUE,
};
pub use device::Device;
pub use driver::Driver;
pub use geometry::{Access, Capabilities, Geometry, MAX_PAGE_LENGTH};
pub use iowire::{Inverted, IoWire};
pub use link::Link;
pub use memory::{Bank, BankIo, Memory, MemoryBank};
pub use otp::{
    LockScheme, OtpBank, OtpLayout, OtpMemory, PageState, RedirectScheme, EEPROM_WRITE_PROTECT,
};
pub use paged::PagedMemory;
pub use result::{Error, ErrorKind};
pub use scratchpad::{
    CopyMode, ExtraInfo, Flavor, Phase, Scratchpad, ScratchpadConfig, MAX_SCRATCHPAD,
};
