use byteorder::{ByteOrder, LittleEndian};

/// Value the CRC16 register holds after running over a frame that ends with
/// its own inverted CRC16 (little endian).
pub const CRC16_RESIDUE: u16 = 0xB001;

pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// 1-Wire CRC16 (x^16 + x^15 + x^2 + 1, shifted out LSB first)
pub fn compute_crc16(seed: u16, data: &[u8]) -> u16 {
    let mut crc = seed;
    for byte in data.iter() {
        crc ^= *byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Returns `true` when `frame` carries its own inverted CRC16 in the last two bytes.
pub fn crc16_frame_valid(seed: u16, frame: &[u8]) -> bool {
    compute_crc16(seed, frame) == CRC16_RESIDUE
}

/// Inverted CRC16 as the devices put it on the wire
pub fn crc16_trailer(seed: u16, data: &[u8]) -> [u8; 2] {
    let mut trailer = [0u8; 2];
    LittleEndian::write_u16(&mut trailer, !compute_crc16(seed, data));
    trailer
}
