//! CRC-8 (polynomial 0x07) used for the configuration checksum register

const fn crc8_update(mut crc: u8, data: u8) -> u8 {
    crc ^= data;
    let mut i = 0;
    while i < 8 {
        crc = if crc & 0x80 != 0 {
            (crc << 1) ^ 0x07
        } else {
            crc << 1
        };
        i += 1;
    }
    crc
}

/// CRC-8 over a byte slice, initial value 0
pub fn compute_crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0;
    for &b in bytes {
        crc = crc8_update(crc, b);
    }
    crc
}
