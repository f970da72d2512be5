use anyhow::{anyhow,Result};

pub fn bytes_be_to_uint32(bytes: &[u8]) -> Result<u32> {
    if bytes.len() < 4 {
        return Err(anyhow!("ERROR: bytes_be_to_uint32: bytes.len() < 4"));
    }
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub fn bytes_be_to_uint16(bytes: &[u8]) -> Result<u16> {
    if bytes.len() < 2 {
        return Err(anyhow!("ERROR: bytes_be_to_uint16: bytes.len() < 2"));
    }
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_endian_words() {
        assert_eq!(bytes_be_to_uint32(&[0x12, 0x34, 0x56, 0x78, 0xFF]).unwrap(), 0x1234_5678);
        assert_eq!(bytes_be_to_uint16(&[0x0A, 0x28]).unwrap(), 2600);
        assert!(bytes_be_to_uint32(&[0x00, 0x01]).is_err());
    }
}
