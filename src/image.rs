use crate::error::{Fat12Error, Result};

pub const SECTOR_SIZE: usize = 512;
pub const SECTOR_COUNT: usize = 2880;
pub const IMAGE_SIZE: usize = SECTOR_SIZE * SECTOR_COUNT;

pub struct ImageBuffer {
    data: Box<[u8; IMAGE_SIZE]>,
}

impl ImageBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != IMAGE_SIZE {
            return Err(Fat12Error::InvalidBootSector(format!(
                "image must be exactly {} bytes, got {}",
                IMAGE_SIZE,
                bytes.len()
            )));
        }
        let mut data = Box::new([0u8; IMAGE_SIZE]);
        data.copy_from_slice(&bytes);
        Ok(ImageBuffer { data })
    }

    pub fn blank() -> Self {
        ImageBuffer {
            data: Box::new([0u8; IMAGE_SIZE]),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    fn check_range(start: u32, count: u32) -> Result<()> {
        let end = start as u64 + count as u64;
        if end > SECTOR_COUNT as u64 {
            return Err(Fat12Error::SectorOutOfRange);
        }
        Ok(())
    }

    pub fn read_sectors(&self, start: u32, count: u32) -> Result<&[u8]> {
        Self::check_range(start, count)?;
        let off = start as usize * SECTOR_SIZE;
        let len = count as usize * SECTOR_SIZE;
        Ok(&self.data[off..off + len])
    }

    pub fn write_sectors(&mut self, start: u32, bytes: &[u8]) -> Result<()> {
        let count = (bytes.len() / SECTOR_SIZE) as u32;
        if bytes.len() % SECTOR_SIZE != 0 {
            return Err(Fat12Error::SectorOutOfRange);
        }
        Self::check_range(start, count)?;
        let off = start as usize * SECTOR_SIZE;
        self.data[off..off + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_image_is_full_size() {
        let img = ImageBuffer::blank();
        assert_eq!(img.as_bytes().len(), IMAGE_SIZE);
    }

    #[test]
    fn rejects_wrong_size() {
        assert!(ImageBuffer::from_bytes(vec![0u8; 10]).is_err());
    }

    #[test]
    fn read_write_roundtrip() {
        let mut img = ImageBuffer::blank();
        let sector = [0xAAu8; SECTOR_SIZE];
        img.write_sectors(5, &sector).unwrap();
        assert_eq!(img.read_sectors(5, 1).unwrap(), &sector[..]);
    }

    #[test]
    fn out_of_range_rejected() {
        let img = ImageBuffer::blank();
        assert!(img.read_sectors(2879, 2).is_err());
    }
}
