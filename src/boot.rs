use crate::error::{Fat12Error, Result};
use crate::image::SECTOR_SIZE;

#[derive(Debug, Clone)]
pub struct Bpb {
    pub bytes_per_sec: u16,
    pub sec_per_clus: u8,
    pub rsvd_sec_cnt: u16,
    pub num_fats: u8,
    pub root_ent_cnt: u16,
    pub tot_sec16: u16,
    pub media: u8,
    pub fat_sz16: u16,
    pub sec_per_trk: u16,
    pub num_heads: u16,
    pub hidd_sec: u32,
    pub tot_sec32: u32,
}

impl Bpb {
    // Byte-wise decode only; never cast sector0 to a struct pointer, host
    // alignment and endianness must not leak into this.
    pub fn parse(sector0: &[u8]) -> Result<Self> {
        if sector0.len() < SECTOR_SIZE {
            return Err(Fat12Error::InvalidBootSector(format!(
                "boot sector too short: {} bytes",
                sector0.len()
            )));
        }
        let u16_at = |off: usize| u16::from_le_bytes([sector0[off], sector0[off + 1]]);
        let u32_at = |off: usize| {
            u32::from_le_bytes([
                sector0[off],
                sector0[off + 1],
                sector0[off + 2],
                sector0[off + 3],
            ])
        };

        Ok(Bpb {
            bytes_per_sec: u16_at(11),
            sec_per_clus: sector0[13],
            rsvd_sec_cnt: u16_at(14),
            num_fats: sector0[16],
            root_ent_cnt: u16_at(17),
            tot_sec16: u16_at(19),
            media: sector0[21],
            fat_sz16: u16_at(22),
            sec_per_trk: u16_at(24),
            num_heads: u16_at(26),
            hidd_sec: u32_at(28),
            tot_sec32: u32_at(32),
        })
    }

    pub fn bootable(sector0: &[u8]) -> bool {
        sector0.len() >= SECTOR_SIZE && sector0[510] == 0x55 && sector0[511] == 0xAA
    }

    pub fn total_sectors(&self) -> u32 {
        if self.tot_sec16 != 0 {
            self.tot_sec16 as u32
        } else {
            self.tot_sec32
        }
    }

    pub fn to_layout(&self) -> Result<Layout> {
        if self.bytes_per_sec as usize != SECTOR_SIZE {
            return Err(Fat12Error::InvalidBootSector(format!(
                "unsupported bytes-per-sector: {}",
                self.bytes_per_sec
            )));
        }
        if self.sec_per_clus == 0 {
            return Err(Fat12Error::InvalidBootSector(
                "sectors-per-cluster is zero".into(),
            ));
        }

        let bytes_per_cluster = self.bytes_per_sec as u32 * self.sec_per_clus as u32;
        let fat_start_sector = self.rsvd_sec_cnt as u32;
        let fat_size_sectors = self.fat_sz16 as u32;
        let root_start_sector = fat_start_sector + self.num_fats as u32 * fat_size_sectors;
        let root_sector_count = ((self.root_ent_cnt as u32 * 32)
            + (self.bytes_per_sec as u32 - 1))
            / self.bytes_per_sec as u32;
        let data_start_sector = root_start_sector + root_sector_count;

        let total_sectors = self.total_sectors();
        let data_sectors = total_sectors.saturating_sub(data_start_sector);
        let total_clusters = 2 + data_sectors / self.sec_per_clus as u32;

        Ok(Layout {
            bytes_per_sector: self.bytes_per_sec as u32,
            sectors_per_cluster: self.sec_per_clus as u32,
            bytes_per_cluster,
            num_fats: self.num_fats as u32,
            fat_start_sector,
            fat_size_sectors,
            root_start_sector,
            root_sector_count,
            root_entry_count: self.root_ent_cnt as u32,
            data_start_sector,
            total_clusters,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster: u32,
    pub num_fats: u32,
    pub fat_start_sector: u32,
    pub fat_size_sectors: u32,
    pub root_start_sector: u32,
    pub root_sector_count: u32,
    pub root_entry_count: u32,
    pub data_start_sector: u32,
    pub total_clusters: u32,
}

impl Layout {
    pub fn cluster_to_sector(&self, cluster: u16) -> u32 {
        self.data_start_sector + (cluster as u32 - 2) * self.sectors_per_cluster
    }

    pub fn entries_per_cluster(&self) -> u32 {
        self.bytes_per_cluster / 32
    }
}

pub fn default_bpb() -> Bpb {
    Bpb {
        bytes_per_sec: SECTOR_SIZE as u16,
        sec_per_clus: 1,
        rsvd_sec_cnt: 1,
        num_fats: 2,
        root_ent_cnt: 224,
        tot_sec16: 2880,
        media: 0xF0,
        fat_sz16: 9,
        sec_per_trk: 18,
        num_heads: 2,
        hidd_sec: 0,
        tot_sec32: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_sector0() -> Vec<u8> {
        let bpb = default_bpb();
        let mut sector = vec![0u8; SECTOR_SIZE];
        sector[11..13].copy_from_slice(&bpb.bytes_per_sec.to_le_bytes());
        sector[13] = bpb.sec_per_clus;
        sector[14..16].copy_from_slice(&bpb.rsvd_sec_cnt.to_le_bytes());
        sector[16] = bpb.num_fats;
        sector[17..19].copy_from_slice(&bpb.root_ent_cnt.to_le_bytes());
        sector[19..21].copy_from_slice(&bpb.tot_sec16.to_le_bytes());
        sector[21] = bpb.media;
        sector[22..24].copy_from_slice(&bpb.fat_sz16.to_le_bytes());
        sector[510] = 0x55;
        sector[511] = 0xAA;
        sector
    }

    #[test]
    fn parses_standard_144_geometry() {
        let sector0 = blank_sector0();
        let bpb = Bpb::parse(&sector0).unwrap();
        assert_eq!(bpb.bytes_per_sec, 512);
        assert_eq!(bpb.num_fats, 2);
        assert_eq!(bpb.root_ent_cnt, 224);
        assert!(Bpb::bootable(&sector0));
    }

    #[test]
    fn derives_expected_layout() {
        let bpb = Bpb::parse(&blank_sector0()).unwrap();
        let layout = bpb.to_layout().unwrap();
        assert_eq!(layout.fat_start_sector, 1);
        assert_eq!(layout.root_start_sector, 1 + 2 * 9);
        // root region: 224 * 32 / 512 = 14 sectors
        assert_eq!(layout.root_sector_count, 14);
        assert_eq!(layout.data_start_sector, 1 + 18 + 14);
    }

    #[test]
    fn cluster_to_sector_starts_at_two() {
        let bpb = Bpb::parse(&blank_sector0()).unwrap();
        let layout = bpb.to_layout().unwrap();
        assert_eq!(layout.cluster_to_sector(2), layout.data_start_sector);
        assert_eq!(layout.cluster_to_sector(3), layout.data_start_sector + 1);
    }
}
