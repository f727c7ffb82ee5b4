use std::fs;
use std::path::Path;

use log::info;

use crate::boot::{default_bpb, Bpb, Layout};
use crate::error::Result;
use crate::fat::FatTable;
use crate::image::{ImageBuffer, IMAGE_SIZE};

#[derive(Debug, Clone)]
pub struct WorkingDir {
    pub cluster: u16,
    pub abs_path: String,
}

impl WorkingDir {
    pub fn root() -> Self {
        WorkingDir {
            cluster: 0,
            abs_path: "/".to_string(),
        }
    }
}

pub struct ImageInfo {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub num_fats: u32,
    pub root_entry_count: u32,
    pub total_clusters: u32,
    pub bootable: bool,
}

// Path Ops never touch the filesystem directly; only load/save do.
pub struct Session {
    pub image: ImageBuffer,
    pub bpb: Bpb,
    pub layout: Layout,
    pub fat: FatTable,
    pub cwd: WorkingDir,
    dirty: bool,
}

impl Session {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let image = ImageBuffer::from_bytes(bytes)?;
        let bpb = Bpb::parse(image.read_sectors(0, 1)?)?;
        let layout = bpb.to_layout()?;
        let fat = FatTable::load(&image, &layout)?;
        info!(
            "loaded image: {} clusters, {} FAT copies",
            layout.total_clusters, layout.num_fats
        );
        Ok(Session {
            image,
            bpb,
            layout,
            fat,
            cwd: WorkingDir::root(),
            dirty: false,
        })
    }

    pub fn blank() -> Self {
        let bpb = default_bpb();
        let layout = bpb.to_layout().unwrap();
        let mut image = ImageBuffer::blank();
        let mut sector0 = vec![0u8; 512];
        sector0[11..13].copy_from_slice(&bpb.bytes_per_sec.to_le_bytes());
        sector0[13] = bpb.sec_per_clus;
        sector0[14..16].copy_from_slice(&bpb.rsvd_sec_cnt.to_le_bytes());
        sector0[16] = bpb.num_fats;
        sector0[17..19].copy_from_slice(&bpb.root_ent_cnt.to_le_bytes());
        sector0[19..21].copy_from_slice(&bpb.tot_sec16.to_le_bytes());
        sector0[21] = bpb.media;
        sector0[22..24].copy_from_slice(&bpb.fat_sz16.to_le_bytes());
        sector0[510] = 0x55;
        sector0[511] = 0xAA;
        image.write_sectors(0, &sector0).unwrap();
        let fat = FatTable::load(&image, &layout).unwrap();
        Session {
            image,
            bpb,
            layout,
            fat,
            cwd: WorkingDir::root(),
            dirty: false,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        debug_assert_eq!(self.image.as_bytes().len(), IMAGE_SIZE);
        fs::write(path, self.image.as_bytes())?;
        info!("saved image to {}", path.display());
        Ok(())
    }

    pub fn info(&self) -> ImageInfo {
        ImageInfo {
            bytes_per_sector: self.layout.bytes_per_sector,
            sectors_per_cluster: self.layout.sectors_per_cluster,
            num_fats: self.layout.num_fats,
            root_entry_count: self.layout.root_entry_count,
            total_clusters: self.layout.total_clusters,
            bootable: Bpb::bootable(self.image.read_sectors(0, 1).unwrap()),
        }
    }

    pub fn bootable(&self) -> bool {
        Bpb::bootable(self.image.read_sectors(0, 1).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_session_is_not_dirty() {
        let session = Session::blank();
        assert!(!session.is_dirty());
        assert_eq!(session.cwd.abs_path, "/");
    }

    #[test]
    fn save_without_mutation_is_a_noop() {
        let session = Session::blank();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floppy.img");
        session.save(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn load_save_roundtrip_preserves_bytes() {
        let session = Session::blank();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("floppy.img");
        let mut dirty_session = session;
        dirty_session.mark_dirty();
        dirty_session.save(&path).unwrap();
        let reloaded = Session::load(&path).unwrap();
        assert_eq!(reloaded.image.as_bytes(), dirty_session.image.as_bytes());
    }
}
