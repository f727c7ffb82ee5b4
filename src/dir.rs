use crate::boot::Layout;
use crate::entry::{EntryPosition, RawEntry};
use crate::error::Result;
use crate::fat::FatTable;
use crate::image::ImageBuffer;

pub struct ScanSlot {
    pub entry: RawEntry,
    pub position: EntryPosition,
}

// Stops at the first 0x00 terminator; later slots are unused and must not be
// read. 0xE5 entries are skipped but do not terminate the scan. The
// intra-cluster index is reset to 0 on every cluster load, root and
// non-root alike.
pub fn scan_dir(
    image: &ImageBuffer,
    layout: &Layout,
    fat: &FatTable,
    clus: u16,
) -> Result<Vec<ScanSlot>> {
    let mut slots = Vec::new();

    if clus == 0 {
        'outer: for sector_idx in 0..layout.root_sector_count {
            let sector = layout.root_start_sector + sector_idx;
            let data = image.read_sectors(sector, 1)?;
            let mut i = 0usize;
            let entries_per_sector = data.len() / 32;
            while i < entries_per_sector {
                let off = i * 32;
                let raw = &data[off..off + 32];
                if RawEntry::is_free(raw) {
                    break 'outer;
                }
                if !RawEntry::is_deleted(raw) {
                    slots.push(ScanSlot {
                        entry: RawEntry::decode(raw),
                        position: EntryPosition { sector, offset: off },
                    });
                }
                i += 1;
            }
        }
        return Ok(slots);
    }

    let chain = fat.walk_chain(clus, layout)?;
    let entries_per_cluster = layout.entries_per_cluster();
    'clusters: for &cluster in &chain {
        let sector0 = layout.cluster_to_sector(cluster);
        let data = image.read_sectors(sector0, layout.sectors_per_cluster)?;
        let mut i = 0usize; // reset on every cluster load
        while (i as u32) < entries_per_cluster {
            let off = i * 32;
            let raw = &data[off..off + 32];
            if RawEntry::is_free(raw) {
                break 'clusters;
            }
            if !RawEntry::is_deleted(raw) {
                let sector_within = sector0 + (off / 512) as u32;
                let offset_in_sector = off % 512;
                slots.push(ScanSlot {
                    entry: RawEntry::decode(raw),
                    position: EntryPosition {
                        sector: sector_within,
                        offset: offset_in_sector,
                    },
                });
            }
            i += 1;
        }
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boot::default_bpb;
    use crate::entry::{ATTR_ARCHIVE, DELETED_MARKER};

    fn fresh() -> (ImageBuffer, Layout, FatTable) {
        let bpb = default_bpb();
        let layout = bpb.to_layout().unwrap();
        let image = ImageBuffer::blank();
        let fat = FatTable::load(&image, &layout).unwrap();
        (image, layout, fat)
    }

    fn write_root_entry(image: &mut ImageBuffer, layout: &Layout, slot: u32, entry: &RawEntry) {
        let byte_off = slot as usize * 32;
        let sector = layout.root_start_sector + (byte_off / 512) as u32;
        let within = byte_off % 512;
        let mut sector_bytes = image.read_sectors(sector, 1).unwrap().to_vec();
        sector_bytes[within..within + 32].copy_from_slice(&entry.encode());
        image.write_sectors(sector, &sector_bytes).unwrap();
    }

    #[test]
    fn stops_at_first_free_terminator() {
        let (mut image, layout, fat) = fresh();
        let entry = RawEntry {
            short_name: *b"FOO        ",
            attr: ATTR_ARCHIVE,
            reserved: [0; 10],
            write_time: 0,
            write_date: 0,
            first_cluster: 0,
            file_size: 0,
        };
        write_root_entry(&mut image, &layout, 0, &entry);
        let slots = scan_dir(&image, &layout, &fat, 0).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].entry.display_name(), "FOO");
    }

    #[test]
    fn skips_deleted_but_keeps_scanning() {
        let (mut image, layout, fat) = fresh();
        let live = RawEntry {
            short_name: *b"BAR        ".clone(),
            attr: ATTR_ARCHIVE,
            reserved: [0; 10],
            write_time: 0,
            write_date: 0,
            first_cluster: 0,
            file_size: 0,
        };
        let mut deleted_bytes = live.encode();
        deleted_bytes[0] = DELETED_MARKER;
        let byte_off = 0usize;
        let sector = layout.root_start_sector;
        let mut sector_bytes = image.read_sectors(sector, 1).unwrap().to_vec();
        sector_bytes[byte_off..byte_off + 32].copy_from_slice(&deleted_bytes);
        image.write_sectors(sector, &sector_bytes).unwrap();
        write_root_entry(&mut image, &layout, 1, &live);

        let slots = scan_dir(&image, &layout, &fat, 0).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].entry.display_name(), "BAR");
    }
}
