use crate::alloc;
use crate::boot::Layout;
use crate::entry::{EntryPosition, RawEntry};
use crate::error::{Fat12Error, Result};
use crate::fat::FatTable;
use crate::image::ImageBuffer;

// Non-root directories grow by one cluster when no slot is free; root has
// fixed capacity and fails with RootFull.
pub fn append(
    image: &mut ImageBuffer,
    layout: &Layout,
    fat: &mut FatTable,
    parent_clus: u16,
    entry: &RawEntry,
) -> Result<EntryPosition> {
    if parent_clus == 0 {
        for sector_idx in 0..layout.root_sector_count {
            let sector = layout.root_start_sector + sector_idx;
            let mut data = image.read_sectors(sector, 1)?.to_vec();
            let entries_per_sector = data.len() / 32;
            for i in 0..entries_per_sector {
                let off = i * 32;
                if RawEntry::is_free(&data[off..off + 32]) || RawEntry::is_deleted(&data[off..off + 32]) {
                    data[off..off + 32].copy_from_slice(&entry.encode());
                    image.write_sectors(sector, &data)?;
                    return Ok(EntryPosition { sector, offset: off });
                }
            }
        }
        return Err(Fat12Error::RootFull);
    }

    let chain = fat.walk_chain(parent_clus, layout)?;
    let entries_per_cluster = layout.entries_per_cluster();
    for &cluster in &chain {
        let sector0 = layout.cluster_to_sector(cluster);
        let mut data = image
            .read_sectors(sector0, layout.sectors_per_cluster)?
            .to_vec();
        for i in 0..entries_per_cluster as usize {
            let off = i * 32;
            if RawEntry::is_free(&data[off..off + 32]) || RawEntry::is_deleted(&data[off..off + 32]) {
                data[off..off + 32].copy_from_slice(&entry.encode());
                image.write_sectors(sector0, &data)?;
                let sector = sector0 + (off / 512) as u32;
                let offset = off % 512;
                return Ok(EntryPosition { sector, offset });
            }
        }
    }

    // Chain exhausted: extend with one freshly zeroed cluster.
    let last = *chain.last().unwrap();
    let new_cluster = alloc::allocate(fat, image, layout, 1, last)?;
    let sector0 = layout.cluster_to_sector(new_cluster);
    let mut data = image
        .read_sectors(sector0, layout.sectors_per_cluster)?
        .to_vec();
    data[0..32].copy_from_slice(&entry.encode());
    image.write_sectors(sector0, &data)?;
    Ok(EntryPosition {
        sector: sector0,
        offset: 0,
    })
}

pub fn mark_deleted(image: &mut ImageBuffer, position: EntryPosition) -> Result<()> {
    let mut sector = image.read_sectors(position.sector, 1)?.to_vec();
    sector[position.offset] = 0xE5;
    image.write_sectors(position.sector, &sector)?;
    Ok(())
}

pub fn write_at(image: &mut ImageBuffer, position: EntryPosition, entry: &RawEntry) -> Result<()> {
    let mut sector = image.read_sectors(position.sector, 1)?.to_vec();
    sector[position.offset..position.offset + 32].copy_from_slice(&entry.encode());
    image.write_sectors(position.sector, &sector)?;
    Ok(())
}
