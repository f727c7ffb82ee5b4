use log::{debug, trace};

use crate::boot::Layout;
use crate::error::{Fat12Error, Result};
use crate::fat::FatTable;
use crate::image::ImageBuffer;

// First-fit ascending scan from cluster 2. If pre_cluster != 0 the new
// chain is linked onto the end of an existing one instead of returned bare;
// used when a directory outgrows its last cluster. Leaves the FAT untouched
// on NoSpace.
pub fn allocate(
    fat: &mut FatTable,
    image: &mut ImageBuffer,
    layout: &Layout,
    count: u32,
    pre_cluster: u16,
) -> Result<u16> {
    if count == 0 {
        return Err(Fat12Error::OutOfRange);
    }

    let mut free = Vec::with_capacity(count as usize);
    for cluster in 2..layout.total_clusters as u16 {
        if FatTable::is_free(fat.get(cluster, layout)?) {
            free.push(cluster);
            if free.len() as u32 == count {
                break;
            }
        }
    }
    if free.len() as u32 != count {
        debug!(
            "allocate: wanted {} clusters, only {} free",
            count,
            free.len()
        );
        return Err(Fat12Error::NoSpace);
    }

    for window in free.windows(2) {
        fat.set(window[0], window[1], layout)?;
    }
    fat.set(*free.last().unwrap(), 0xFFF, layout)?;

    let head = free[0];
    if pre_cluster != 0 {
        fat.set(pre_cluster, head, layout)?;
    }

    let zero_cluster = vec![0u8; layout.bytes_per_cluster as usize];
    for &cluster in &free {
        let sector = layout.cluster_to_sector(cluster);
        image.write_sectors(sector, &zero_cluster)?;
    }

    fat.commit(image, layout)?;
    trace!("allocate: chain head={} clusters={:?}", head, free);
    Ok(head)
}

// head == 0 is a no-op.
pub fn free_chain(
    fat: &mut FatTable,
    image: &mut ImageBuffer,
    layout: &Layout,
    head: u16,
) -> Result<()> {
    if head == 0 {
        return Ok(());
    }
    let chain = fat.walk_chain(head, layout)?;
    for cluster in chain.iter() {
        fat.set(*cluster, 0x000, layout)?;
    }
    fat.commit(image, layout)?;
    trace!("free_chain: freed {:?}", chain);
    Ok(())
}
