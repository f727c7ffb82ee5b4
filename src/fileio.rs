use crate::boot::Layout;
use crate::entry::RawEntry;
use crate::error::{Fat12Error, Result};
use crate::fat::FatTable;
use crate::image::ImageBuffer;

fn expected_cluster_count(size: u32, bytes_per_cluster: u32) -> u32 {
    if size == 0 {
        0
    } else {
        (size + bytes_per_cluster - 1) / bytes_per_cluster
    }
}

pub fn read_all(
    image: &ImageBuffer,
    layout: &Layout,
    fat: &FatTable,
    entry: &RawEntry,
) -> Result<Vec<u8>> {
    if entry.file_size == 0 {
        return Ok(Vec::new());
    }
    let chain = fat.walk_chain(entry.first_cluster, layout)?;
    let expected = expected_cluster_count(entry.file_size, layout.bytes_per_cluster);
    if chain.len() as u32 != expected {
        return Err(Fat12Error::Inconsistent);
    }

    let mut out = Vec::with_capacity(entry.file_size as usize);
    let tail = entry.file_size % layout.bytes_per_cluster;
    let tail_len = if tail == 0 {
        layout.bytes_per_cluster
    } else {
        tail
    };

    for (i, &cluster) in chain.iter().enumerate() {
        let sector = layout.cluster_to_sector(cluster);
        let data = image.read_sectors(sector, layout.sectors_per_cluster)?;
        if i + 1 == chain.len() {
            out.extend_from_slice(&data[..tail_len as usize]);
        } else {
            out.extend_from_slice(data);
        }
    }
    Ok(out)
}

// Caller has already allocated a chain of exactly the required length and
// stored its head in entry.first_cluster.
pub fn write_all(
    image: &mut ImageBuffer,
    layout: &Layout,
    fat: &FatTable,
    entry: &RawEntry,
    data: &[u8],
) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let chain = fat.walk_chain(entry.first_cluster, layout)?;
    let expected = expected_cluster_count(data.len() as u32, layout.bytes_per_cluster);
    if chain.len() as u32 != expected {
        return Err(Fat12Error::Inconsistent);
    }

    let bpc = layout.bytes_per_cluster as usize;
    for (i, &cluster) in chain.iter().enumerate() {
        let sector = layout.cluster_to_sector(cluster);
        let start = i * bpc;
        let end = (start + bpc).min(data.len());
        let mut buf = vec![0u8; bpc];
        buf[..end - start].copy_from_slice(&data[start..end]);
        image.write_sectors(sector, &buf)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc;
    use crate::boot::default_bpb;
    use crate::entry::ATTR_ARCHIVE;

    fn fresh() -> (ImageBuffer, Layout, FatTable) {
        let bpb = default_bpb();
        let layout = bpb.to_layout().unwrap();
        let image = ImageBuffer::blank();
        let fat = FatTable::load(&image, &layout).unwrap();
        (image, layout, fat)
    }

    #[test]
    fn write_then_read_roundtrip_multi_cluster() {
        let (mut image, layout, mut fat) = fresh();
        let data = vec![0x42u8; (layout.bytes_per_cluster * 2 + 10) as usize];
        let count = expected_cluster_count(data.len() as u32, layout.bytes_per_cluster);
        let head = alloc::allocate(&mut fat, &mut image, &layout, count, 0).unwrap();
        let entry = RawEntry {
            short_name: *b"BIG     DAT",
            attr: ATTR_ARCHIVE,
            reserved: [0; 10],
            write_time: 0,
            write_date: 0,
            first_cluster: head,
            file_size: data.len() as u32,
        };
        write_all(&mut image, &layout, &fat, &entry, &data).unwrap();
        let back = read_all(&image, &layout, &fat, &entry).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn read_empty_file_is_empty() {
        let (image, layout, fat) = fresh();
        let entry = RawEntry {
            short_name: *b"EMPTY      ",
            attr: ATTR_ARCHIVE,
            reserved: [0; 10],
            write_time: 0,
            write_date: 0,
            first_cluster: 0,
            file_size: 0,
        };
        assert_eq!(read_all(&image, &layout, &fat, &entry).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn chain_size_mismatch_is_inconsistent() {
        let (mut image, layout, mut fat) = fresh();
        let head = alloc::allocate(&mut fat, &mut image, &layout, 1, 0).unwrap();
        let entry = RawEntry {
            short_name: *b"BAD     DAT",
            attr: ATTR_ARCHIVE,
            reserved: [0; 10],
            write_time: 0,
            write_date: 0,
            first_cluster: head,
            file_size: (layout.bytes_per_cluster * 5) as u32,
        };
        assert!(matches!(
            read_all(&image, &layout, &fat, &entry),
            Err(Fat12Error::Inconsistent)
        ));
    }
}
