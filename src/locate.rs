use crate::boot::Layout;
use crate::dir::scan_dir;
use crate::entry::{synthetic_root, EntryPosition, RawEntry};
use crate::error::{Fat12Error, Result};
use crate::fat::FatTable;
use crate::image::ImageBuffer;
use crate::name::to_short;

pub enum Located {
    Root,
    Entry(RawEntry, EntryPosition),
}

impl Located {
    pub fn entry(&self) -> RawEntry {
        match self {
            Located::Root => synthetic_root(),
            Located::Entry(e, _) => e.clone(),
        }
    }

    pub fn cluster(&self) -> u16 {
        match self {
            Located::Root => 0,
            Located::Entry(e, _) => e.first_cluster,
        }
    }
}

// VOLUME_LABEL entries show up in listings but are never a valid lookup
// target, so they're filtered out here rather than in dir.rs.
pub fn locate_by_name(
    image: &ImageBuffer,
    layout: &Layout,
    fat: &FatTable,
    parent_clus: u16,
    user_name: &str,
) -> Result<(RawEntry, EntryPosition)> {
    let target = to_short(user_name)?;
    let slots = scan_dir(image, layout, fat, parent_clus)?;
    for slot in slots {
        if slot.entry.is_volume_label() {
            continue;
        }
        if slot.entry.short_name == target {
            return Ok((slot.entry, slot.position));
        }
    }
    Err(Fat12Error::NotFound)
}

pub struct ParsedPath {
    pub absolute: bool,
    pub components: Vec<String>,
    pub trailing_slash: bool,
}

pub fn parse_path(path: &str) -> Result<ParsedPath> {
    if path.is_empty() {
        return Err(Fat12Error::IllegalPath);
    }
    if path.contains("//") {
        return Err(Fat12Error::IllegalPath);
    }

    if path == "/" {
        return Ok(ParsedPath {
            absolute: true,
            components: Vec::new(),
            trailing_slash: false,
        });
    }

    let absolute = path.starts_with('/');
    let trailing_slash = path.ends_with('/');

    let mut components = Vec::new();
    for part in path.split('/') {
        if part.is_empty() {
            continue;
        }
        if part.len() > 255 {
            return Err(Fat12Error::IllegalPath);
        }
        components.push(part.to_string());
    }

    Ok(ParsedPath {
        absolute,
        components,
        trailing_slash,
    })
}

pub fn locate_by_path(
    image: &ImageBuffer,
    layout: &Layout,
    fat: &FatTable,
    start_clus: u16,
    path: &str,
) -> Result<Located> {
    let parsed = parse_path(path)?;
    if parsed.components.is_empty() {
        if path == "/" {
            return Ok(Located::Root);
        }
        return Err(Fat12Error::IllegalPath);
    }

    let mut current_clus = if parsed.absolute { 0 } else { start_clus };
    let last_idx = parsed.components.len() - 1;

    for (i, component) in parsed.components.iter().enumerate() {
        let (entry, position) = locate_by_name(image, layout, fat, current_clus, component)?;
        let is_last = i == last_idx;

        if !is_last && !entry.is_directory() {
            return Err(Fat12Error::WrongKind {
                expected: "directory",
                found: "file",
            });
        }
        if is_last && parsed.trailing_slash && !entry.is_directory() {
            return Err(Fat12Error::IllegalPath);
        }

        if is_last {
            return Ok(Located::Entry(entry, position));
        }
        current_clus = entry.first_cluster;
    }

    unreachable!("loop always returns on the last component")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_path() {
        assert!(parse_path("").is_err());
    }

    #[test]
    fn rejects_double_slash() {
        assert!(parse_path("/a//b").is_err());
    }

    #[test]
    fn rejects_oversize_component() {
        let long = "a".repeat(256);
        assert!(parse_path(&long).is_err());
    }

    #[test]
    fn root_alone_parses_with_no_components() {
        let parsed = parse_path("/").unwrap();
        assert!(parsed.components.is_empty());
        assert!(parsed.absolute);
    }

    #[test]
    fn trailing_slash_flagged() {
        let parsed = parse_path("/a/b/").unwrap();
        assert!(parsed.trailing_slash);
        assert_eq!(parsed.components, vec!["a", "b"]);
    }

    #[test]
    fn relative_path_has_no_leading_slash() {
        let parsed = parse_path("a/b").unwrap();
        assert!(!parsed.absolute);
        assert_eq!(parsed.components, vec!["a", "b"]);
    }
}
