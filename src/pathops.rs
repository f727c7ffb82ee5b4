use log::{info, warn};

use crate::alloc;
use crate::dir::scan_dir;
use crate::dirmut;
use crate::entry::{
    RawEntry, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_VOLUME_LABEL,
};
use crate::error::{Fat12Error, Result};
use crate::fileio;
use crate::locate::{self, Located};
use crate::name::{self, to_short};
use crate::session::Session;
use crate::time::pack_now;

pub fn simplify_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    if stack.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", stack.join("/"))
    }
}

fn compose(cwd_abs: &str, path: &str) -> String {
    if path.starts_with('/') {
        simplify_path(path)
    } else {
        simplify_path(&format!("{}/{}", cwd_abs, path))
    }
}

fn reject_reserved(name: &str) -> Result<()> {
    if name == "." || name == ".." {
        Err(Fat12Error::ReservedName)
    } else {
        Ok(())
    }
}

pub fn is_ancestor(session: &Session, a: u16, b: u16) -> Result<bool> {
    if a == 0 {
        return Ok(true);
    }
    let mut cur = b;
    loop {
        if cur == a {
            return Ok(true);
        }
        if cur == 0 {
            return Ok(false);
        }
        let (dotdot, _) =
            locate::locate_by_name(&session.image, &session.layout, &session.fat, cur, "..")?;
        cur = dotdot.first_cluster;
    }
}

fn split_leaf_path(session: &Session, path: &str) -> Result<(u16, String)> {
    let (prefix, suffix) = match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    };
    if suffix.is_empty() {
        return Err(Fat12Error::IllegalPath);
    }
    let parent_clus = resolve_dir_prefix(session, prefix)?;
    Ok((parent_clus, suffix.to_string()))
}

fn resolve_dir_prefix(session: &Session, prefix: &str) -> Result<u16> {
    if prefix.is_empty() {
        return Ok(session.cwd.cluster);
    }
    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        prefix,
    )?;
    let entry = located.entry();
    if !entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "directory",
            found: "file",
        });
    }
    Ok(located.cluster())
}

// If des ends with '/' the name is inherited from src_name. If the suffix
// names an existing directory, the target becomes that directory plus
// src_name.
fn resolve_cp_destination(session: &Session, des: &str, src_name: &str) -> Result<(u16, String)> {
    let (prefix, suffix) = match des.rfind('/') {
        Some(idx) => (&des[..idx], &des[idx + 1..]),
        None => ("", des),
    };
    let dir_clus = resolve_dir_prefix(session, prefix)?;

    let name = if suffix.is_empty() {
        src_name.to_string()
    } else {
        suffix.to_string()
    };
    reject_reserved(&name)?;

    match locate::locate_by_name(&session.image, &session.layout, &session.fat, dir_clus, &name) {
        Ok((existing, _)) if existing.is_directory() => {
            reject_reserved(src_name)?;
            if locate::locate_by_name(
                &session.image,
                &session.layout,
                &session.fat,
                existing.first_cluster,
                src_name,
            )
            .is_ok()
            {
                return Err(Fat12Error::AlreadyExists);
            }
            Ok((existing.first_cluster, src_name.to_string()))
        }
        Ok(_) => Err(Fat12Error::AlreadyExists),
        Err(Fat12Error::NotFound) => Ok((dir_clus, name)),
        Err(e) => Err(e),
    }
}

fn new_file_entry(name: &str, size: u32, first_cluster: u16) -> Result<RawEntry> {
    let (time, date) = pack_now();
    Ok(RawEntry {
        short_name: to_short(name)?,
        attr: ATTR_ARCHIVE,
        reserved: [0; 10],
        write_time: time,
        write_date: date,
        first_cluster,
        file_size: size,
    })
}

pub fn list(session: &Session, dir_clus: u16, show_volume_label: bool) -> Result<Vec<RawEntry>> {
    let slots = scan_dir(&session.image, &session.layout, &session.fat, dir_clus)?;
    let mut entries: Vec<RawEntry> = slots
        .into_iter()
        .map(|s| s.entry)
        .filter(|e| show_volume_label || !e.is_volume_label())
        .collect();
    entries.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    Ok(entries)
}

fn sort_key(entry: &RawEntry) -> (u8, u8, [u8; 11]) {
    let primary = if entry.attr & ATTR_VOLUME_LABEL != 0 {
        0
    } else if entry.is_directory() {
        1
    } else {
        2
    };
    let secondary = if entry.is_directory() {
        match entry.short_name {
            n if &n == name::DOT => 0,
            n if &n == name::DOTDOT => 1,
            _ => 2,
        }
    } else {
        0
    };
    (primary, secondary, entry.short_name)
}

pub struct TreeNode {
    pub name: String,
    pub is_dir: bool,
    pub children: Vec<TreeNode>,
}

pub fn build_tree(session: &Session, dir_clus: u16) -> Result<Vec<TreeNode>> {
    let entries = list(session, dir_clus, false)?;
    let mut nodes = Vec::new();
    for entry in entries {
        if entry.attr & ATTR_VOLUME_LABEL != 0 {
            continue;
        }
        let display = entry.display_name();
        if display == "." || display == ".." {
            continue;
        }
        let children = if entry.is_directory() {
            build_tree(session, entry.first_cluster)?
        } else {
            Vec::new()
        };
        nodes.push(TreeNode {
            name: display,
            is_dir: entry.is_directory(),
            children,
        });
    }
    Ok(nodes)
}

pub fn render_tree(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    render_tree_inner(nodes, "", &mut out);
    out
}

fn render_tree_inner(nodes: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        let last = i + 1 == nodes.len();
        let connector = if last { "└── " } else { "├── " };
        out.push_str(prefix);
        out.push_str(connector);
        out.push_str(&node.name);
        out.push('\n');
        let child_prefix = format!("{}{}", prefix, if last { "   " } else { "│  " });
        render_tree_inner(&node.children, &child_prefix, out);
    }
}

pub fn cd(session: &mut Session, path: &str) -> Result<()> {
    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        path,
    )?;
    let entry = located.entry();
    if !entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "directory",
            found: "file",
        });
    }
    let new_path = compose(&session.cwd.abs_path, path);
    session.cwd.cluster = located.cluster();
    session.cwd.abs_path = new_path;
    Ok(())
}

pub fn type_file(session: &Session, path: &str) -> Result<Vec<u8>> {
    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        path,
    )?;
    let entry = located.entry();
    if entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "file",
            found: "directory",
        });
    }
    fileio::read_all(&session.image, &session.layout, &session.fat, &entry)
}

pub fn cp(session: &mut Session, src: &str, des: &str) -> Result<()> {
    let (src_entry, _) = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        src,
    )
    .map(|l| (l.entry(), l.cluster()))?;
    if src_entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "file",
            found: "directory",
        });
    }

    let (parent_clus, target_name) =
        resolve_cp_destination(session, des, &src_entry.display_name())?;

    let data = fileio::read_all(&session.image, &session.layout, &session.fat, &src_entry)?;

    let cluster_count = if data.is_empty() {
        0
    } else {
        (data.len() as u32 + session.layout.bytes_per_cluster - 1) / session.layout.bytes_per_cluster
    };

    let head = if cluster_count == 0 {
        0
    } else {
        alloc::allocate(
            &mut session.fat,
            &mut session.image,
            &session.layout,
            cluster_count,
            0,
        )?
    };

    let new_entry = match new_file_entry(&target_name, data.len() as u32, head) {
        Ok(e) => e,
        Err(e) => {
            if head != 0 {
                let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, head);
            }
            return Err(e);
        }
    };

    if head != 0 {
        if let Err(e) = fileio::write_all(&mut session.image, &session.layout, &session.fat, &new_entry, &data) {
            let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, head);
            return Err(e);
        }
    }

    if let Err(e) = dirmut::append(&mut session.image, &session.layout, &mut session.fat, parent_clus, &new_entry) {
        if head != 0 {
            let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, head);
        }
        return Err(e);
    }

    session.mark_dirty();
    info!("cp: {} -> {} ({} bytes)", src, des, data.len());
    Ok(())
}

pub fn rm(session: &mut Session, path: &str) -> Result<()> {
    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        path,
    )?;
    let (entry, position) = match located {
        Located::Root => return Err(Fat12Error::RootProtected),
        Located::Entry(e, p) => (e, p),
    };
    if entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "file",
            found: "directory",
        });
    }
    alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, entry.first_cluster)?;
    dirmut::mark_deleted(&mut session.image, position)?;
    session.mark_dirty();
    Ok(())
}

fn create_directory(session: &mut Session, parent_clus: u16, name: &str) -> Result<(u16, crate::entry::EntryPosition)> {
    reject_reserved(name)?;
    if locate::locate_by_name(&session.image, &session.layout, &session.fat, parent_clus, name).is_ok() {
        return Err(Fat12Error::AlreadyExists);
    }

    let new_clus = alloc::allocate(&mut session.fat, &mut session.image, &session.layout, 1, 0)?;

    let (time, date) = pack_now();
    let dir_entry = RawEntry {
        short_name: match to_short(name) {
            Ok(n) => n,
            Err(e) => {
                let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, new_clus);
                return Err(e);
            }
        },
        attr: ATTR_DIRECTORY,
        reserved: [0; 10],
        write_time: time,
        write_date: date,
        first_cluster: new_clus,
        file_size: 0,
    };

    let position = match dirmut::append(&mut session.image, &session.layout, &mut session.fat, parent_clus, &dir_entry) {
        Ok(p) => p,
        Err(e) => {
            let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, new_clus);
            return Err(e);
        }
    };

    let dot = RawEntry {
        short_name: *name::DOT,
        attr: ATTR_DIRECTORY,
        reserved: [0; 10],
        write_time: time,
        write_date: date,
        first_cluster: new_clus,
        file_size: 0,
    };
    let dotdot = RawEntry {
        short_name: *name::DOTDOT,
        attr: ATTR_DIRECTORY,
        reserved: [0; 10],
        write_time: time,
        write_date: date,
        first_cluster: parent_clus,
        file_size: 0,
    };
    dirmut::append(&mut session.image, &session.layout, &mut session.fat, new_clus, &dot)?;
    dirmut::append(&mut session.image, &session.layout, &mut session.fat, new_clus, &dotdot)?;

    Ok((new_clus, position))
}

pub fn mkdir(session: &mut Session, path: &str) -> Result<u16> {
    let (parent_clus, name) = split_leaf_path(session, path)?;
    let (clus, _) = create_directory(session, parent_clus, &name)?;
    session.mark_dirty();
    Ok(clus)
}

fn teardown_subtree(session: &mut Session, clus: u16) -> Result<()> {
    let slots = scan_dir(&session.image, &session.layout, &session.fat, clus)?;
    for slot in slots {
        let display = slot.entry.display_name();
        if display == "." || display == ".." {
            continue;
        }
        if slot.entry.is_directory() {
            teardown_subtree(session, slot.entry.first_cluster)?;
        }
        alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, slot.entry.first_cluster)?;
    }
    Ok(())
}

pub fn rmdir(session: &mut Session, path: &str) -> Result<()> {
    let parsed = locate::parse_path(path)?;
    if parsed.components.is_empty() {
        return Err(Fat12Error::RootProtected);
    }
    let last = parsed.components.last().unwrap();
    if last == "." || last == ".." {
        return Err(Fat12Error::ReservedName);
    }

    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        path,
    )?;
    let (entry, position) = match located {
        Located::Root => return Err(Fat12Error::RootProtected),
        Located::Entry(e, p) => (e, p),
    };
    if !entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "directory",
            found: "file",
        });
    }

    teardown_subtree(session, entry.first_cluster)?;
    alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, entry.first_cluster)?;
    dirmut::mark_deleted(&mut session.image, position)?;
    session.mark_dirty();
    Ok(())
}

pub fn mv(session: &mut Session, src: &str, des: &str) -> Result<()> {
    let parsed = locate::parse_path(src)?;
    if parsed.components.is_empty() {
        return Err(Fat12Error::RootProtected);
    }
    if let Some(last) = parsed.components.last() {
        if last == "." || last == ".." {
            return Err(Fat12Error::ReservedName);
        }
    }

    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        src,
    )?;
    let (src_entry, src_position) = match located {
        Located::Root => return Err(Fat12Error::RootProtected),
        Located::Entry(e, p) => (e, p),
    };

    let (parent_clus, target_name) =
        resolve_cp_destination(session, des, &src_entry.display_name())?;

    if src_entry.is_directory() {
        if is_ancestor(session, src_entry.first_cluster, parent_clus)? {
            return Err(Fat12Error::ParentCycle);
        }
    }

    let (time, date) = pack_now();
    let mut new_entry = src_entry.clone();
    new_entry.short_name = to_short(&target_name)?;
    new_entry.write_time = time;
    new_entry.write_date = date;

    dirmut::mark_deleted(&mut session.image, src_position)?;

    match dirmut::append(&mut session.image, &session.layout, &mut session.fat, parent_clus, &new_entry) {
        Ok(_) => {
            session.mark_dirty();
            Ok(())
        }
        Err(e) => {
            warn!("mv: append failed, restoring source entry: {}", e);
            dirmut::write_at(&mut session.image, src_position, &src_entry)?;
            Err(e)
        }
    }
}

pub fn concat(session: &mut Session, src1: &str, src2: &str, des: &str) -> Result<()> {
    let e1 = locate::locate_by_path(&session.image, &session.layout, &session.fat, session.cwd.cluster, src1)?.entry();
    let e2 = locate::locate_by_path(&session.image, &session.layout, &session.fat, session.cwd.cluster, src2)?.entry();
    if e1.is_directory() || e2.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "file",
            found: "directory",
        });
    }

    let (parent_clus, name) = split_leaf_path(session, des)?;
    reject_reserved(&name)?;
    if locate::locate_by_name(&session.image, &session.layout, &session.fat, parent_clus, &name).is_ok() {
        return Err(Fat12Error::AlreadyExists);
    }

    let mut data = fileio::read_all(&session.image, &session.layout, &session.fat, &e1)?;
    data.extend(fileio::read_all(&session.image, &session.layout, &session.fat, &e2)?);

    let cluster_count = if data.is_empty() {
        0
    } else {
        (data.len() as u32 + session.layout.bytes_per_cluster - 1) / session.layout.bytes_per_cluster
    };
    let head = if cluster_count == 0 {
        0
    } else {
        alloc::allocate(&mut session.fat, &mut session.image, &session.layout, cluster_count, 0)?
    };

    let new_entry = new_file_entry(&name, data.len() as u32, head)?;

    if head != 0 {
        if let Err(e) = fileio::write_all(&mut session.image, &session.layout, &session.fat, &new_entry, &data) {
            let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, head);
            return Err(e);
        }
    }

    if let Err(e) = dirmut::append(&mut session.image, &session.layout, &mut session.fat, parent_clus, &new_entry) {
        if head != 0 {
            let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, head);
        }
        return Err(e);
    }

    session.mark_dirty();
    Ok(())
}

fn copy_tree(session: &mut Session, src_clus: u16, dest_clus: u16) -> Result<()> {
    let slots = scan_dir(&session.image, &session.layout, &session.fat, src_clus)?;
    for slot in slots {
        let display = slot.entry.display_name();
        if display == "." || display == ".." || slot.entry.is_volume_label() {
            continue;
        }
        if slot.entry.is_directory() {
            let (child_clus, _) = create_directory(session, dest_clus, &display)?;
            copy_tree(session, slot.entry.first_cluster, child_clus)?;
        } else {
            let data = fileio::read_all(&session.image, &session.layout, &session.fat, &slot.entry)?;
            let cluster_count = if data.is_empty() {
                0
            } else {
                (data.len() as u32 + session.layout.bytes_per_cluster - 1) / session.layout.bytes_per_cluster
            };
            let head = if cluster_count == 0 {
                0
            } else {
                alloc::allocate(&mut session.fat, &mut session.image, &session.layout, cluster_count, 0)?
            };
            let new_entry = new_file_entry(&display, data.len() as u32, head)?;
            if head != 0 {
                fileio::write_all(&mut session.image, &session.layout, &session.fat, &new_entry, &data)?;
            }
            dirmut::append(&mut session.image, &session.layout, &mut session.fat, dest_clus, &new_entry)?;
        }
    }
    Ok(())
}

pub fn cpdir(session: &mut Session, src: &str, des: &str) -> Result<()> {
    let located = locate::locate_by_path(
        &session.image,
        &session.layout,
        &session.fat,
        session.cwd.cluster,
        src,
    )?;
    let src_entry = located.entry();
    if !src_entry.is_directory() {
        return Err(Fat12Error::WrongKind {
            expected: "directory",
            found: "file",
        });
    }
    let src_clus = located.cluster();

    let (parent_clus, name) = split_leaf_path(session, des)?;
    let (dest_clus, dest_position) = create_directory(session, parent_clus, &name)?;

    if is_ancestor(session, src_clus, dest_clus)? {
        let _ = teardown_subtree(session, dest_clus);
        let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, dest_clus);
        let _ = dirmut::mark_deleted(&mut session.image, dest_position);
        return Err(Fat12Error::ParentCycle);
    }

    if let Err(e) = copy_tree(session, src_clus, dest_clus) {
        let _ = teardown_subtree(session, dest_clus);
        let _ = alloc::free_chain(&mut session.fat, &mut session.image, &session.layout, dest_clus);
        let _ = dirmut::mark_deleted(&mut session.image, dest_position);
        return Err(e);
    }

    session.mark_dirty();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn simplify_drops_dot_and_pops_dotdot() {
        assert_eq!(simplify_path("/a/./b/../c"), "/a/c");
        assert_eq!(simplify_path("/"), "/");
        assert_eq!(simplify_path("/a/.."), "/");
        assert_eq!(simplify_path("a/b"), "/a/b");
    }

    #[test]
    fn simplify_is_idempotent() {
        let p = simplify_path("/a/./b/../c/");
        assert_eq!(simplify_path(&p), p);
    }

    #[test]
    fn mkdir_then_cd_updates_handle() {
        let mut session = Session::blank();
        mkdir(&mut session, "a").unwrap();
        mkdir(&mut session, "a/b").unwrap();
        cd(&mut session, "/a/b").unwrap();
        assert_eq!(session.cwd.abs_path, "/a/b");
        cd(&mut session, "..").unwrap();
        assert_eq!(session.cwd.abs_path, "/a");
        cd(&mut session, "../..").unwrap();
        assert_eq!(session.cwd.abs_path, "/");
        assert_eq!(session.cwd.cluster, 0);
    }

    #[test]
    fn cp_produces_disjoint_chain_with_same_contents() {
        let mut session = Session::blank();
        let bpc = session.layout.bytes_per_cluster;
        let data = vec![0x7Au8; (bpc as usize * 2) + 50];
        let head = alloc::allocate(&mut session.fat, &mut session.image, &session.layout, 3, 0).unwrap();
        let entry = new_file_entry("x.txt", data.len() as u32, head).unwrap();
        fileio::write_all(&mut session.image, &session.layout, &session.fat, &entry, &data).unwrap();
        dirmut::append(&mut session.image, &session.layout, &mut session.fat, 0, &entry).unwrap();

        cp(&mut session, "x.txt", "y.txt").unwrap();

        let y = locate::locate_by_name(&session.image, &session.layout, &session.fat, 0, "y.txt").unwrap().0;
        let y_chain = session.fat.walk_chain(y.first_cluster, &session.layout).unwrap();
        let x_chain = session.fat.walk_chain(head, &session.layout).unwrap();
        assert!(y_chain.iter().all(|c| !x_chain.contains(c)));
        let y_bytes = fileio::read_all(&session.image, &session.layout, &session.fat, &y).unwrap();
        assert_eq!(y_bytes, data);
    }

    #[test]
    fn mv_into_own_descendant_rejected() {
        let mut session = Session::blank();
        mkdir(&mut session, "a").unwrap();
        mkdir(&mut session, "a/b").unwrap();
        let result = mv(&mut session, "a", "a/b");
        assert!(matches!(result, Err(Fat12Error::ParentCycle)));
    }

    #[test]
    fn rmdir_frees_nested_clusters() {
        let mut session = Session::blank();
        mkdir(&mut session, "a").unwrap();
        mkdir(&mut session, "a/b").unwrap();
        mkdir(&mut session, "a/b/c").unwrap();
        rmdir(&mut session, "a/b").unwrap();
        let result = locate::locate_by_path(&session.image, &session.layout, &session.fat, 0, "/a/b");
        assert!(matches!(result, Err(Fat12Error::NotFound)));
    }

    #[test]
    fn concat_joins_two_files() {
        let mut session = Session::blank();
        let head_u = alloc::allocate(&mut session.fat, &mut session.image, &session.layout, 1, 0).unwrap();
        let u_entry = new_file_entry("u", 5, head_u).unwrap();
        fileio::write_all(&mut session.image, &session.layout, &session.fat, &u_entry, b"hello").unwrap();
        dirmut::append(&mut session.image, &session.layout, &mut session.fat, 0, &u_entry).unwrap();

        let head_v = alloc::allocate(&mut session.fat, &mut session.image, &session.layout, 1, 0).unwrap();
        let v_entry = new_file_entry("v", 6, head_v).unwrap();
        fileio::write_all(&mut session.image, &session.layout, &session.fat, &v_entry, b"world!").unwrap();
        dirmut::append(&mut session.image, &session.layout, &mut session.fat, 0, &v_entry).unwrap();

        concat(&mut session, "u", "v", "w").unwrap();
        let w = locate::locate_by_name(&session.image, &session.layout, &session.fat, 0, "w").unwrap().0;
        let bytes = fileio::read_all(&session.image, &session.layout, &session.fat, &w).unwrap();
        assert_eq!(bytes, b"helloworld!");
    }
}
