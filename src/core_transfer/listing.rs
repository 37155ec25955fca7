//! Builds LIST and NLST payloads.

use std::fs::Metadata;
use std::io;
use std::path::Path;

use chrono::{DateTime, Duration, Local};

/// Lists `path` (a directory or a single file) in the long `ls -l` style
/// format clients expect. Lines are CRLF terminated.
pub fn long_listing(path: &Path) -> io::Result<String> {
    let mut out = String::new();
    for (name, metadata) in entries(path)? {
        out.push_str(&long_entry(&name, &metadata));
    }
    Ok(out)
}

/// Lists bare names only (NLST).
pub fn short_listing(path: &Path) -> io::Result<String> {
    let mut out = String::new();
    for (name, _) in entries(path)? {
        out.push_str(&name);
        out.push_str("\r\n");
    }
    Ok(out)
}

fn entries(path: &Path) -> io::Result<Vec<(String, Metadata)>> {
    let metadata = path.symlink_metadata()?;
    if !metadata.is_dir() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        return Ok(vec![(name, metadata)]);
    }

    let mut rows = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry.path().symlink_metadata() {
            Ok(metadata) => rows.push((name, metadata)),
            Err(_) => continue,
        }
    }
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(rows)
}

fn long_entry(name: &str, metadata: &Metadata) -> String {
    let file_type = if metadata.is_dir() {
        'd'
    } else if metadata.file_type().is_symlink() {
        'l'
    } else {
        '-'
    };

    let size = if metadata.is_dir() { 0 } else { metadata.len() };

    format!(
        "{}{} {:>4} {} {} {:>12} {} {}\r\n",
        file_type,
        permissions(metadata),
        link_count(metadata),
        owner(metadata),
        group(metadata),
        size,
        timestamp(metadata),
        name
    )
}

#[cfg(unix)]
fn permissions(metadata: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = metadata.permissions().mode();
    let mut out = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permissions(_metadata: &Metadata) -> String {
    String::from("rw-rw-rw-")
}

#[cfg(unix)]
fn link_count(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &Metadata) -> u64 {
    1
}

#[cfg(unix)]
fn owner(metadata: &Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    metadata.uid().to_string()
}

#[cfg(not(unix))]
fn owner(_metadata: &Metadata) -> String {
    String::from("owner")
}

#[cfg(unix)]
fn group(metadata: &Metadata) -> String {
    use std::os::unix::fs::MetadataExt;
    metadata.gid().to_string()
}

#[cfg(not(unix))]
fn group(_metadata: &Metadata) -> String {
    String::from("group")
}

/// `Mmm dd hh:mm` for files modified within roughly six months, `Mmm dd
/// yyyy` otherwise, matching the convention clients parse.
fn timestamp(metadata: &Metadata) -> String {
    let modified: DateTime<Local> = match metadata.modified() {
        Ok(time) => time.into(),
        Err(_) => return String::from("Jan  1  1970"),
    };
    let age = Local::now().signed_duration_since(modified);
    if age > Duration::days(180) || age < Duration::days(-1) {
        modified.format("%b %e  %Y").to_string()
    } else {
        modified.format("%b %e %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn long_listing_has_one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = long_listing(dir.path()).unwrap();
        let lines: Vec<&str> = listing.split("\r\n").filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("a.txt"));
        assert!(lines[0].starts_with('-'));
        assert!(lines[1].ends_with("sub"));
        assert!(lines[1].starts_with('d'));
    }

    #[test]
    fn directories_report_size_zero() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let listing = long_listing(dir.path()).unwrap();
        let fields: Vec<&str> = listing.split_whitespace().collect();
        // type+perms, nlink, owner, group, size, month, day, time, name
        assert_eq!(fields[4], "0");
    }

    #[test]
    fn short_listing_is_names_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"y").unwrap();
        assert_eq!(short_listing(dir.path()).unwrap(), "a.txt\r\nb.txt\r\n");
    }

    #[test]
    fn single_file_lists_itself() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("only.txt");
        std::fs::write(&file, b"data").unwrap();
        let listing = long_listing(&file).unwrap();
        assert!(listing.contains("only.txt"));
        assert_eq!(listing.matches("\r\n").count(), 1);
    }
}
