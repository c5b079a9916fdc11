use std::path::Path;

use crate::constants::RELATIVE_PREFIX;

/// Build the remote path for one source file.
///
/// With `flatten` the file lands directly in `target_folder`; otherwise its
/// position below `source_root` is kept.
pub fn target_path(source: &Path, source_root: &Path, target_folder: &str, flatten: bool) -> String {
    let tail = if flatten {
        source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        let relative = source.strip_prefix(source_root).unwrap_or(source);
        to_slashes(&relative.to_string_lossy())
            .trim_start_matches('/')
            .to_string()
    };

    let joined = if target_folder.is_empty() {
        tail
    } else {
        format!("{}/{}", target_folder, tail)
    };

    normalize_remote_path(&joined)
}

/// Normalize a remote path to forward slashes.
///
/// `.` and `..` segments are resolved and repeated separators collapsed.
/// Paths that are neither absolute (`/…`, `C:/…`) nor UNC (`//host/…`) are
/// returned explicitly relative, prefixed with `./`.
pub fn normalize_remote_path(path: &str) -> String {
    let slashed = to_slashes(path);

    let (prefix, rest) = split_root(&slashed);
    let rooted = !prefix.is_empty();

    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if rooted => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    if rooted {
        format!("{}{}", prefix, body)
    } else if body.is_empty() {
        ".".to_string()
    } else {
        format!("{}{}", RELATIVE_PREFIX, body)
    }
}

/// True for `/…`, `X:/…` and UNC paths.
pub fn is_rooted(path: &str) -> bool {
    !split_root(&to_slashes(path)).0.is_empty()
}

/// Parent directory of a normalized remote path, if it has a meaningful one.
pub fn remote_parent(path: &str) -> Option<&str> {
    let (parent, _) = path.rsplit_once('/')?;
    match parent {
        "" | "." => None,
        _ if parent.len() == 2 && parent.ends_with(':') => None,
        _ if parent.chars().all(|c| c == '/') => None,
        _ => Some(parent),
    }
}

fn to_slashes(path: &str) -> String {
    path.replace('\\', "/")
}

fn split_root(path: &str) -> (&str, &str) {
    if path.starts_with("//") {
        ("//", &path[2..])
    } else if path.starts_with('/') {
        ("/", &path[1..])
    } else {
        let bytes = path.as_bytes();
        if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/' {
            (&path[..3], &path[3..])
        } else {
            ("", path)
        }
    }
}
