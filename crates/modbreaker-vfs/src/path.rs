// modbreaker-vfs/src/path.rs
//! VFS path utilities
//!
//! Game paths arrive in every shape: `\dz\gear\jacket.p3d`,
//! `MyMod\Data\Jacket_CO.paa`, `mymod/data/jacket.rvmat`. Inside the VFS a
//! path is always `/`-separated and absolute with its case preserved for
//! display; lookups go through [`path_key`].

use modbreaker_parsers::signature::fold_case;

/// Absolute `/`-separated form of a game path; `.` and `..` are resolved
/// and empty components dropped
pub fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");

    let mut components = Vec::new();
    for component in path.trim().split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }

    if components.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", components.join("/"))
    }
}

/// Lookup key: normalized and case-folded
pub fn path_key(path: &str) -> String {
    fold_case(&normalize_path(path))
}

/// Directory holding `path`, `None` for the root
pub fn parent_path(path: &str) -> Option<String> {
    let normalized = normalize_path(path);

    if normalized == "/" {
        return None;
    }

    match normalized.rfind('/') {
        Some(0) | None => Some("/".to_string()),
        Some(pos) => Some(normalized[..pos].to_string()),
    }
}

/// Last component, either separator
pub fn filename(path: &str) -> &str {
    let path = path.trim_end_matches(['/', '\\']);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// `relative` under `base`; a rooted `relative` replaces it
pub fn join_paths(base: &str, relative: &str) -> String {
    if relative.starts_with(['/', '\\']) {
        return normalize_path(relative);
    }

    let base = base.trim_end_matches(['/', '\\']);
    normalize_path(&format!("{}/{}", base, relative))
}

/// Whether `path` lies inside directory `dir` (any depth); both are keys
pub fn is_under(path_key: &str, dir_key: &str) -> bool {
    if dir_key == "/" {
        return true;
    }
    path_key
        .strip_prefix(dir_key)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

/// Case-insensitive glob with `*` and `?`
pub fn glob_match(pattern: &str, path: &str) -> bool {
    glob_match_impl(fold_case(pattern).as_bytes(), fold_case(path).as_bytes())
}

fn glob_match_impl(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        // retry from the last star, one byte further
        match star {
            Some((sp, st)) => {
                p = sp + 1;
                t = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }

    p == pattern.len()
}
