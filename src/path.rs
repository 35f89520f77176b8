// src/path.rs
//
//! Translation between hierarchical URLs and flat object keys.
//!
//! The host addresses storage through paths like `/<bucket>/<dir>/<file>`;
//! the bucket itself is flat, so these helpers strip and re-add the bucket
//! segment. Pure string manipulation, no store access.

/// Strip the bucket segment from a hierarchical URL, yielding the flat key.
///
/// Three accepted shapes:
/// - `/opt/<owner>@<bucket>/<key...>` — mount-style path with an embedded
///   `@`; the key starts after the second `/` following the `@`.
/// - `/<bucket>/<key...>` — plain absolute path.
/// - anything without a leading `/` is already a key.
///
/// A trailing `/` is dropped before translation.
pub fn key_from_url(url: &str) -> String {
    let url = url.strip_suffix('/').unwrap_or(url);

    if let Some(rest) = url.strip_prefix("/opt/") {
        if let Some(at) = rest.find('@') {
            let after_at = &rest[at + 1..];
            let mut slashes = after_at.match_indices('/');
            if let (Some(_), Some((second, _))) = (slashes.next(), slashes.next()) {
                return after_at[second + 1..].to_string();
            }
            return String::new();
        }
        // No embedded '@': "/opt/" itself is the bucket segment.
        return rest.to_string();
    }

    if let Some(rest) = url.strip_prefix('/') {
        return match rest.find('/') {
            Some(pos) => rest[pos + 1..].to_string(),
            None => String::new(),
        };
    }

    url.to_string()
}

/// Prefix a flat key with the bucket segment, producing the URL the host
/// expects back. When a quota is configured the bucket segment carries it as
/// `bucket@<quotaGiB>`, mirroring what [`key_from_url`] strips.
pub fn url_from_key(key: &str, bucket: &str, quota_gib: u64) -> String {
    let segment = if quota_gib > 0 {
        format!("{bucket}@{quota_gib}")
    } else {
        bucket.to_string()
    };
    if key.starts_with('/') {
        format!("/{segment}{key}")
    } else {
        format!("/{segment}/{key}")
    }
}

/// Longest disambiguating infix (including the `_`) subject to stripping.
const LEGACY_INFIX_MAX: usize = 7;

/// Strip the legacy disambiguating infix from an `.mkv` file name.
///
/// A historical naming scheme appended `_<token>` before the extension of
/// media files ("clip_ab12.mkv" for "clip.mkv"). Store lookups must use the
/// unmangled name, so the token between the last `_` and the last `.` is
/// removed when it is shorter than 7 characters. Applies only to the `.mkv`
/// family; every other name passes through untouched.
pub fn strip_legacy_infix(name: &str) -> String {
    if !name.ends_with(".mkv") {
        return name.to_string();
    }
    if let (Some(under), Some(dot)) = (name.rfind('_'), name.rfind('.')) {
        if under < dot && dot - under < LEGACY_INFIX_MAX {
            let mut out = String::with_capacity(name.len());
            out.push_str(&name[..under]);
            out.push_str(&name[dot..]);
            return out;
        }
    }
    name.to_string()
}

/// Re-apply a previously stripped infix, the inverse of
/// [`strip_legacy_infix`]. Used when a request must reproduce the mangled
/// name the host originally presented.
pub fn append_legacy_infix(name: &str, infix: &str) -> String {
    if !name.ends_with(".mkv") || infix.is_empty() || infix.len() + 1 >= LEGACY_INFIX_MAX {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) => format!("{}_{}{}", &name[..dot], infix, &name[dot..]),
        None => name.to_string(),
    }
}
