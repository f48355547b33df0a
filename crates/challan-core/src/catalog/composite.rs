//! Removing one part from a comma-separated composite item name.
//!
//! Catalog names like `"Plate 4hole,5hole,6hole"` pack several variants into
//! one entry. Editing removes a single part; an edit that would leave nothing
//! behind is rejected and the caller keeps the original name.
//!
//! Two entry points exist because fixed and selectable items are edited
//! differently: selectable names first try a literal comma-adjacent removal,
//! which keeps the original spacing, before falling back to the segment rules.

/// Remove `part` from a fixed item's composite name.
pub fn remove_fixed_item_part(name: &str, part: &str) -> Option<String> {
    remove_by_segments(name, part.trim())
}

/// Remove `part` from a selectable item's composite name.
pub fn remove_selectable_item_part(name: &str, part: &str) -> Option<String> {
    let part = part.trim();
    if part.is_empty() {
        return None;
    }

    if let Some(stripped) = remove_comma_adjacent(name, part) {
        return non_empty(stripped);
    }

    remove_by_segments(name, part)
}

fn remove_comma_adjacent(name: &str, part: &str) -> Option<String> {
    for needle in [format!(", {}", part), format!(",{}", part)] {
        let mut from = 0;
        while let Some(pos) = name[from..].find(&needle) {
            let start = from + pos;
            let end = start + needle.len();
            // Only whole segments: the match must run to the next comma or the end.
            if name[end..].trim_start().is_empty() || name[end..].trim_start().starts_with(',') {
                return Some(format!("{}{}", &name[..start], &name[end..]));
            }
            from = start + 1;
        }
    }

    let leading = format!("{},", part);
    name.trim_start()
        .strip_prefix(&leading)
        .map(|rest| rest.trim_start().to_string())
}

fn remove_by_segments(name: &str, part: &str) -> Option<String> {
    if part.is_empty() {
        return None;
    }

    let mut segments: Vec<String> = name.split(',').map(|s| s.trim().to_string()).collect();

    // Exact segment match.
    if let Some(idx) = segments.iter().position(|s| s == part) {
        match strip_numeric_suffix(&segments[idx]) {
            Some(head) => segments[idx] = head.to_string(),
            None => {
                segments.remove(idx);
            }
        }
        return non_empty(join_segments(&segments));
    }

    // Suffix of a segment, preceded by a space.
    let suffix = format!(" {}", part);
    let idx = segments.iter().position(|s| s.ends_with(&suffix))?;
    let head = segments[idx][..segments[idx].len() - suffix.len()]
        .trim_end()
        .to_string();
    segments[idx] = head;
    non_empty(join_segments(&segments))
}

/// `"Plate 4hole"` → `Some("Plate")`. The tail must be digits followed by letters.
fn strip_numeric_suffix(segment: &str) -> Option<&str> {
    let (head, tail) = segment.rsplit_once(' ')?;
    let head = head.trim_end();
    if head.is_empty() || !head.chars().last().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }

    let digits = tail.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || !tail.chars().skip(digits).all(|c| c.is_alphabetic()) {
        return None;
    }
    Some(head)
}

fn join_segments(segments: &[String]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(",")
}

fn non_empty(name: String) -> Option<String> {
    if name.split(',').all(|s| s.trim().is_empty()) {
        None
    } else {
        Some(name)
    }
}
