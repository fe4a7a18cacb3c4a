//! Deterministic entry ordering.
//!
//! Names compare "naturally": digit runs by numeric value, text runs
//! case-insensitively, so `Game 2` sorts before `Game 10`. Entry names are
//! treated as paths, comparing the directory part before the file part.

use std::cmp::Ordering;

use datmerge_core::Entry;

/// Natural comparison of two strings.
///
/// Strings that compare equal chunk by chunk fall back to ordinal
/// comparison, so distinct strings never compare equal.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_chunks(x, y) {
                Ordering::Equal => {}
                other => return other,
            },
        }
    }
}

/// Compare path-like names: directory first, then file name.
pub fn path_cmp(a: &str, b: &str) -> Ordering {
    let (dir_a, file_a) = split_path(a);
    let (dir_b, file_b) = split_path(b);
    natural_cmp(dir_a, dir_b).then_with(|| natural_cmp(file_a, file_b))
}

fn split_path(name: &str) -> (&str, &str) {
    match name.rfind(['/', '\\']) {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("", name),
    }
}

fn compare_chunks(a: &str, b: &str) -> Ordering {
    let a_digits = a.starts_with(|c: char| c.is_ascii_digit());
    let b_digits = b.starts_with(|c: char| c.is_ascii_digit());

    match (a_digits, b_digits) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase)),
    }
}

/// Splits a string into maximal runs of ASCII digits and non-digits.
struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(chunk)
    }
}

/// Total order over entries.
///
/// Source priority then machine name, or machine name then priority when
/// `rename_aware`; then item kind, then path-aware entry name. Remaining ties
/// are broken on size, status, digests, and flags so the order never depends
/// on arrival order.
pub fn compare_entries(a: &Entry, b: &Entry, rename_aware: bool) -> Ordering {
    let priority = || a.source_priority.cmp(&b.source_priority);
    let machine = || natural_cmp(a.machine_name(), b.machine_name());

    let head = if rename_aware {
        machine().then_with(priority)
    } else {
        priority().then_with(machine)
    };

    head.then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| path_cmp(a.name_str(), b.name_str()))
        .then_with(|| a.size.cmp(&b.size))
        .then_with(|| a.status.cmp(&b.status))
        .then_with(|| a.digests.iter().cmp(b.digests.iter()))
        .then_with(|| a.marked_for_removal.cmp(&b.marked_for_removal))
        .then_with(|| a.dupe_type.bits().cmp(&b.dupe_type.bits()))
}

/// Stable in-place sort with [`compare_entries`].
pub fn sort_entries(entries: &mut [Entry], rename_aware: bool) {
    entries.sort_by(|a, b| compare_entries(a, b, rename_aware));
}
