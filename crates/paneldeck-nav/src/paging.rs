#![forbid(unsafe_code)]

//! Nine-per-page numbering for digit shortcuts.
//!
//! Items are numbered `1`..=`9` within the current page; `0` advances to the
//! next page and wraps back to the first.

use std::ops::Range;

/// Items addressable by digits on one page.
pub const PAGE_SIZE: usize = 9;

/// Number of pages needed for `len` items (`0` for an empty list).
#[must_use]
pub const fn page_count(len: usize) -> usize {
    len.div_ceil(PAGE_SIZE)
}

/// Page holding absolute index `index`.
#[must_use]
pub const fn page_of(index: usize) -> usize {
    index / PAGE_SIZE
}

/// Absolute index range of `page`, clamped to `len`.
#[must_use]
pub fn page_range(len: usize, page: usize) -> Range<usize> {
    let start = (page * PAGE_SIZE).min(len);
    let end = (start + PAGE_SIZE).min(len);
    start..end
}

/// Absolute index for digit `digit` (1-based) on `page`.
#[must_use]
pub fn index_for_digit(len: usize, page: usize, digit: u8) -> Option<usize> {
    if !(1..=9).contains(&digit) {
        return None;
    }
    let index = page * PAGE_SIZE + usize::from(digit) - 1;
    (index < len).then_some(index)
}

/// Page after `page`, wrapping to the first.
#[must_use]
pub fn next_page(len: usize, page: usize) -> usize {
    match page_count(len) {
        0 => 0,
        count => (page + 1) % count,
    }
}

/// `(badge number, item)` pairs for the items on `page`.
pub fn badges<T>(items: &[T], page: usize) -> impl Iterator<Item = (u8, &T)> {
    (1u8..).zip(items[page_range(items.len(), page)].iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        assert_eq!(page_count(0), 0);
        assert_eq!(page_count(9), 1);
        assert_eq!(page_count(10), 2);
    }

    #[test]
    fn digits_map_onto_pages() {
        assert_eq!(index_for_digit(12, 0, 1), Some(0));
        assert_eq!(index_for_digit(12, 1, 2), Some(10));
        assert_eq!(index_for_digit(12, 1, 4), None);
        assert_eq!(index_for_digit(12, 0, 0), None);
    }

    #[test]
    fn next_page_wraps() {
        assert_eq!(next_page(12, 0), 1);
        assert_eq!(next_page(12, 1), 0);
        assert_eq!(next_page(9, 0), 0);
        assert_eq!(next_page(0, 0), 0);
    }

    #[test]
    fn badges_restart_per_page() {
        let items: Vec<usize> = (0..12).collect();
        let second: Vec<(u8, usize)> = badges(&items, 1).map(|(n, i)| (n, *i)).collect();
        assert_eq!(second, vec![(1, 9), (2, 10), (3, 11)]);
        assert_eq!(badges(&items, 5).count(), 0);
    }
}
