//! The window store and the three ways a fetched page lands in it.

use std::collections::{HashMap, HashSet};

use crate::error::FetchError;
use crate::paginator::Page;
use crate::record::{Cursor, Row};

/// How a fetched page is combined with the current window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FetchMode {
    /// Discard the window and start over from the head
    Replace,
    /// Extend the window with the next older page
    Append,
    /// Reconcile a re-fetched head page, flagging newly arrived rows
    Merge,
}

impl FetchMode {
    pub fn name(self) -> &'static str {
        match self {
            FetchMode::Replace => "replace",
            FetchMode::Append => "append",
            FetchMode::Merge => "merge",
        }
    }
}

/// Client-side view of the backing table
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowState {
    /// Rows newest first, unique by id
    pub rows: Vec<Row>,
    /// Older rows exist beyond the window
    pub has_more: bool,
    /// Key of the last row while `has_more` holds
    pub cursor: Option<Cursor>,
    /// A page fetch is outstanding
    pub loading: bool,
    /// Data-changed ticks received while scrolled away from the top
    pub pending_new: u32,
    /// A page has landed since the last reset
    pub loaded: bool,
    /// Rows matching the current filters, when known
    pub total: Option<u64>,
    /// Last fetch failure, cleared by the next successful page
    pub error: Option<FetchError>,
}

impl WindowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the page wholesale
    pub fn replace(&mut self, page: Page) {
        self.rows = page.rows;
        self.settle(page.has_more);
        self.pending_new = 0;
    }

    /// Extend with an older page. No-op unless more rows were expected.
    pub fn append(&mut self, page: Page) -> bool {
        if !self.can_load_more() {
            return false;
        }

        let mut rows = std::mem::take(&mut self.rows);
        rows.extend(page.rows);
        self.rows = dedup_by_id(rows);
        self.settle(page.has_more);
        true
    }

    /// Reconcile a re-fetched head page, flagging rows newer than the old head
    pub fn merge(&mut self, mut page: Page, now_ms: i64) {
        mark_added(&self.rows, &mut page.rows, now_ms);
        self.rows = page.rows;
        self.settle(page.has_more);
        self.pending_new = 0;
    }

    /// Swap in a re-read row, keeping its flash mark. Returns whether it was present.
    pub fn patch_row(&mut self, mut row: Row) -> bool {
        match self.rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => {
                row.added_at = existing.added_at;
                *existing = row;
                true
            }
            None => false,
        }
    }

    pub fn can_load_more(&self) -> bool {
        self.has_more && self.cursor.is_some()
    }

    /// Index of the row with `id`
    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    fn settle(&mut self, has_more: bool) {
        self.has_more = has_more && !self.rows.is_empty();
        self.cursor = if self.has_more {
            self.rows.last().map(Row::key)
        } else {
            None
        };
        self.loaded = true;
        self.error = None;
    }
}

/// Drop later rows whose id was already seen, preserving order
pub fn dedup_by_id(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter().filter(|row| seen.insert(row.id)).collect()
}

/// Flag rows of `next` that are newer than the head of `prev`.
///
/// Rows already flagged in `prev` keep their original mark so a decaying
/// highlight does not restart on every refresh. With no previous head every
/// row counts as new.
pub fn mark_added(prev: &[Row], next: &mut [Row], now_ms: i64) {
    let head = prev.first().map(|row| (row.id, row.timestamp_ms));
    let previously_added: HashMap<i64, i64> = prev
        .iter()
        .filter_map(|row| row.added_at.map(|at| (row.id, at)))
        .collect();

    for row in next.iter_mut() {
        let newer = match head {
            None => true,
            Some((head_id, head_ts)) => row.id > head_id && row.timestamp_ms >= head_ts,
        };
        if newer {
            row.added_at = Some(now_ms);
        } else if let Some(at) = previously_added.get(&row.id) {
            row.added_at = Some(*at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(ids: impl IntoIterator<Item = i64>) -> Vec<Row> {
        ids.into_iter()
            .map(|id| Row::new(id, id * 10, format!("row {}", id)))
            .collect()
    }

    fn page(ids: impl IntoIterator<Item = i64>, has_more: bool) -> Page {
        let rows = rows(ids);
        let next_cursor = rows.last().map(Row::key);
        Page {
            rows,
            has_more,
            next_cursor,
        }
    }

    fn ids(state: &WindowState) -> Vec<i64> {
        state.rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_replace_empty() {
        let mut state = WindowState::new();
        state.pending_new = 4;
        state.replace(Page::default());

        assert!(state.rows.is_empty());
        assert!(!state.has_more);
        assert_eq!(state.cursor, None);
        assert_eq!(state.pending_new, 0);
        assert!(state.loaded);
    }

    #[test]
    fn test_replace_sets_cursor_only_with_more() {
        let mut state = WindowState::new();
        state.replace(page((1..=5).rev(), true));
        assert_eq!(state.cursor, Some(Cursor::new(1, 10)));

        state.replace(page((1..=5).rev(), false));
        assert_eq!(state.cursor, None);
    }

    #[test]
    fn test_append_dedups_and_keeps_pending() {
        let mut state = WindowState::new();
        state.replace(page((6..=10).rev(), true));
        state.pending_new = 2;

        assert!(state.append(page((4..=6).rev(), true)));
        assert_eq!(ids(&state), vec![10, 9, 8, 7, 6, 5, 4]);
        assert_eq!(state.cursor, Some(Cursor::new(4, 40)));
        assert_eq!(state.pending_new, 2);
    }

    #[test]
    fn test_append_without_more_is_noop() {
        let mut state = WindowState::new();
        state.replace(page((1..=3).rev(), false));
        assert!(!state.append(page([0], false)));
        assert_eq!(ids(&state), vec![3, 2, 1]);
    }

    #[test]
    fn test_merge_marks_rows_newer_than_head() {
        let mut state = WindowState::new();
        state.replace(page((1..=50).rev(), false));
        state.pending_new = 1;

        state.merge(page((6..=55).rev(), true), 777);

        let expected: Vec<i64> = (6..=55).rev().collect();
        assert_eq!(ids(&state), expected);
        for row in &state.rows {
            let fresh = row.id > 50;
            assert_eq!(row.added_at.is_some(), fresh, "row {}", row.id);
        }
        assert_eq!(state.rows[0].added_at, Some(777));
        assert_eq!(state.pending_new, 0);
        assert_eq!(state.cursor, Some(Cursor::new(6, 60)));
    }

    #[test]
    fn test_merge_carries_previous_marks() {
        let mut state = WindowState::new();
        state.replace(page((1..=5).rev(), false));
        state.merge(page((1..=7).rev(), false), 100);
        state.merge(page((1..=8).rev(), false), 200);

        let marks: Vec<(i64, Option<i64>)> =
            state.rows.iter().map(|r| (r.id, r.added_at)).take(4).collect();
        assert_eq!(
            marks,
            vec![(8, Some(200)), (7, Some(100)), (6, Some(100)), (5, None)]
        );
    }

    #[test]
    fn test_merge_into_empty_marks_everything() {
        let mut state = WindowState::new();
        state.merge(page([3, 2, 1], false), 5);
        assert!(state.rows.iter().all(|r| r.added_at == Some(5)));
    }

    #[test]
    fn test_merge_ignores_higher_id_with_older_timestamp() {
        let prev = rows([10]);
        let mut next = vec![Row::new(11, 50, "late arrival"), Row::new(10, 100, "head")];
        mark_added(&prev, &mut next, 1);
        assert_eq!(next[0].added_at, None);
    }

    #[test]
    fn test_patch_row_keeps_flash() {
        let mut state = WindowState::new();
        state.merge(page([2, 1], false), 9);

        let mut updated = Row::new(2, 20, "row 2");
        updated.marker_note = Some("noted".to_string());
        assert!(state.patch_row(updated));
        assert_eq!(state.rows[0].marker_note.as_deref(), Some("noted"));
        assert_eq!(state.rows[0].added_at, Some(9));

        assert!(!state.patch_row(Row::new(99, 1, "absent")));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        fn sorted_rows(timestamps: &[i64]) -> Vec<Row> {
            let mut rows: Vec<Row> = timestamps
                .iter()
                .enumerate()
                .map(|(i, ts)| Row::new(i as i64 + 1, *ts, "r"))
                .collect();
            rows.sort_by(Row::display_order);
            rows
        }

        /// Split into keyset pages. With `overlap` each page repeats the
        /// previous page's last row.
        fn pages(rows: &[Row], limit: usize, overlap: bool) -> Vec<Page> {
            let mut pages = Vec::new();
            let mut start = 0;
            loop {
                let end = (start + limit).min(rows.len());
                let from = if overlap && start > 0 { start - 1 } else { start };
                let fetched = rows[from..(end + 1).min(rows.len())].to_vec();
                pages.push(Page::from_lookahead(fetched, end - from));
                start = end;
                if start >= rows.len() {
                    return pages;
                }
            }
        }

        fn check_window(state: &WindowState) -> Result<(), TestCaseError> {
            for pair in state.rows.windows(2) {
                prop_assert!(pair[0].key() > pair[1].key());
            }
            let ids: HashSet<i64> = state.rows.iter().map(|r| r.id).collect();
            prop_assert_eq!(ids.len(), state.rows.len());
            if state.has_more {
                prop_assert_eq!(state.cursor, state.rows.last().map(Row::key));
            } else {
                prop_assert_eq!(state.cursor, None);
            }
            Ok(())
        }

        proptest! {
            #[test]
            fn prop_paging_keeps_order_and_cursor(
                timestamps in prop::collection::vec(0i64..40, 0..120),
                limit in 1usize..30,
                overlap in any::<bool>(),
            ) {
                let all = sorted_rows(&timestamps);
                let mut pages = pages(&all, limit, overlap).into_iter();

                let mut state = WindowState::new();
                state.replace(pages.next().unwrap_or_default());
                check_window(&state)?;
                for page in pages {
                    prop_assert!(state.append(page));
                    check_window(&state)?;
                }

                prop_assert_eq!(&state.rows, &all);
                prop_assert!(!state.has_more);
            }

            #[test]
            fn prop_merge_marks_only_newer(
                n in 1i64..80,
                grow in 0i64..20,
                limit in 1usize..60,
                now in 1i64..1_000_000,
            ) {
                let head = |count: i64| {
                    let rows = (1..=count)
                        .rev()
                        .map(|id| Row::new(id, id * 10, "r"))
                        .collect::<Vec<_>>();
                    Page::from_lookahead(rows, limit)
                };

                let mut state = WindowState::new();
                state.replace(head(n));
                state.merge(head(n + grow), now);

                check_window(&state)?;
                for row in &state.rows {
                    prop_assert_eq!(row.added_at.is_some(), row.id > n);
                }
            }
        }
    }
}
