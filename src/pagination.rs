//! Cursor-following retrieval over paged listing endpoints.

/// Upper bound the platform accepts for `maxResults` on listing endpoints.
pub const PAGE_SIZE_CEILING: usize = 50;

/// One page of a listing plus the continuation cursor, if the source has more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, None)
    }
}

/// Calls `list_page` first without a cursor, then with every cursor the
/// source hands back, concatenating items in page order. Stops at the first
/// page without a continuation (an empty cursor counts as none) and returns
/// the first error unchanged.
pub fn fetch_all<T, E, F>(mut list_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<&str>) -> Result<Page<T>, E>,
{
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = list_page(cursor.as_deref())?;
        collected.extend(page.items);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    Ok(collected)
}
