//! Scroll-ahead prefetching for image lists.

use std::ops::Range;

use tracing::trace;

use crate::domain::ports::ImageCachePort;

/// Rows beyond each edge of the visible range worth warming.
pub const LOAD_BUFFER: usize = 5;

/// Returns the rows within `buffer` of `visible` that are not themselves
/// visible, clamped to `len`.
#[must_use]
pub fn prefetch_rows(visible: Range<usize>, buffer: usize, len: usize) -> Vec<usize> {
    let start = visible.start.min(visible.end).min(len);
    let end = visible.end.max(visible.start).min(len);
    let before = start.saturating_sub(buffer)..start;
    let after = end..end.saturating_add(buffer).min(len);
    before.chain(after).collect()
}

/// Warms the cache for rows surrounding the visible range of a list whose
/// row `i` shows `urls[i]`.
pub async fn prefetch_around(cache: &dyn ImageCachePort, urls: &[String], visible: Range<usize>) {
    let rows = prefetch_rows(visible, LOAD_BUFFER, urls.len());
    if rows.is_empty() {
        return;
    }
    let batch: Vec<String> = rows.iter().map(|&i| urls[i].clone()).collect();
    trace!(count = batch.len(), "Prefetching rows around viewport");
    cache.prefetch(&batch).await;
}
