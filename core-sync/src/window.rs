//! # Sequence Window Planner
//!
//! Turns "newest remote sequence" and "newest stored sequence" into the list of
//! page cursors still to fetch for one pool type.
//!
//! A cursor returns the page strictly older than itself, so cursors step down
//! by the page size from the remote newest sequence until they reach what is
//! already stored. The last page may overlap stored records; the persister's
//! duplicate handling absorbs that.

use crate::{Result, SyncError};

/// Plan page cursors, newest first
///
/// # Arguments
///
/// * `remote_newest_seq` - Sequence id as sent by the remote (string-encoded)
/// * `local_newest_seq` - Highest stored sequence, `None` when nothing is stored
/// * `page_size` - Records per remote page
///
/// # Returns
///
/// Cursors strictly decreasing by `page_size`, all greater than
/// `local_newest_seq`; empty if the remote is not ahead.
///
/// # Errors
///
/// - `InvalidSequence` if `remote_newest_seq` is not a non-negative integer
/// - `InvalidInput` if `page_size` is zero
///
/// # Example
///
/// ```rust,ignore
/// let cursors = plan("692", Some(540), 5)?;
/// assert_eq!(cursors.len(), 31);
/// assert_eq!(cursors[0], 692);
/// assert_eq!(cursors[30], 542);
/// ```
pub fn plan(
    remote_newest_seq: &str,
    local_newest_seq: Option<u64>,
    page_size: u32,
) -> Result<Vec<u64>> {
    if page_size == 0 {
        return Err(SyncError::InvalidInput {
            field: "page_size".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    let remote: u64 = remote_newest_seq
        .trim()
        .parse()
        .map_err(|_| SyncError::InvalidSequence(remote_newest_seq.to_string()))?;
    let floor = local_newest_seq.unwrap_or(0);
    let step = u64::from(page_size);

    if remote <= floor {
        return Ok(Vec::new());
    }

    let mut cursors = Vec::with_capacity(((remote - floor).div_ceil(step)) as usize);
    let mut cursor = remote;

    while cursor > floor {
        cursors.push(cursor);
        match cursor.checked_sub(step) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    Ok(cursors)
}
