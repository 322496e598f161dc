//! History of several keys, one after another

use std::collections::VecDeque;

use super::errors::HistoryResult;
use super::scanner::{HistoryScanner, ResultsIterator};
use super::types::KeyModification;

/// Concatenation of single-key scanners in request order.
///
/// Each key's history is drained newest to oldest before the next key
/// starts. Results are not interleaved by time across keys; callers that
/// need block order across keys use the block-range scan instead.
pub struct MultiKeyHistoryScanner {
    scanners: VecDeque<HistoryScanner>,
}

impl MultiKeyHistoryScanner {
    pub(crate) fn new(scanners: Vec<HistoryScanner>) -> Self {
        Self {
            scanners: scanners.into(),
        }
    }

    /// Key whose history the next result belongs to, if any remain.
    pub fn current_key(&self) -> Option<&str> {
        self.scanners.front().map(|s| s.key())
    }
}

impl ResultsIterator for MultiKeyHistoryScanner {
    type Item = KeyModification;

    fn next(&mut self) -> HistoryResult<Option<KeyModification>> {
        while let Some(scanner) = self.scanners.front_mut() {
            if let Some(modification) = scanner.next()? {
                return Ok(Some(modification));
            }
            if let Some(mut exhausted) = self.scanners.pop_front() {
                exhausted.close();
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        for mut scanner in self.scanners.drain(..) {
            scanner.close();
        }
    }
}

impl Drop for MultiKeyHistoryScanner {
    fn drop(&mut self) {
        self.close();
    }
}
