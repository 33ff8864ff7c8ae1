//! Batch partitioning bounded by item count and estimated cost.
//!
//! [`BatchSizer::split`] greedily packs an ordered item list into batches.
//! A batch closes when adding the next item would exceed either the size
//! bound or the cost ceiling — but only once it already holds
//! `min_batch_size` items, so no batch except the final one is undersized.
//! Concatenating the emitted batches reproduces the input exactly.
//!
//! Cost is a character-derived token proxy, not a real tokenizer count.
//! The estimate only has to be roughly proportional to spend to keep
//! batches under the remote service's payload sweet spot; exactness is not
//! worth a tokenizer dependency here.

use std::time::SystemTime;

use crate::{FerrymanError, Result};

/// Rough token proxy: one cost unit per four characters, minimum one.
pub fn estimated_cost(item: &str) -> u64 {
    (item.chars().count() as u64).div_ceil(4).max(1)
}

/// An ordered group of items processed together in one remote call.
///
/// The batch is the unit of atomic success or failure; item order within it
/// is never reshuffled. `offset` is the index of the first item in the
/// caller's original list, used to merge results back in global order.
#[derive(Debug, Clone)]
pub struct Batch {
    pub offset: usize,
    pub items: Vec<String>,
    /// Dispatch priority; higher batches are dispatched first. Does not
    /// affect merge order, which is offset-based.
    pub priority: i32,
    /// Per-batch retry budget, passed to the retry policy.
    pub max_attempts: u32,
    pub created_at: SystemTime,
}

impl Batch {
    pub fn new(offset: usize, items: Vec<String>, priority: i32, max_attempts: u32) -> Self {
        Self {
            offset,
            items,
            priority,
            max_attempts,
            created_at: SystemTime::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Summed cost proxy for this batch.
    pub fn estimated_cost(&self) -> u64 {
        self.items.iter().map(|i| estimated_cost(i)).sum()
    }
}

/// Configuration for batch sizing.
///
/// ```rust
/// # use ferryman::BatchSizerConfig;
/// let config = BatchSizerConfig::new().min_batch_size(2).max_batch_size(10);
/// ```
#[derive(Debug, Clone)]
pub struct BatchSizerConfig {
    /// Smallest batch emitted, except possibly the final one. Default: 5.
    pub min_batch_size: usize,
    /// Largest batch emitted. Default: 25.
    pub max_batch_size: usize,
    /// Cost-unit ceiling per batch. Default: 3000.
    pub target_cost_ceiling: u64,
    /// Retry budget stamped onto each batch. Default: 5.
    pub retry_budget: u32,
    /// Priority stamped onto each batch. Default: 0.
    pub priority: i32,
}

impl Default for BatchSizerConfig {
    fn default() -> Self {
        Self {
            min_batch_size: 5,
            max_batch_size: 25,
            target_cost_ceiling: 3000,
            retry_budget: 5,
            priority: 0,
        }
    }
}

impl BatchSizerConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum batch size.
    pub fn min_batch_size(mut self, n: usize) -> Self {
        self.min_batch_size = n;
        self
    }

    /// Set the maximum batch size.
    pub fn max_batch_size(mut self, n: usize) -> Self {
        self.max_batch_size = n;
        self
    }

    /// Set the per-batch cost ceiling.
    pub fn target_cost_ceiling(mut self, units: u64) -> Self {
        self.target_cost_ceiling = units;
        self
    }

    /// Set the per-batch retry budget.
    pub fn retry_budget(mut self, n: u32) -> Self {
        self.retry_budget = n;
        self
    }

    /// Set the batch dispatch priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Reject bounds that cannot produce valid batches.
    pub fn validate(&self) -> Result<()> {
        if self.min_batch_size == 0 {
            return Err(FerrymanError::Configuration(
                "min_batch_size must be at least 1".into(),
            ));
        }
        if self.min_batch_size > self.max_batch_size {
            return Err(FerrymanError::Configuration(format!(
                "min_batch_size ({}) exceeds max_batch_size ({})",
                self.min_batch_size, self.max_batch_size
            )));
        }
        if self.target_cost_ceiling == 0 {
            return Err(FerrymanError::Configuration(
                "target_cost_ceiling must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Partitions ordered item lists into cost- and size-bounded batches.
pub struct BatchSizer {
    config: BatchSizerConfig,
}

impl BatchSizer {
    pub fn new(config: BatchSizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchSizerConfig {
        &self.config
    }

    /// Split `items` into batches, preserving order.
    pub fn split(&self, items: &[String]) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_cost = 0u64;
        let mut offset = 0usize;

        for (index, item) in items.iter().enumerate() {
            let item_cost = estimated_cost(item);
            let over_size = current.len() + 1 > self.config.max_batch_size;
            let over_cost = current_cost + item_cost > self.config.target_cost_ceiling;
            if (over_size || over_cost) && current.len() >= self.config.min_batch_size {
                batches.push(self.make_batch(offset, std::mem::take(&mut current)));
                current_cost = 0;
                offset = index;
            }
            current.push(item.clone());
            current_cost += item_cost;
        }
        if !current.is_empty() {
            batches.push(self.make_batch(offset, current));
        }
        batches
    }

    fn make_batch(&self, offset: usize, items: Vec<String>) -> Batch {
        Batch::new(
            offset,
            items,
            self.config.priority,
            self.config.retry_budget,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_proxy_scales_with_length() {
        assert_eq!(estimated_cost(""), 1);
        assert_eq!(estimated_cost("abcd"), 1);
        assert_eq!(estimated_cost("abcde"), 2);
        assert_eq!(estimated_cost(&"x".repeat(100)), 25);
    }

    #[test]
    fn validate_rejects_zero_min() {
        let config = BatchSizerConfig::new().min_batch_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let config = BatchSizerConfig::new().min_batch_size(10).max_batch_size(5);
        assert!(config.validate().is_err());
    }
}
