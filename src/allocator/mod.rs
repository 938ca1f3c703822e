//! Greedy placement of operation threads onto worker hosts
//!
//! The allocator works on a caller-supplied snapshot and never touches the
//! hosts themselves. Hosts are consumed smallest-free-first so large
//! contiguous blocks stay available for large requests; requests are served
//! in the order the caller gives them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{OperationKind, RamMb, WorkerHost};

// ============================================================================
// Keep-free margin
// ============================================================================

/// How much RAM each host keeps out of allocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeepFreePolicy {
    /// Margin for hosts without an override
    #[serde(default)]
    pub default_mb: RamMb,
    /// Per-host margins, e.g. for the home machine
    #[serde(default)]
    pub overrides: HashMap<String, RamMb>,
    /// Margin as a fraction of the host's total RAM; the larger margin wins
    #[serde(default)]
    pub fraction: f64,
}

impl KeepFreePolicy {
    pub fn margin_for(&self, host: &WorkerHost) -> RamMb {
        let fixed = self
            .overrides
            .get(&host.name)
            .copied()
            .unwrap_or(self.default_mb);
        let scaled = RamMb((host.max_ram.0 as f64 * self.fraction.clamp(0.0, 1.0)).ceil() as u64);
        fixed.max(scaled)
    }

    /// Snapshot with the margin filled in
    pub fn apply(&self, mut host: WorkerHost) -> WorkerHost {
        host.keep_free = self.margin_for(&host);
        host
    }
}

// ============================================================================
// Requests and results
// ============================================================================

/// Thread count wanted for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreadDemand {
    /// Up to this many threads
    Threads(u32),
    /// Every thread the pool can hold
    AsManyAsPossible,
}

/// One operation to place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub kind: OperationKind,
    pub demand: ThreadDemand,
    pub ram_per_thread: RamMb,
}

impl AllocationRequest {
    pub fn threads(kind: OperationKind, threads: u32, ram_per_thread: RamMb) -> Self {
        Self {
            kind,
            demand: ThreadDemand::Threads(threads),
            ram_per_thread,
        }
    }

    pub fn fill(kind: OperationKind, ram_per_thread: RamMb) -> Self {
        Self {
            kind,
            demand: ThreadDemand::AsManyAsPossible,
            ram_per_thread,
        }
    }
}

/// Threads of one request assigned to one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub host: String,
    pub threads: u32,
}

/// Outcome of one allocation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    /// Placements per request, in request order
    pub placements: Vec<Vec<Placement>>,
    /// Free RAM per host after the hypothetical commitment
    pub residual: BTreeMap<String, RamMb>,
    requested: Vec<ThreadDemand>,
}

impl Allocation {
    pub fn placed_threads(&self, index: usize) -> u32 {
        self.placements
            .get(index)
            .map(|p| p.iter().map(|pl| pl.threads).sum())
            .unwrap_or(0)
    }

    /// Whether request `index` got everything it asked for; a fill request
    /// counts as satisfied when it got at least one thread
    pub fn fully_placed(&self, index: usize) -> bool {
        let placed = self.placed_threads(index);
        match self.requested.get(index) {
            Some(ThreadDemand::Threads(wanted)) => placed >= *wanted,
            Some(ThreadDemand::AsManyAsPossible) => placed > 0,
            None => false,
        }
    }

    pub fn all_placed(&self) -> bool {
        (0..self.placements.len()).all(|i| self.fully_placed(i))
    }
}

// ============================================================================
// Allocator
// ============================================================================

/// Stateless greedy allocator
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityAllocator;

impl CapacityAllocator {
    pub fn new() -> Self {
        Self
    }

    /// RAM usable by threads costing up to `per_thread` each
    ///
    /// A thread never spans hosts, so each host contributes only the whole
    /// threads it can hold.
    pub fn placeable(&self, hosts: &[WorkerHost], per_thread: RamMb) -> RamMb {
        hosts
            .iter()
            .map(|h| per_thread.times(h.free_ram().threads_fitting(per_thread)))
            .sum()
    }

    /// Partition `requests` across `hosts` without exceeding any host's free RAM
    pub fn allocate(&self, requests: &[AllocationRequest], hosts: &[WorkerHost]) -> Allocation {
        let mut pool: Vec<(String, RamMb)> = hosts
            .iter()
            .map(|h| (h.name.clone(), h.free_ram()))
            .collect();
        pool.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut placements = Vec::with_capacity(requests.len());
        for request in requests {
            placements.push(Self::place(request, &mut pool));
        }

        Allocation {
            placements,
            residual: pool.into_iter().collect(),
            requested: requests.iter().map(|r| r.demand).collect(),
        }
    }

    fn place(request: &AllocationRequest, pool: &mut [(String, RamMb)]) -> Vec<Placement> {
        let mut remaining = match request.demand {
            ThreadDemand::Threads(n) => n,
            ThreadDemand::AsManyAsPossible => u32::MAX,
        };
        let mut placed = Vec::new();
        if request.ram_per_thread == RamMb::ZERO {
            tracing::debug!(kind = %request.kind, "Skipping request with zero per-thread cost");
            return placed;
        }

        for (host, free) in pool.iter_mut() {
            if remaining == 0 {
                break;
            }
            let fits = free.threads_fitting(request.ram_per_thread);
            if fits == 0 {
                continue;
            }
            let threads = fits.min(remaining);
            *free = free.saturating_sub(request.ram_per_thread.times(threads));
            remaining -= threads;
            placed.push(Placement {
                host: host.clone(),
                threads,
            });
        }
        placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str, gb: u64) -> WorkerHost {
        WorkerHost::new(name, RamMb(gb * 1000), 1)
    }

    const W: RamMb = RamMb(1750);

    #[test]
    fn test_prefers_small_hosts() {
        let hosts = vec![host("big", 64), host("small", 4)];
        let allocation = CapacityAllocator::new()
            .allocate(&[AllocationRequest::threads(OperationKind::Weaken, 2, W)], &hosts);
        assert_eq!(
            allocation.placements[0],
            vec![Placement {
                host: "small".into(),
                threads: 2
            }]
        );
        assert_eq!(allocation.residual["big"], RamMb(64_000));
        assert_eq!(allocation.residual["small"], RamMb(500));
    }

    #[test]
    fn test_spills_to_next_host() {
        let hosts = vec![host("a", 4), host("b", 8)];
        let allocation = CapacityAllocator::new()
            .allocate(&[AllocationRequest::threads(OperationKind::Grow, 5, W)], &hosts);
        assert_eq!(allocation.placed_threads(0), 5);
        assert_eq!(allocation.placements[0][0].host, "a");
        assert_eq!(allocation.placements[0][0].threads, 2);
        assert_eq!(allocation.placements[0][1].host, "b");
        assert_eq!(allocation.placements[0][1].threads, 3);
        assert!(allocation.all_placed());
    }

    #[test]
    fn test_partial_and_zero_results() {
        let hosts = vec![host("a", 4)];
        let allocation = CapacityAllocator::new().allocate(
            &[
                AllocationRequest::threads(OperationKind::Hack, 3, RamMb(1700)),
                AllocationRequest::threads(OperationKind::Weaken, 1, W),
            ],
            &hosts,
        );
        assert_eq!(allocation.placed_threads(0), 2);
        assert!(!allocation.fully_placed(0));
        assert_eq!(allocation.placed_threads(1), 0);
        assert!(allocation.placements[1].is_empty());
        assert!(!allocation.all_placed());
    }

    #[test]
    fn test_fill_takes_everything() {
        let hosts = vec![host("a", 4), host("b", 8)];
        let allocation = CapacityAllocator::new()
            .allocate(&[AllocationRequest::fill(OperationKind::Weaken, W)], &hosts);
        assert_eq!(allocation.placed_threads(0), 2 + 4);
        assert!(allocation.fully_placed(0));
    }

    #[test]
    fn test_keep_free_margin_respected() {
        let policy = KeepFreePolicy {
            default_mb: RamMb::ZERO,
            overrides: HashMap::from([("home".to_string(), RamMb(4000))]),
            fraction: 0.0,
        };
        let hosts: Vec<_> = [host("home", 8), host("pserv-0", 2)]
            .into_iter()
            .map(|h| policy.apply(h))
            .collect();
        assert_eq!(hosts[0].free_ram(), RamMb(4000));

        let allocation = CapacityAllocator::new()
            .allocate(&[AllocationRequest::fill(OperationKind::Weaken, W)], &hosts);
        assert_eq!(allocation.placed_threads(0), 1 + 2);
        assert_eq!(allocation.residual["home"], RamMb(500));
    }

    #[test]
    fn test_fractional_margin_wins_when_larger() {
        let policy = KeepFreePolicy {
            default_mb: RamMb(1000),
            overrides: HashMap::new(),
            fraction: 0.25,
        };
        assert_eq!(policy.margin_for(&host("x", 64)), RamMb(16_000));
        assert_eq!(policy.margin_for(&host("y", 2)), RamMb(1000));
    }

    #[test]
    fn test_placeable_counts_whole_threads_per_host() {
        let hosts: Vec<_> = (0..4).map(|i| WorkerHost::new(format!("pserv-{i}"), RamMb(3000), 1)).collect();
        let allocator = CapacityAllocator::new();
        assert_eq!(allocator.placeable(&hosts, W), W.times(4));
        assert_eq!(allocator.placeable(&[host("a", 8)], W), W.times(4));
        assert_eq!(allocator.placeable(&[], W), RamMb::ZERO);

        // one thread per host, even though the pooled sum holds six
        let allocation = allocator.allocate(&[AllocationRequest::threads(OperationKind::Weaken, 6, W)], &hosts);
        assert_eq!(allocation.placed_threads(0), 4);
    }

    #[test]
    fn test_equal_free_ties_break_by_name() {
        let hosts = vec![host("zeta", 4), host("alpha", 4)];
        let allocation = CapacityAllocator::new()
            .allocate(&[AllocationRequest::threads(OperationKind::Hack, 1, RamMb(1700))], &hosts);
        assert_eq!(allocation.placements[0][0].host, "alpha");
    }
}
