//! OOM killer (spec.md §4.8): triggered when the global memory
//! accounting drops below a configured threshold. Scoring and victim
//! selection are pure functions over a small trait so `task::process`
//! doesn't need to depend on this module's internals, and so the
//! scoring rule itself is unit-testable without a live process table.

extern crate alloc;

use alloc::vec::Vec;

use crate::task::pid::INIT_PID;

/// A process with `oom_score_adj == PROTECTED` is never selected,
/// regardless of its memory footprint (spec.md §4.8).
pub const PROTECTED_SCORE_ADJ: i32 = -1000;

pub trait OomCandidate {
    fn pid(&self) -> u32;
    fn rss_bytes(&self) -> u64;
    fn oom_score_adj(&self) -> i32;
}

/// `(rss_bytes * 1000) / total_ram + oom_score_adj` (spec.md §4.8).
pub fn score(rss_bytes: u64, total_ram_bytes: u64, oom_score_adj: i32) -> i64 {
    let ram_fraction = if total_ram_bytes == 0 {
        0
    } else {
        (rss_bytes as u128 * 1000 / total_ram_bytes as u128) as i64
    };
    ram_fraction + oom_score_adj as i64
}

/// Picks the highest-scoring candidate, skipping PID 1 and any
/// protected process. Returns `None` if there is nothing killable
/// (spec.md §7: that case is fatal at the caller, not here).
pub fn select_victim<C: OomCandidate>(total_ram_bytes: u64, candidates: &[C]) -> Option<u32> {
    candidates
        .iter()
        .filter(|c| c.pid() != INIT_PID && c.oom_score_adj() != PROTECTED_SCORE_ADJ)
        .map(|c| (c.pid(), score(c.rss_bytes(), total_ram_bytes, c.oom_score_adj())))
        .fold(None::<(u32, i64)>, |best, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(pid, _)| pid)
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    struct Candidate {
        pid: u32,
        rss_bytes: u64,
        oom_score_adj: i32,
    }

    impl OomCandidate for Candidate {
        fn pid(&self) -> u32 {
            self.pid
        }
        fn rss_bytes(&self) -> u64 {
            self.rss_bytes
        }
        fn oom_score_adj(&self) -> i32 {
            self.oom_score_adj
        }
    }

    #[test]
    fn highest_score_wins() {
        let candidates = Vec::from([
            Candidate { pid: 2, rss_bytes: 1_000, oom_score_adj: 0 },
            Candidate { pid: 3, rss_bytes: 9_000, oom_score_adj: 0 },
        ]);
        assert_eq!(select_victim(10_000, &candidates), Some(3));
    }

    #[test]
    fn init_process_is_never_selected() {
        let candidates = Vec::from([Candidate {
            pid: INIT_PID,
            rss_bytes: 1_000_000,
            oom_score_adj: 0,
        }]);
        assert_eq!(select_victim(10_000, &candidates), None);
    }

    #[test]
    fn protected_score_adj_is_never_selected() {
        let candidates = Vec::from([
            Candidate { pid: 5, rss_bytes: 1_000_000, oom_score_adj: PROTECTED_SCORE_ADJ },
            Candidate { pid: 6, rss_bytes: 1, oom_score_adj: 0 },
        ]);
        assert_eq!(select_victim(10_000, &candidates), Some(6));
    }
}
