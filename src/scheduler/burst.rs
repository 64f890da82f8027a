//! Burst-time statistics and the DRRHA time-slice formula.
//!
//! The remaining burst time of a job estimates, in seconds, how long it still
//! needs at the current per-PE speed, scaled by the PEs it occupies:
//! `remaining_length / mips_per_pe * pes`. It is recomputed on every use
//! because the speed may change between ticks.

use std::cmp::Ordering;

use crate::core::state::{JobExec, SchedCtx};

pub fn remaining_burst_time(job: &JobExec, mips_per_pe: f64) -> f64 {
    job.remaining_length / mips_per_pe * job.pes as f64
}

/// Waiting-list order: shortest remaining burst first, then lowest id.
pub fn compare(a: &JobExec, b: &JobExec, mips_per_pe: f64) -> Ordering {
    remaining_burst_time(a, mips_per_pe)
        .total_cmp(&remaining_burst_time(b, mips_per_pe))
        .then_with(|| a.id.cmp(&b.id))
}

/// Mean remaining burst time over the waiting list, 0 when it is empty.
pub fn mean_burst_time(ctx: &SchedCtx) -> f64 {
    let mips = ctx.mips_per_pe();
    let (sum, n) = ctx
        .waiting_jobs()
        .fold((0.0, 0usize), |(sum, n), job| {
            (sum + remaining_burst_time(job, mips), n + 1)
        });
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// Mean remaining burst time over the waiting list with `candidate` counted
/// once, whether or not it is waiting.
pub fn mean_burst_time_with(ctx: &SchedCtx, candidate: &JobExec) -> f64 {
    let mips = ctx.mips_per_pe();
    let (sum, n) = ctx
        .waiting_jobs()
        .filter(|job| job.id != candidate.id)
        .fold((0.0, 0usize), |(sum, n), job| {
            (sum + remaining_burst_time(job, mips), n + 1)
        });
    (sum + remaining_burst_time(candidate, mips)) / (n + 1) as f64
}

/// `mean/2 + (mean/2)/burst`, floored at `minimum_granularity`.
///
/// A job with nothing left to run has no meaningful slice and gets
/// `f64::INFINITY`.
pub fn time_slice(mean: f64, burst: f64, minimum_granularity: f64) -> f64 {
    if burst <= 0.0 {
        return f64::INFINITY;
    }
    let half = mean / 2.0;
    (half + half / burst).max(minimum_granularity)
}

/// Negative virtual runtime given to jobs that have not run since they last
/// became ready. Lower ids and longer jobs get more negative values.
pub fn initial_virtual_runtime(job: &JobExec, mips_per_pe: f64) -> f64 {
    let inverse_id = i32::MAX as f64 / (job.id as f64 + 1.0);
    -(remaining_burst_time(job, mips_per_pe) + inverse_id).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::MipsShare;
    use proptest::prelude::*;

    fn ctx_with_waiting(lengths: &[f64]) -> SchedCtx {
        let mut ctx = SchedCtx::new(&MipsShare::new(1, 100.0).unwrap());
        for (id, &length) in lengths.iter().enumerate() {
            ctx.insert_waiting(JobExec::new(id as u64, length, 1)).unwrap();
        }
        ctx
    }

    #[test]
    fn burst_time_scales_with_pes() {
        assert_eq!(remaining_burst_time(&JobExec::new(0, 1000.0, 1), 100.0), 10.0);
        assert_eq!(remaining_burst_time(&JobExec::new(0, 1000.0, 2), 100.0), 20.0);
    }

    #[test]
    fn solo_job_slice() {
        let ctx = ctx_with_waiting(&[]);
        let job = JobExec::new(0, 1000.0, 1);
        let mean = mean_burst_time_with(&ctx, &job);
        assert_eq!(mean, 10.0);
        assert_eq!(time_slice(mean, 10.0, 0.0), 5.5);
    }

    #[test]
    fn mean_counts_candidate_once() {
        let ctx = ctx_with_waiting(&[1000.0, 3000.0]);
        assert_eq!(mean_burst_time(&ctx), 20.0);

        let waiting = ctx.job_by_id(0).unwrap();
        assert_eq!(mean_burst_time_with(&ctx, waiting), 20.0);

        let outsider = JobExec::new(9, 5000.0, 1);
        assert_eq!(mean_burst_time_with(&ctx, &outsider), 30.0);
    }

    #[test]
    fn empty_waiting_mean_is_zero() {
        assert_eq!(mean_burst_time(&ctx_with_waiting(&[])), 0.0);
    }

    #[test]
    fn finished_job_slice_is_infinite() {
        assert_eq!(time_slice(10.0, 0.0, 2.0), f64::INFINITY);
    }

    #[test]
    fn granularity_floors_the_slice() {
        assert_eq!(time_slice(1.0, 1.0, 2.0), 2.0);
        assert_eq!(time_slice(10.0, 10.0, 2.0), 5.5);
    }

    #[test]
    fn initial_vruntime_is_negative_and_favours_lower_ids() {
        let a = JobExec::new(0, 1000.0, 1);
        let b = JobExec::new(1, 1000.0, 1);
        let va = initial_virtual_runtime(&a, 100.0);
        let vb = initial_virtual_runtime(&b, 100.0);
        assert!(va < 0.0 && vb < 0.0);
        assert!(va < vb);
    }

    proptest! {
        #[test]
        fn compare_orders_by_burst_then_id(
            la in 1.0f64..1e6,
            lb in 1.0f64..1e6,
            ia in 0u64..1000,
            ib in 0u64..1000,
        ) {
            prop_assume!(ia != ib);
            let a = JobExec::new(ia, la, 1);
            let b = JobExec::new(ib, lb, 1);
            let ord = compare(&a, &b, 1.0);
            if la < lb {
                prop_assert_eq!(ord, Ordering::Less);
            } else if la > lb {
                prop_assert_eq!(ord, Ordering::Greater);
            } else {
                prop_assert_eq!(ord, ia.cmp(&ib));
            }
            prop_assert_eq!(compare(&b, &a, 1.0), ord.reverse());
        }

        #[test]
        fn slice_never_shrinks_as_mean_grows(
            burst in 0.001f64..1e4,
            mean in 0.0f64..1e4,
            extra in 0.0f64..1e4,
            floor in 0.0f64..10.0,
        ) {
            prop_assert!(time_slice(mean + extra, burst, floor) >= time_slice(mean, burst, floor));
        }
    }
}
