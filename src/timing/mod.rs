//! Launch timing for batches
//!
//! Operations of one batch are launched at different moments but must land
//! in a fixed order, each `spacing` after the previous one:
//!
//! ```text
//! hack         |-----------|
//! weaken-hack  |----------------------|        lands +D
//! grow            |------------------|         lands +2D
//! weaken-grow     |----------------------|     lands +3D
//! ```
//!
//! Arithmetic runs on signed nanoseconds so the completion gaps come out
//! exact for any input durations.

use std::time::Duration;

use crate::models::{BatchPlan, LaunchSchedule};

/// Computes start delays that order completions with fixed spacing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingCoordinator {
    spacing: Duration,
}

impl TimingCoordinator {
    pub fn new(spacing: Duration) -> Self {
        Self { spacing }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Start delays for operations that must complete in slice order, the
    /// `i`-th landing `i * spacing` after the first
    pub fn sequence(&self, durations: &[Duration]) -> Vec<Duration> {
        let spacing = self.spacing.as_nanos() as i128;
        let starts: Vec<i128> = durations
            .iter()
            .enumerate()
            .map(|(slot, duration)| slot as i128 * spacing - duration.as_nanos() as i128)
            .collect();
        let earliest = starts.iter().copied().min().unwrap_or(0);
        starts
            .into_iter()
            .map(|start| nanos_to_duration(start - earliest))
            .collect()
    }

    /// Schedule for the four durations in batch role order
    pub fn schedule(&self, durations: [Duration; 4]) -> LaunchSchedule {
        let delays = self.sequence(&durations);
        let delays = [delays[0], delays[1], delays[2], delays[3]];
        LaunchSchedule::new(self.spacing, delays, durations)
    }

    pub fn schedule_plan(&self, plan: &BatchPlan) -> LaunchSchedule {
        self.schedule(plan.durations())
    }
}

fn nanos_to_duration(nanos: i128) -> Duration {
    let nanos = u128::try_from(nanos).unwrap_or(0);
    let secs = (nanos / 1_000_000_000) as u64;
    let sub = (nanos % 1_000_000_000) as u32;
    Duration::new(secs, sub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchRole;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_game_ratio_schedule() {
        let coordinator = TimingCoordinator::new(ms(50));
        let schedule = coordinator.schedule([ms(1000), ms(4000), ms(3200), ms(4000)]);

        // weaken-hack is the longest op launched earliest
        assert_eq!(schedule.delay(BatchRole::WeakenHack), ms(0));
        assert_eq!(schedule.delay(BatchRole::Hack), ms(2950));
        assert_eq!(schedule.delay(BatchRole::Grow), ms(850));
        assert_eq!(schedule.delay(BatchRole::WeakenGrow), ms(100));

        assert_eq!(schedule.completion(BatchRole::Hack), ms(3950));
        assert_eq!(schedule.completion(BatchRole::WeakenHack), ms(4000));
        assert_eq!(schedule.completion(BatchRole::Grow), ms(4050));
        assert_eq!(schedule.makespan(), ms(4100));
    }

    #[test]
    fn test_equal_durations_stay_spaced() {
        let coordinator = TimingCoordinator::new(ms(20));
        let schedule = coordinator.schedule([ms(500); 4]);
        assert_eq!(schedule.delays(), [ms(0), ms(20), ms(40), ms(60)]);
    }

    #[test]
    fn test_hack_longest() {
        let coordinator = TimingCoordinator::new(ms(10));
        let schedule = coordinator.schedule([ms(900), ms(100), ms(100), ms(100)]);
        assert_eq!(schedule.delay(BatchRole::Hack), ms(0));
        assert_eq!(schedule.completion(BatchRole::WeakenGrow), ms(930));
    }

    #[test]
    fn test_two_step_sequence() {
        let coordinator = TimingCoordinator::new(ms(100));
        let delays = coordinator.sequence(&[ms(3200), ms(4000)]);
        assert_eq!(delays, vec![ms(700), ms(0)]);
    }

    #[test]
    fn test_empty_sequence() {
        let coordinator = TimingCoordinator::new(ms(100));
        assert!(coordinator.sequence(&[]).is_empty());
    }
}
