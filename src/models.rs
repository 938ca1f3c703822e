//! Core data structures for the batch scheduling core
//!
//! Everything here is a plain value: snapshots of the target and the worker
//! hosts as read from the game, the per-operation specs produced by the
//! planner, and the launch schedules produced by the timing coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// Security above the minimum by less than this still counts as prepped
pub const SECURITY_EPSILON: f64 = 1e-6;

/// Relative shortfall of value below max that still counts as prepped
pub const VALUE_EPSILON: f64 = 1e-9;

// ============================================================================
// RAM
// ============================================================================

/// Execution capacity in whole megabytes
///
/// Game RAM comes in multiples of 0.05 GB, so integer megabytes keep all
/// capacity arithmetic exact.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RamMb(pub u64);

impl RamMb {
    pub const ZERO: Self = Self(0);

    /// Convert from the game's floating-point gigabytes
    pub fn from_gb(gb: f64) -> Self {
        Self((gb.max(0.0) * 1000.0).round() as u64)
    }

    pub fn as_gb(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Footprint of `threads` copies of something costing `self` each
    pub fn times(self, threads: u32) -> Self {
        Self(self.0.saturating_mul(u64::from(threads)))
    }

    /// How many threads of cost `per_thread` fit into `self`
    pub fn threads_fitting(self, per_thread: Self) -> u32 {
        if per_thread.0 == 0 {
            return 0;
        }
        u32::try_from(self.0 / per_thread.0).unwrap_or(u32::MAX)
    }
}

impl Add for RamMb {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for RamMb {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for RamMb {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for RamMb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}GB", self.as_gb())
    }
}

// ============================================================================
// Target
// ============================================================================

/// The resource node being farmed
///
/// `security >= min_security` and `money <= max_money` hold for every value
/// constructed through this API, including deserialized ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TargetRecord")]
pub struct TargetNode {
    name: String,
    money: f64,
    max_money: f64,
    security: f64,
    min_security: f64,
    growth: f64,
    required_skill: u32,
}

/// Raw wire form of a target snapshot, clamped on the way in
#[derive(Debug, Clone, Deserialize)]
struct TargetRecord {
    name: String,
    money: f64,
    max_money: f64,
    security: f64,
    min_security: f64,
    #[serde(default = "default_growth")]
    growth: f64,
    #[serde(default = "default_required_skill")]
    required_skill: u32,
}

fn default_growth() -> f64 {
    1.0
}

fn default_required_skill() -> u32 {
    1
}

impl From<TargetRecord> for TargetNode {
    fn from(raw: TargetRecord) -> Self {
        Self::new(
            raw.name,
            raw.max_money,
            raw.min_security,
            raw.growth,
            raw.required_skill,
        )
        .with_state(raw.money, raw.security)
    }
}

impl TargetNode {
    /// Create a target in its prepped state (max value, minimum security)
    pub fn new(
        name: impl Into<String>,
        max_money: f64,
        min_security: f64,
        growth: f64,
        required_skill: u32,
    ) -> Self {
        let max_money = max_money.max(0.0);
        let min_security = min_security.max(0.0);
        Self {
            name: name.into(),
            money: max_money,
            max_money,
            security: min_security,
            min_security,
            growth,
            required_skill,
        }
    }

    /// Same target with an observed money/security pair, clamped to bounds
    pub fn with_state(mut self, money: f64, security: f64) -> Self {
        self.set_money(money);
        self.set_security(security);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn money(&self) -> f64 {
        self.money
    }

    pub fn max_money(&self) -> f64 {
        self.max_money
    }

    pub fn security(&self) -> f64 {
        self.security
    }

    pub fn min_security(&self) -> f64 {
        self.min_security
    }

    pub fn growth(&self) -> f64 {
        self.growth
    }

    pub fn required_skill(&self) -> u32 {
        self.required_skill
    }

    pub fn set_money(&mut self, money: f64) {
        self.money = money.clamp(0.0, self.max_money);
    }

    pub fn set_security(&mut self, security: f64) {
        self.security = security.max(self.min_security);
    }

    /// Security above the minimum
    pub fn security_excess(&self) -> f64 {
        (self.security - self.min_security).max(0.0)
    }

    pub fn is_security_prepped(&self) -> bool {
        self.security_excess() <= SECURITY_EPSILON
    }

    pub fn is_value_prepped(&self) -> bool {
        self.money >= self.max_money * (1.0 - VALUE_EPSILON)
    }

    /// Max value and minimum security
    pub fn is_prepped(&self) -> bool {
        self.is_security_prepped() && self.is_value_prepped()
    }

    /// Working copy as it would look once fully prepped
    pub fn prepped(&self) -> Self {
        Self {
            money: self.max_money,
            security: self.min_security,
            ..self.clone()
        }
    }
}

// ============================================================================
// Worker hosts
// ============================================================================

/// An execution location with finite RAM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerHost {
    pub name: String,
    pub max_ram: RamMb,
    pub used_ram: RamMb,
    #[serde(default = "default_cores")]
    pub cores: u32,
    /// Capacity deliberately left unused on this host
    #[serde(default)]
    pub keep_free: RamMb,
}

fn default_cores() -> u32 {
    1
}

impl WorkerHost {
    pub fn new(name: impl Into<String>, max_ram: RamMb, cores: u32) -> Self {
        Self {
            name: name.into(),
            max_ram,
            used_ram: RamMb::ZERO,
            cores: cores.max(1),
            keep_free: RamMb::ZERO,
        }
    }

    pub fn with_used(mut self, used: RamMb) -> Self {
        self.used_ram = used;
        self
    }

    /// `max - used - keep_free`, never negative even if external consumers
    /// pushed `used` past the allocation target
    pub fn free_ram(&self) -> RamMb {
        self.max_ram
            .saturating_sub(self.used_ram)
            .saturating_sub(self.keep_free)
    }
}

// ============================================================================
// Actor
// ============================================================================

/// Attributes of the player running the operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorAttributes {
    pub hacking_skill: u32,
    #[serde(default = "default_mult")]
    pub hack_money_mult: f64,
    #[serde(default = "default_mult")]
    pub hack_speed_mult: f64,
    #[serde(default = "default_mult")]
    pub grow_mult: f64,
}

fn default_mult() -> f64 {
    1.0
}

impl ActorAttributes {
    pub fn new(hacking_skill: u32) -> Self {
        Self {
            hacking_skill,
            hack_money_mult: 1.0,
            hack_speed_mult: 1.0,
            grow_mult: 1.0,
        }
    }
}

impl Default for ActorAttributes {
    fn default() -> Self {
        Self::new(1)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// The three operations the game can run against a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Hack,
    Grow,
    Weaken,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hack => "hack",
            Self::Grow => "grow",
            Self::Weaken => "weaken",
        }
    }

    pub fn all() -> [Self; 3] {
        [Self::Hack, Self::Grow, Self::Weaken]
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an operation inside a batch, in completion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BatchRole {
    Hack,
    WeakenHack,
    Grow,
    WeakenGrow,
}

impl BatchRole {
    pub const ALL: [Self; 4] = [Self::Hack, Self::WeakenHack, Self::Grow, Self::WeakenGrow];

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Hack => OperationKind::Hack,
            Self::Grow => OperationKind::Grow,
            Self::WeakenHack | Self::WeakenGrow => OperationKind::Weaken,
        }
    }

    /// Zero-based completion slot
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hack => "hack",
            Self::WeakenHack => "weaken-hack",
            Self::Grow => "grow",
            Self::WeakenGrow => "weaken-grow",
        }
    }
}

impl fmt::Display for BatchRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RAM cost per thread of each operation's script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptCosts {
    pub hack: RamMb,
    pub grow: RamMb,
    pub weaken: RamMb,
}

impl ScriptCosts {
    pub fn cost(&self, kind: OperationKind) -> RamMb {
        match kind {
            OperationKind::Hack => self.hack,
            OperationKind::Grow => self.grow,
            OperationKind::Weaken => self.weaken,
        }
    }

    /// Most expensive script; any thread fits where this one does
    pub fn largest(&self) -> RamMb {
        self.hack.max(self.grow).max(self.weaken)
    }
}

impl Default for ScriptCosts {
    fn default() -> Self {
        Self {
            hack: RamMb(1700),
            grow: RamMb(1750),
            weaken: RamMb(1750),
        }
    }
}

/// One operation's share of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub kind: OperationKind,
    pub threads: u32,
    pub ram_per_thread: RamMb,
    pub duration: Duration,
    /// Security change this operation causes; negative for weaken
    pub security_delta: f64,
}

impl OperationSpec {
    pub fn ram(&self) -> RamMb {
        self.ram_per_thread.times(self.threads)
    }
}

/// The four operations of one coordinated batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPlan {
    pub target: String,
    /// Whole-percent extraction this plan was built for
    pub extract_percent: u32,
    /// Fraction of max value the hack threads actually remove
    pub extract_fraction: f64,
    operations: [OperationSpec; 4],
}

impl BatchPlan {
    pub fn new(
        target: impl Into<String>,
        extract_percent: u32,
        extract_fraction: f64,
        operations: [OperationSpec; 4],
    ) -> Self {
        Self {
            target: target.into(),
            extract_percent,
            extract_fraction,
            operations,
        }
    }

    pub fn operation(&self, role: BatchRole) -> &OperationSpec {
        &self.operations[role.index()]
    }

    pub fn operations(&self) -> impl Iterator<Item = (BatchRole, &OperationSpec)> {
        BatchRole::ALL.into_iter().zip(self.operations.iter())
    }

    pub fn threads(&self, role: BatchRole) -> u32 {
        self.operation(role).threads
    }

    pub fn total_ram(&self) -> RamMb {
        self.operations.iter().map(OperationSpec::ram).sum()
    }

    /// The longest of the four operation durations
    pub fn duration(&self) -> Duration {
        self.operations
            .iter()
            .map(|op| op.duration)
            .max()
            .unwrap_or_default()
    }

    pub fn durations(&self) -> [Duration; 4] {
        BatchRole::ALL.map(|role| self.operation(role).duration)
    }
}

/// Start delays for the four batch operations, relative to "now"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSchedule {
    pub spacing: Duration,
    delays: [Duration; 4],
    durations: [Duration; 4],
}

impl LaunchSchedule {
    pub fn new(spacing: Duration, delays: [Duration; 4], durations: [Duration; 4]) -> Self {
        Self {
            spacing,
            delays,
            durations,
        }
    }

    pub fn delay(&self, role: BatchRole) -> Duration {
        self.delays[role.index()]
    }

    pub fn delays(&self) -> [Duration; 4] {
        self.delays
    }

    /// Completion offset of `role` measured from "now"
    pub fn completion(&self, role: BatchRole) -> Duration {
        self.delays[role.index()] + self.durations[role.index()]
    }

    /// Wall time from launch until the last operation lands
    pub fn makespan(&self) -> Duration {
        self.completion(BatchRole::WeakenGrow)
    }
}
