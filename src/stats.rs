//! Aggregate simulation counters.

/// Counters accumulated by the timing core over one run.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    /// Total simulated cycles, including the final drain check.
    pub cycles: u64,
    /// Instructions admitted to an issue queue.
    pub instructions_issued: u64,
    /// Cycles decode held the fetched instruction back on a register hazard.
    pub hazard_stall_cycles: u64,
    /// Cycles decode held the fetched instruction back on a full queue.
    pub capacity_stall_cycles: u64,
    /// Vector-memory element accesses denied by a busy bank.
    pub bank_conflicts: u64,
}
