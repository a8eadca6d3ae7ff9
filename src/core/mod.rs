pub mod breaks;
pub mod correction;
pub mod ledger;
pub mod locks;
pub mod monthly;
pub mod normalize;
pub mod schedule;
