use clap::ValueEnum;

pub mod accuracy;
pub mod channel;
pub mod config;
pub mod error;
pub mod harness;
pub mod histogram;
pub mod policy;
pub mod report;
pub mod schema;
pub mod suite;

use accuracy::StructureKind;

/// Estimator(s) to run in the accuracy suite.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum KindSelection {
    /// Both estimators, HyperMinHash first.
    #[default]
    All,
    /// Built-in HyperLogLog (`PFADD`/`PFCOUNT`) only.
    Hll,
    /// HyperMinHash module (`MH.ADD`/`MH.COUNT`) only.
    Hmh,
}

impl KindSelection {
    pub fn kinds(&self) -> Vec<StructureKind> {
        match self {
            KindSelection::All => StructureKind::ALL.to_vec(),
            KindSelection::Hll => vec![StructureKind::HyperLogLog],
            KindSelection::Hmh => vec![StructureKind::HyperMinHash],
        }
    }
}
