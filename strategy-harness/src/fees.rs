use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

/// 10_000 basis points = 100%.
pub const MAX_BPS: u64 = 10_000;

/// Fee rates passed to the vault at initialization, in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub performance_fee_governance: u64,
    pub performance_fee_strategist: u64,
    pub withdrawal_fee: u64,
    pub management_fee: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            performance_fee_governance: 2_000,
            performance_fee_strategist: 0,
            withdrawal_fee: 10,
            management_fee: 0,
        }
    }
}

impl FeeConfig {
    /// Reject rates above 100%.
    pub fn validate(&self) -> Result<(), HarnessError> {
        for (name, bps) in [
            ("performance_fee_governance", self.performance_fee_governance),
            ("performance_fee_strategist", self.performance_fee_strategist),
            ("withdrawal_fee", self.withdrawal_fee),
            ("management_fee", self.management_fee),
        ] {
            if bps > MAX_BPS {
                return Err(HarnessError::Config(format!(
                    "{name} is {bps} bps, above the {MAX_BPS} bps maximum"
                )));
            }
        }
        Ok(())
    }

    /// `uint256[4]` argument for `initialize`, in the vault's order.
    pub fn as_initialize_args(&self) -> [U256; 4] {
        [
            U256::from(self.performance_fee_governance),
            U256::from(self.performance_fee_strategist),
            U256::from(self.withdrawal_fee),
            U256::from(self.management_fee),
        ]
    }
}

/// Whether two recipients' gains are in the ratio of their fee rates.
///
/// Each gain may be off by one unit from integer division, so the
/// cross-products are compared with a tolerance of `bps_a + bps_b`.
pub fn gains_proportional(gain_a: U256, bps_a: u64, gain_b: U256, bps_b: u64) -> bool {
    let lhs = gain_a * U256::from(bps_b);
    let rhs = gain_b * U256::from(bps_a);
    let diff = if lhs > rhs { lhs - rhs } else { rhs - lhs };
    diff <= U256::from(bps_a + bps_b)
}
