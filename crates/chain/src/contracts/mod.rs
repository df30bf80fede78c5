//! Contract bindings for the expiring multi-party (EMP) contract.
//!
//! Only the read surface the monitor consumes is declared here. On-chain
//! `FixedPoint.Unsigned` values are single-member tuples, so they decode
//! as [`IExpiringMultiParty::FixedPointUnsigned`] with a `rawValue` field
//! scaled by 1e18.
//!
//! # Example
//!
//! ```rust,ignore
//! use emp_client_chain::IExpiringMultiParty;
//!
//! let emp = IExpiringMultiParty::new(address, &provider);
//! let requirement = emp.collateralRequirement().call().await?._0.rawValue;
//! ```

use alloy::sol;

sol! {
    /// Expiring multi-party contract interface (view subset)
    #[sol(rpc)]
    #[derive(Debug)]
    interface IExpiringMultiParty {
        struct FixedPointUnsigned {
            uint256 rawValue;
        }

        /// Mirrors `Liquidation` in the contract; `state` is the `Status` enum.
        struct LiquidationData {
            address sponsor;
            address liquidator;
            uint8 state;
            uint256 liquidationTime;
            FixedPointUnsigned tokensOutstanding;
            FixedPointUnsigned lockedCollateral;
            FixedPointUnsigned liquidatedCollateral;
            FixedPointUnsigned rawUnitCollateral;
            address disputer;
            FixedPointUnsigned settlementPrice;
            FixedPointUnsigned finalFee;
        }

        event NewSponsor(address indexed sponsor);

        function collateralRequirement() external view returns (FixedPointUnsigned memory);

        function liquidationLiveness() external view returns (uint256);

        function positions(address sponsor) external view returns (
            FixedPointUnsigned memory tokensOutstanding,
            uint256 withdrawalRequestPassTimestamp,
            FixedPointUnsigned memory withdrawalRequestAmount,
            FixedPointUnsigned memory rawCollateral,
            uint256 transferPositionRequestPassTimestamp
        );

        function getCollateral(address sponsor) external view returns (FixedPointUnsigned memory);

        function getLiquidations(address sponsor) external view returns (LiquidationData[] memory);
    }
}

/// Liquidation `Status` enum discriminants as encoded on-chain.
pub mod liquidation_status {
    pub const UNINITIALIZED: u8 = 0;
    pub const PRE_DISPUTE: u8 = 1;
    pub const PENDING_DISPUTE: u8 = 2;
    pub const DISPUTE_SUCCEEDED: u8 = 3;
    pub const DISPUTE_FAILED: u8 = 4;
}
