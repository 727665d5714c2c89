use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IPresale {
        function userDeposits(address user) external view returns (uint256);
    }
}
