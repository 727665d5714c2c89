use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IStakingPool {
        function poolStakers(address staker) external view returns (uint256 amount, uint256 rewardDebt, uint256 lastRewardMultiplier, uint256 lastUpdateTime);
        function getRewards(address staker) external view returns (uint256);
    }
}
