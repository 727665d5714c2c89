pub mod position_manager;
pub mod presale;
pub mod staking;

pub use position_manager::INonfungiblePositionManager;
pub use presale::IPresale;
pub use staking::IStakingPool;
