//! Solidity bindings for the contracts the harness drives.
//!
//! Uses alloy's `sol!` macro to generate type-safe ABI encoders/decoders for
//! the token, vault and strategy surfaces, and the vault's reporting events.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IERC20Detailed {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface TheVault {
        event Harvested(address indexed token, uint256 amount, uint256 indexed blockNumber, uint256 timestamp);
        event TreeDistribution(address indexed token, uint256 amount, uint256 indexed blockNumber, uint256 timestamp);

        function initialize(
            address token, address governance, address keeper, address guardian,
            address treasury, address strategist, address badgerTree,
            string calldata name, string calldata symbol, uint256[4] calldata feeConfig
        ) external;

        function token() external view returns (address);
        function strategy() external view returns (address);
        function governance() external view returns (address);
        function strategist() external view returns (address);
        function treasury() external view returns (address);
        function badgerTree() external view returns (address);

        function setStrategy(address strategy) external;
        function setStrategist(address strategist) external;

        function deposit(uint256 amount) external;
        function withdraw(uint256 shares) external;
        function withdrawAll() external;
        function earn() external;

        function available() external view returns (uint256);
        function balance() external view returns (uint256);
        function getPricePerFullShare() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);

        function performanceFeeGovernance() external view returns (uint256);
        function performanceFeeStrategist() external view returns (uint256);
        function withdrawalFee() external view returns (uint256);
        function managementFee() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IStrategy {
        struct TokenAmount {
            address token;
            uint256 amount;
        }

        function initialize(address vault, address[2] calldata swapConfig) external;

        function want() external view returns (address);
        function vault() external view returns (address);

        function harvest() external returns (TokenAmount[] memory harvested);
        function tend() external returns (TokenAmount[] memory tended);

        function balanceOf() external view returns (uint256);
        function balanceOfPool() external view returns (uint256);
        function balanceOfWant() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IGlpFarmer {
        function GMX_ADDRESS() external view returns (address);
        function ES_GMX_ADDRESS() external view returns (address);
        function WETH_ADDRESS() external view returns (address);
        function WETH() external view returns (address);
        function vester() external view returns (address);
    }
}
