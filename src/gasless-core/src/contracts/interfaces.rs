//! Solidity ABI bindings for the contracts the pipeline reads from or calls through.

use alloy_sol_types::sol;

sol! {
    /// Entry point v0.7 packed user operation (on-chain layout).
    struct PackedUserOperation {
        address sender;
        uint256 nonce;
        bytes initCode;
        bytes callData;
        bytes32 accountGasLimits;
        uint256 preVerificationGas;
        bytes32 gasFees;
        bytes paymasterAndData;
        bytes signature;
    }

    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256 nonce);
        function getUserOpHash(PackedUserOperation userOp) external view returns (bytes32);
        function balanceOf(address account) external view returns (uint256);
    }

    interface IAccountFactory {
        function getAddress(address owner, uint256 salt) external view returns (address);
        function createAccount(address owner, uint256 salt) external returns (address ret);
    }

    interface ISmartAccount {
        function executeBatch(address[] dest, uint256[] value, bytes[] func) external;
    }

    interface IERC20 {
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    interface ISponsorPool {
        function token() external view returns (address);
        function feeBasisPoints() external view returns (uint256);
        function minTransferAmount() external view returns (uint256);
        function owner() external view returns (address);
    }
}
