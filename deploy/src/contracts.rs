use ethers::contract::abigen;

// Read side of the DAO contract. Deployment goes through the compiled
// artifact, so only the accessors used to check the fresh instance are bound.
abigen!(
    DAO,
    r#"[
        function admin() external view returns (address)
        function memberCount() external view returns (uint256)
        function proposalCount() external view returns (uint256)
    ]"#
);
