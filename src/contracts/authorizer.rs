use crate::permissions::{ActionId, RoleSource};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use ethers::prelude::{abigen, Address, Middleware, U256};

abigen!(
    Authorizer,
    r#"[
        function getRoleMemberCount(bytes32 role) external view returns (uint256)
        function getRoleMember(bytes32 role, uint256 index) external view returns (address)
        function hasRole(bytes32 role, address account) external view returns (bool)
    ]"#
);

#[async_trait]
impl<M: Middleware + 'static> RoleSource for Authorizer<M> {
    async fn role_member_count(&self, action_id: &ActionId) -> anyhow::Result<u64> {
        let count = self
            .get_role_member_count(*action_id.as_bytes())
            .call()
            .await
            .with_context(|| format!("getRoleMemberCount({}) failed", action_id))?;
        member_count(count).with_context(|| format!("getRoleMemberCount({})", action_id))
    }

    async fn role_member(&self, action_id: &ActionId, index: u64) -> anyhow::Result<Address> {
        self.get_role_member(*action_id.as_bytes(), U256::from(index))
            .call()
            .await
            .with_context(|| format!("getRoleMember({}, {}) failed", action_id, index))
    }
}

/// Narrows an on-chain member count to `u64`.
pub fn member_count(count: U256) -> anyhow::Result<u64> {
    if count > U256::from(u64::MAX) {
        return Err(anyhow!("member count {} does not fit in u64", count));
    }
    Ok(count.low_u64())
}
