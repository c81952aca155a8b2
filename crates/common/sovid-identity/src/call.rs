//! Wire form of the calls an identity accepts: `selector ‖ CBOR(call)`.

use crate::claims::{ClaimId, NewClaim};
use crate::error::{IdentityError, Result};
use crate::key_store::{KeyId, KeyType, Purpose};
use serde::{Deserialize, Serialize};
use sovid_crypto::{keccak256, Address, H256};

/// First four bytes of call data.
pub type Selector = [u8; 4];

pub const ADD_KEY: &str = "addKey(bytes32,uint256,uint256)";
pub const REMOVE_KEY: &str = "removeKey(bytes32,uint256)";
pub const CHANGE_MANAGEMENT_THRESHOLD: &str = "changeManagementThreshold(uint256)";
pub const CHANGE_ACTION_THRESHOLD: &str = "changeActionThreshold(uint256)";
pub const SET_FUNC: &str = "setFunc(bytes32,address,bytes4,bool)";
pub const ADD_CLAIM: &str = "addClaim(uint256,uint256,address,bytes,bytes,string)";
pub const REMOVE_CLAIM: &str = "removeClaim(bytes32)";
pub const REFRESH_CLAIM: &str = "refreshClaim(bytes32)";
pub const EXECUTE: &str = "execute(address,uint256,bytes)";
pub const APPROVE: &str = "approve(bytes32,bool)";

/// `keccak256(signature)[..4]`
pub fn selector_for(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    [hash.0[0], hash.0[1], hash.0[2], hash.0[3]]
}

/// Selector of arbitrary call data, if it is long enough to carry one.
pub fn selector_of(data: &[u8]) -> Option<Selector> {
    data.get(..4).and_then(|s| s.try_into().ok())
}

/// A call addressed to an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityCall {
    AddKey {
        key: KeyId,
        purpose: Purpose,
        key_type: KeyType,
    },
    RemoveKey {
        key: KeyId,
        purpose: Purpose,
    },
    ChangeManagementThreshold {
        threshold: u32,
    },
    ChangeActionThreshold {
        threshold: u32,
    },
    SetFunc {
        key: KeyId,
        to: Address,
        selector: Selector,
        allowed: bool,
    },
    AddClaim(NewClaim),
    RemoveClaim {
        claim_id: ClaimId,
    },
    RefreshClaim {
        claim_id: ClaimId,
    },
    Execute {
        to: Address,
        value: u64,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
    Approve {
        id: H256,
        approve: bool,
    },
}

impl IdentityCall {
    pub fn signature(&self) -> &'static str {
        match self {
            IdentityCall::AddKey { .. } => ADD_KEY,
            IdentityCall::RemoveKey { .. } => REMOVE_KEY,
            IdentityCall::ChangeManagementThreshold { .. } => CHANGE_MANAGEMENT_THRESHOLD,
            IdentityCall::ChangeActionThreshold { .. } => CHANGE_ACTION_THRESHOLD,
            IdentityCall::SetFunc { .. } => SET_FUNC,
            IdentityCall::AddClaim(_) => ADD_CLAIM,
            IdentityCall::RemoveClaim { .. } => REMOVE_CLAIM,
            IdentityCall::RefreshClaim { .. } => REFRESH_CLAIM,
            IdentityCall::Execute { .. } => EXECUTE,
            IdentityCall::Approve { .. } => APPROVE,
        }
    }

    pub fn selector(&self) -> Selector {
        selector_for(self.signature())
    }

    /// Purposes that may make this call directly, subject to their class threshold.
    pub(crate) fn direct_purposes(&self) -> &'static [Purpose] {
        match self {
            IdentityCall::AddKey { .. } => &[Purpose::Management, Purpose::Restore],
            IdentityCall::RemoveKey { .. }
            | IdentityCall::ChangeManagementThreshold { .. }
            | IdentityCall::ChangeActionThreshold { .. }
            | IdentityCall::SetFunc { .. } => &[Purpose::Management],
            IdentityCall::AddClaim(_) => &[Purpose::Management, Purpose::Claim],
            IdentityCall::RemoveClaim { .. } => &[Purpose::Management, Purpose::Action],
            IdentityCall::RefreshClaim { .. } | IdentityCall::Execute { .. } | IdentityCall::Approve { .. } => &[],
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = serde_cbor::to_vec(self).map_err(|e| IdentityError::MalformedCall(e.to_string()))?;
        let mut out = Vec::with_capacity(4 + body.len());
        out.extend_from_slice(&self.selector());
        out.extend_from_slice(&body);
        Ok(out)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let selector = selector_of(data)
            .ok_or_else(|| IdentityError::MalformedCall(format!("{} bytes is too short for a selector", data.len())))?;
        let call: IdentityCall =
            serde_cbor::from_slice(&data[4..]).map_err(|e| IdentityError::MalformedCall(e.to_string()))?;
        if call.selector() != selector {
            return Err(IdentityError::MalformedCall(format!(
                "selector 0x{} does not match {}",
                hex::encode(selector),
                call.signature()
            )));
        }
        Ok(call)
    }
}
