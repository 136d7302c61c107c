//! Authorization proof building
//!
//! A proof is a serialized chain call against the policy package: the
//! credential type's well-known entrypoint, its proof objects, and the raw
//! identity bytes. The call is dry-run before it is ever presented to a key
//! server — proofs are not submitted speculatively.

use tracing::debug;

use plume_core::error::CollaboratorError;
use plume_core::identity::ContentIdentity;
use plume_core::traits::{AuthorizationCall, CallArg, ChainRpc};

use crate::credential::AccessCredential;
use crate::error::AccessError;

/// Build and validate the authorization proof for one credential type.
///
/// Returns the transaction-shaped proof blob the key servers verify.
pub async fn build_proof(
    chain: &dyn ChainRpc,
    package_id: &str,
    credential: &AccessCredential,
    identity: &ContentIdentity,
) -> Result<Vec<u8>, AccessError> {
    let mut args: Vec<CallArg> = credential
        .proof_objects()
        .into_iter()
        .map(CallArg::Object)
        .collect();
    args.push(CallArg::Bytes(identity.encode().to_vec()));

    let call = AuthorizationCall {
        package: package_id.to_string(),
        entrypoint: credential.entrypoint().to_string(),
        args,
    };

    let tx_bytes = chain
        .build_authorization_call(&call)
        .await
        .map_err(|e| AccessError::ChainUnavailable(e.to_string()))?;

    match chain.dry_run(&tx_bytes).await {
        Ok(()) => {
            debug!(entrypoint = call.entrypoint, "authorization call accepted");
            Ok(tx_bytes)
        }
        Err(CollaboratorError::DryRunRejected(reason)) => Err(AccessError::ProofRejected {
            kind: credential.kind(),
            reason,
        }),
        Err(e) => Err(AccessError::ChainUnavailable(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plume_core::identity::PublicationAddress;
    use plume_core::mock::MockChain;

    fn test_identity() -> ContentIdentity {
        ContentIdentity::for_article(PublicationAddress::new([9u8; 32]), "Hello", 1000).unwrap()
    }

    #[tokio::test]
    async fn test_builds_and_dry_runs() {
        let chain = MockChain::new();
        let credential = AccessCredential::Owner {
            capability: "0xcap".to_string(),
        };
        let proof = build_proof(&chain, "0xpkg", &credential, &test_identity())
            .await
            .unwrap();
        assert!(!proof.is_empty());
        assert_eq!(chain.dry_run_count(), 1);

        let calls = chain.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].entrypoint, "assert_owner");
        assert_eq!(calls[0].package, "0xpkg");
        assert_eq!(calls[0].args[0], CallArg::Object("0xcap".to_string()));
        assert_eq!(
            calls[0].args[1],
            CallArg::Bytes(test_identity().encode().to_vec())
        );
    }

    #[tokio::test]
    async fn test_dry_run_rejection_is_proof_rejected() {
        let chain = MockChain::new();
        chain.reject_entrypoint("assert_subscription", "subscription lapsed");
        let credential = AccessCredential::Subscription {
            subscription: "0xsub".to_string(),
            service: "0xsvc".to_string(),
        };
        let err = build_proof(&chain, "0xpkg", &credential, &test_identity())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccessError::ProofRejected {
                kind: "subscription",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_free_access_call_has_identity_only() {
        let chain = MockChain::new();
        build_proof(&chain, "0xpkg", &AccessCredential::FreeAccess, &test_identity())
            .await
            .unwrap();
        let calls = chain.calls();
        assert_eq!(calls[0].entrypoint, "assert_open_access");
        assert_eq!(calls[0].args.len(), 1);
    }
}
