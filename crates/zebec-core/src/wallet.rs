//! The wallet collaborator that signs for the operation's authority.

use async_trait::async_trait;
use chain_sol::{Pubkey, Signer};

use crate::error::SdkError;

/// Supplies the authority's signature. Implementations may prompt a user or
/// call out to a remote signer.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    async fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError>;
}

#[async_trait]
impl<T> WalletSigner for T
where
    T: Signer + Send + Sync,
{
    fn pubkey(&self) -> Pubkey {
        Signer::pubkey(self)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<[u8; 64], SdkError> {
        Ok(Signer::sign_message(self, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_sol::Keypair;
    use std::sync::Arc;

    #[tokio::test]
    async fn keypair_is_a_wallet() {
        let keypair = Keypair::from_seed(&[9; 32]);
        let expected = Signer::sign_message(&keypair, b"msg");
        let wallet: Arc<dyn WalletSigner> = Arc::new(keypair.clone());

        assert_eq!(wallet.pubkey(), Signer::pubkey(&keypair));
        assert_eq!(wallet.sign_message(b"msg").await.unwrap(), expected);
    }
}
