use crate::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// What an identity check reports about a voter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterStatus {
    /// Credential valid and no ballot cast yet
    pub eligible: bool,
    pub wallet_address: Option<Address>,
}

/// Binds one wallet address to one voter, once
pub struct WalletBindingService<S> {
    store: Arc<S>,
    replay: Arc<ReplayGuard>,
}

impl<S: LedgerStore> WalletBindingService<S> {
    pub fn new(store: Arc<S>, replay: Arc<ReplayGuard>) -> Self {
        WalletBindingService { store, replay }
    }

    /// Bind `claimed_address` to the voter
    ///
    /// `message` must be a wallet binding intent naming this voter, signed by
    /// `claimed_address`. A voter that already has a wallet can never be re-bound,
    /// even with a valid signature from another address.
    pub fn bind(
        &self,
        voter_id: &str,
        presented_token: &str,
        claimed_address: &Address,
        message: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        let mut voter = self.store.voter(voter_id)?;
        if !voter.token_matches(presented_token) {
            warn!("wallet binding rejected: invalid credential");
            return Err(Error::InvalidCredential);
        }

        verify_signer(message, signature, claimed_address)?;
        let intent = Intent::parse(message)?;
        intent.expect_bind_wallet(voter_id)?;
        self.replay.check(&intent, now)?;

        loop {
            if voter.wallet_address.is_some() {
                warn!("wallet binding rejected: voter already bound");
                return Err(Error::AlreadyBound);
            }

            let expected_version = voter.version;
            let mut bound = voter.clone();
            bound.wallet_address = Some(*claimed_address);

            if self
                .store
                .compare_and_swap_voter(voter_id, expected_version, bound)?
            {
                self.replay.record(&intent);
                info!("wallet {} bound", claimed_address);
                return Ok(());
            }

            // Lost a race; re-read and decide again against the new state
            debug!("wallet binding hit a version conflict, re-reading voter");
            voter = self.store.voter(voter_id)?;
            if !voter.token_matches(presented_token) {
                return Err(Error::InvalidCredential);
            }
        }
    }

    /// Eligibility and bound wallet for a voter presenting `presented_token`
    pub fn status(&self, voter_id: &str, presented_token: &str) -> Result<VoterStatus, Error> {
        let voter = self.store.voter(voter_id)?;
        if !voter.token_matches(presented_token) {
            return Err(Error::InvalidCredential);
        }
        Ok(VoterStatus {
            eligible: !voter.used,
            wallet_address: voter.wallet_address,
        })
    }
}
