// Path: crates/services/src/nftoken.rs

//! Non-fungible tokens: minting, burning, and transfer via buy/sell offer
//! matching.

use nexaflow_crypto::sha256;
use nexaflow_types::app::{Address, Drops};
use nexaflow_types::error::TransactionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum transfer fee: 50 000 = 50.000%.
pub const MAX_TRANSFER_FEE: u16 = 50_000;

/// A single non-fungible token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfToken {
    /// Token id: hash of (issuer, taxon, serial).
    pub nftoken_id: String,
    /// The minting account.
    pub issuer: Address,
    /// The current owner.
    pub owner: Address,
    /// Metadata URI.
    pub uri: String,
    /// Transfer fee in 1/100 000 units, 0..=50 000.
    pub transfer_fee: u16,
    /// Issuer-defined category.
    pub taxon: u32,
    /// Whether the token can be transferred between non-issuer accounts.
    pub transferable: bool,
    /// Whether the issuer may burn the token after transfer.
    pub burnable: bool,
    /// Per-issuer minting serial.
    pub serial: u64,
    /// Terminal.
    pub burned: bool,
}

/// A buy or sell offer for an NFToken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NfTokenOffer {
    /// Unique offer id.
    pub offer_id: String,
    /// The token this offer is for.
    pub nftoken_id: String,
    /// The offer creator.
    pub owner: Address,
    /// Price in drops.
    pub amount: Drops,
    /// Restricts acceptance to a specific account when set.
    pub destination: Option<Address>,
    /// True for sell offers (creator must own the token).
    pub is_sell: bool,
    /// Expiration; 0 = none.
    pub expiration: u64,
    /// Terminal: the offer was accepted.
    pub accepted: bool,
    /// Terminal: the offer was cancelled.
    pub cancelled: bool,
}

impl NfTokenOffer {
    /// Whether the offer is still open at `now`.
    pub fn is_open(&self, now: u64) -> bool {
        !self.accepted && !self.cancelled && (self.expiration == 0 || now < self.expiration)
    }
}

/// Manages all NFTokens and their offers.
#[derive(Debug, Clone, Default)]
pub struct NfTokenManager {
    /// All tokens, keyed by id.
    pub tokens: BTreeMap<String, NfToken>,
    /// All offers, keyed by id.
    pub offers: BTreeMap<String, NfTokenOffer>,
    next_serial: BTreeMap<Address, u64>,
}

impl NfTokenManager {
    fn compute_nftoken_id(issuer: &str, taxon: u32, serial: u64) -> String {
        let blob = format!("{}:{}:{}", issuer, taxon, serial);
        hex::encode(sha256(blob.as_bytes()))
    }

    /// Mint a new token. The issuer starts as owner.
    pub fn mint(
        &mut self,
        issuer: &str,
        uri: &str,
        transfer_fee: u16,
        taxon: u32,
        transferable: bool,
        burnable: bool,
    ) -> Result<&NfToken, TransactionError> {
        if transfer_fee > MAX_TRANSFER_FEE {
            return Err(TransactionError::Malformed(format!(
                "transfer_fee must be 0-{}",
                MAX_TRANSFER_FEE
            )));
        }
        let serial = self.next_serial.get(issuer).copied().unwrap_or(0);
        self.next_serial.insert(issuer.to_owned(), serial + 1);
        let nftoken_id = Self::compute_nftoken_id(issuer, taxon, serial);
        let token = NfToken {
            nftoken_id: nftoken_id.clone(),
            issuer: issuer.to_owned(),
            owner: issuer.to_owned(),
            uri: uri.to_owned(),
            transfer_fee,
            taxon,
            transferable,
            burnable,
            serial,
            burned: false,
        };
        log::debug!("nftoken {} minted by {}", nftoken_id, issuer);
        self.tokens.insert(nftoken_id.clone(), token);
        Ok(&self.tokens[&nftoken_id])
    }

    /// Burn a token. The owner may always burn; the issuer only when the
    /// token is burnable.
    pub fn burn(&mut self, nftoken_id: &str, requester: &str) -> Result<&NfToken, TransactionError> {
        let token = self
            .tokens
            .get_mut(nftoken_id)
            .ok_or_else(|| TransactionError::NotFound(format!("NFToken {}", nftoken_id)))?;
        if token.burned {
            return Err(TransactionError::Precondition("Already burned".into()));
        }
        if requester == token.owner || (requester == token.issuer && token.burnable) {
            token.burned = true;
            log::info!("nftoken {} burned by {}", nftoken_id, requester);
            return Ok(token);
        }
        Err(TransactionError::NotAuthorized("Not authorized to burn".into()))
    }

    /// Create a buy or sell offer for a token.
    #[allow(clippy::too_many_arguments)]
    pub fn create_offer(
        &mut self,
        offer_id: &str,
        nftoken_id: &str,
        owner: &str,
        amount: Drops,
        destination: Option<&str>,
        is_sell: bool,
        expiration: u64,
    ) -> Result<&NfTokenOffer, TransactionError> {
        let token = self
            .tokens
            .get(nftoken_id)
            .filter(|t| !t.burned)
            .ok_or_else(|| {
                TransactionError::NotFound(format!("NFToken {} not found or burned", nftoken_id))
            })?;
        if is_sell && token.owner != owner {
            return Err(TransactionError::NotAuthorized(
                "Only the owner can create sell offers".into(),
            ));
        }
        if !is_sell && token.owner == owner {
            return Err(TransactionError::Precondition(
                "Cannot buy your own token".into(),
            ));
        }
        if !is_sell && !token.transferable {
            return Err(TransactionError::Precondition(
                "Token is not transferable".into(),
            ));
        }
        let offer = NfTokenOffer {
            offer_id: offer_id.to_owned(),
            nftoken_id: nftoken_id.to_owned(),
            owner: owner.to_owned(),
            amount,
            destination: destination.map(str::to_owned),
            is_sell,
            expiration,
            accepted: false,
            cancelled: false,
        };
        self.offers.insert(offer_id.to_owned(), offer);
        Ok(&self.offers[offer_id])
    }

    /// Accept an offer, transferring ownership of the token.
    ///
    /// For a sell offer, the acceptor buys the token from the offer owner.
    /// For a buy offer, the token's current owner accepts and sells it.
    pub fn accept_offer(
        &mut self,
        offer_id: &str,
        acceptor: &str,
        now: u64,
    ) -> Result<&NfTokenOffer, TransactionError> {
        let offer = self
            .offers
            .get_mut(offer_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Offer {}", offer_id)))?;
        if !offer.is_open(now) {
            return Err(TransactionError::Expired(
                "Offer is expired or already resolved".into(),
            ));
        }
        let token = self
            .tokens
            .get_mut(&offer.nftoken_id)
            .filter(|t| !t.burned)
            .ok_or_else(|| {
                TransactionError::NotFound(format!(
                    "NFToken {} not found or burned",
                    offer.nftoken_id
                ))
            })?;
        if let Some(dest) = &offer.destination {
            if dest != acceptor {
                return Err(TransactionError::NotAuthorized(
                    "Offer is restricted to a specific account".into(),
                ));
            }
        }
        if offer.is_sell {
            if acceptor == offer.owner {
                return Err(TransactionError::Precondition(
                    "Cannot accept own offer".into(),
                ));
            }
            token.owner = acceptor.to_owned();
        } else {
            if acceptor != token.owner {
                return Err(TransactionError::NotAuthorized(
                    "Only the token owner can accept buy offers".into(),
                ));
            }
            token.owner = offer.owner.clone();
        }
        offer.accepted = true;
        log::info!(
            "nftoken {} transferred to {} via offer {}",
            offer.nftoken_id,
            token.owner,
            offer_id
        );
        Ok(offer)
    }

    /// Cancel an offer; only its creator may cancel.
    pub fn cancel_offer(
        &mut self,
        offer_id: &str,
        requester: &str,
    ) -> Result<&NfTokenOffer, TransactionError> {
        let offer = self
            .offers
            .get_mut(offer_id)
            .ok_or_else(|| TransactionError::NotFound(format!("Offer {}", offer_id)))?;
        if offer.accepted || offer.cancelled {
            return Err(TransactionError::Precondition(
                "Offer already resolved".into(),
            ));
        }
        if offer.owner != requester {
            return Err(TransactionError::NotAuthorized(
                "Only the offer creator can cancel".into(),
            ));
        }
        offer.cancelled = true;
        Ok(offer)
    }

    /// Look up a token by id.
    pub fn get_token(&self, nftoken_id: &str) -> Option<&NfToken> {
        self.tokens.get(nftoken_id)
    }

    /// Unburned tokens owned by an account.
    pub fn tokens_for_account(&self, account: &str) -> Vec<&NfToken> {
        self.tokens
            .values()
            .filter(|t| t.owner == account && !t.burned)
            .collect()
    }

    /// Open offers for a token.
    pub fn offers_for_token(&self, nftoken_id: &str) -> Vec<&NfTokenOffer> {
        self.offers
            .values()
            .filter(|o| o.nftoken_id == nftoken_id && !o.accepted && !o.cancelled)
            .collect()
    }
}
