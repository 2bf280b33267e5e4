use crate::{
    models::listing_models::{Listing, NftMarketplaceActivity},
    utils::util::standardize_address,
};
use ahash::AHashMap;
use bigdecimal::BigDecimal;
use std::sync::{Arc, RwLock};

pub type ArcListingStore = Arc<RwLock<ListingStore>>;

pub fn new_listing_store() -> ArcListingStore {
    Arc::new(RwLock::new(ListingStore::default()))
}

/// The projection store: one record per open listing, keyed by the derived
/// triple id, plus the activity log and ingestion watermark. Owned and
/// exclusively mutated by the projector; clients only read.
#[derive(Debug, Default)]
pub struct ListingStore {
    listings: AHashMap<String, Listing>,
    activities: Vec<NftMarketplaceActivity>,
    last_processed_block: Option<u64>,
}

impl ListingStore {
    /// Unconditional insert; an existing entity under the same id is
    /// silently replaced.
    pub fn insert(&mut self, listing: Listing) {
        self.listings.insert(listing.id.clone(), listing);
    }

    /// Removes the entity entirely. Absent id is fine and returns None.
    pub fn remove(&mut self, id: &str) -> Option<Listing> {
        self.listings.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&Listing> {
        self.listings.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Listing> {
        self.listings.get_mut(id)
    }

    /// All listings with no buyer, sorted by id for deterministic reads.
    pub fn active_listings(&self) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self
            .listings
            .values()
            .filter(|l| l.is_active())
            .cloned()
            .collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        listings
    }

    /// Every listing for a given (contract, token), across sellers. The
    /// projection does not enforce a single active listing per token.
    pub fn listings_for_token(&self, nft_address: &str, token_id: &BigDecimal) -> Vec<Listing> {
        let nft_address = standardize_address(nft_address);
        let mut listings: Vec<Listing> = self
            .listings
            .values()
            .filter(|l| l.nft_address == nft_address && &l.token_id == token_id)
            .cloned()
            .collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        listings
    }

    pub fn all_listings(&self) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self.listings.values().cloned().collect();
        listings.sort_by(|a, b| a.id.cmp(&b.id));
        listings
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn push_activity(&mut self, activity: NftMarketplaceActivity) {
        self.activities.push(activity);
    }

    pub fn activities(&self) -> &[NftMarketplaceActivity] {
        &self.activities
    }

    pub fn last_processed_block(&self) -> Option<u64> {
        self.last_processed_block
    }

    pub fn set_last_processed_block(&mut self, block_number: u64) {
        self.last_processed_block = Some(block_number);
    }
}
