use crate::{
    models::listing_models::{Listing, MarketplaceEvent, NftMarketplaceActivity},
    store::{ArcListingStore, ListingStore},
    utils::util::standardize_address,
};
use tracing::debug;

/// The projection fold. Applies one event to the store with exactly these
/// semantics, in observation order:
///
/// - Created: unconditional insert; an existing entity under the same id is
///   silently replaced (buyer reset, price reset to the event price).
/// - Canceled: remove the entity entirely; absent is a silent no-op.
/// - Purchased: set the buyer; absent is a no-op.
/// - Updated: set the price; absent is a no-op.
///
/// Deterministic and replayable: folding the same event log from genesis
/// always reproduces the same store. Events arriving out of order are not
/// detected; a mutation before its creation is lost as a no-op.
pub fn project(store: &mut ListingStore, event: &MarketplaceEvent) {
    match event {
        MarketplaceEvent::Created(e) => {
            let listing = Listing::from_created(e);
            debug!(listing_id = %listing.id, "Projecting listing creation");
            store.insert(listing);
        },
        MarketplaceEvent::Canceled(e) => {
            let id = e.listing_id();
            if store.remove(&id).is_some() {
                debug!(listing_id = %id, "Projected listing removal");
            }
        },
        MarketplaceEvent::Purchased(e) => {
            let id = e.listing_id();
            if let Some(listing) = store.get_mut(&id) {
                listing.buyer = Some(standardize_address(&e.buyer));
                debug!(listing_id = %id, "Projected listing purchase");
            }
        },
        MarketplaceEvent::Updated(e) => {
            let id = e.listing_id();
            if let Some(listing) = store.get_mut(&id) {
                listing.price = e.new_price.clone();
                debug!(listing_id = %id, "Projected listing price update");
            }
        },
    }
}

/// Pipeline stage that owns all writes to the store: applies a block's
/// events in order, appends activities, and advances the watermark.
#[derive(Clone)]
pub struct ProjectionStep {
    store: ArcListingStore,
}

impl ProjectionStep {
    pub fn new(store: ArcListingStore) -> Self {
        Self { store }
    }

    pub fn process_block(
        &self,
        block_number: u64,
        activities: Vec<NftMarketplaceActivity>,
        events: Vec<MarketplaceEvent>,
    ) {
        let mut store = self.store.write().expect("listing store lock poisoned");
        for activity in activities {
            store.push_activity(activity);
        }
        for event in &events {
            project(&mut store, event);
        }
        store.set_last_processed_block(block_number);
    }
}
