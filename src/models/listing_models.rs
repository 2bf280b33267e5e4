use crate::{
    config::marketplace_config::MarketplaceEventType, utils::util::standardize_address,
};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const LISTING_ID_SEPARATOR: &str = "-";

/// Derives the identity of a listing from its triple. The same triple always
/// produces the same id, which is how every later event finds the entity the
/// creation event made: addresses lowercased hex, token id in decimal, joined
/// by a fixed separator.
pub fn listing_id(nft_address: &str, token_id: &BigDecimal, seller: &str) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        standardize_address(nft_address),
        token_id,
        standardize_address(seller),
        sep = LISTING_ID_SEPARATOR,
    )
}

/// The projected entity. Exists iff a creation event has been observed for
/// its triple and no cancellation has followed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub nft_address: String,
    pub token_id: BigDecimal,
    pub seller: String,
    pub price: BigDecimal,
    pub buyer: Option<String>,
}

impl Listing {
    pub fn from_created(event: &ListingCreated) -> Self {
        Self {
            id: event.listing_id(),
            nft_address: standardize_address(&event.nft_address),
            token_id: event.token_id.clone(),
            seller: standardize_address(&event.seller),
            price: event.price.clone(),
            buyer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.buyer.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingCreated {
    pub nft_address: String,
    pub token_id: BigDecimal,
    pub seller: String,
    pub price: BigDecimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingCanceled {
    pub nft_address: String,
    pub token_id: BigDecimal,
    pub seller: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingPurchased {
    pub nft_address: String,
    pub token_id: BigDecimal,
    pub seller: String,
    pub buyer: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingUpdated {
    pub nft_address: String,
    pub token_id: BigDecimal,
    pub seller: String,
    pub new_price: BigDecimal,
}

/// A decoded marketplace event, ready for projection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MarketplaceEvent {
    Created(ListingCreated),
    Canceled(ListingCanceled),
    Purchased(ListingPurchased),
    Updated(ListingUpdated),
}

impl MarketplaceEvent {
    pub fn event_type(&self) -> MarketplaceEventType {
        match self {
            MarketplaceEvent::Created(_) => MarketplaceEventType::ListingCreated,
            MarketplaceEvent::Canceled(_) => MarketplaceEventType::ListingCanceled,
            MarketplaceEvent::Purchased(_) => MarketplaceEventType::ListingPurchased,
            MarketplaceEvent::Updated(_) => MarketplaceEventType::ListingUpdated,
        }
    }

    pub fn listing_id(&self) -> String {
        match self {
            MarketplaceEvent::Created(e) => e.listing_id(),
            MarketplaceEvent::Canceled(e) => e.listing_id(),
            MarketplaceEvent::Purchased(e) => e.listing_id(),
            MarketplaceEvent::Updated(e) => e.listing_id(),
        }
    }
}

impl ListingCreated {
    pub fn listing_id(&self) -> String {
        listing_id(&self.nft_address, &self.token_id, &self.seller)
    }
}

impl ListingCanceled {
    pub fn listing_id(&self) -> String {
        listing_id(&self.nft_address, &self.token_id, &self.seller)
    }
}

impl ListingPurchased {
    pub fn listing_id(&self) -> String {
        listing_id(&self.nft_address, &self.token_id, &self.seller)
    }
}

impl ListingUpdated {
    pub fn listing_id(&self) -> String {
        listing_id(&self.nft_address, &self.token_id, &self.seller)
    }
}

/// Append-only record of every decoded marketplace event. Unlike the Listing
/// projection, a cancellation does not erase these.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NftMarketplaceActivity {
    pub block_number: i64,
    pub log_index: i64,
    pub listing_id: String,
    pub event_type: MarketplaceEventType,
    pub nft_address: String,
    pub token_id: BigDecimal,
    pub seller: String,
    pub price: Option<BigDecimal>,
    pub buyer: Option<String>,
    pub marketplace: String,
    pub contract_address: String,
    pub block_timestamp: NaiveDateTime,
}

impl NftMarketplaceActivity {
    pub fn from_event(
        event: &MarketplaceEvent,
        block_number: i64,
        log_index: i64,
        block_timestamp: NaiveDateTime,
        marketplace: &str,
        contract_address: &str,
    ) -> Self {
        let (nft_address, token_id, seller, price, buyer) = match event {
            MarketplaceEvent::Created(e) => (
                &e.nft_address,
                &e.token_id,
                &e.seller,
                Some(e.price.clone()),
                None,
            ),
            MarketplaceEvent::Canceled(e) => (&e.nft_address, &e.token_id, &e.seller, None, None),
            MarketplaceEvent::Purchased(e) => (
                &e.nft_address,
                &e.token_id,
                &e.seller,
                None,
                Some(standardize_address(&e.buyer)),
            ),
            MarketplaceEvent::Updated(e) => (
                &e.nft_address,
                &e.token_id,
                &e.seller,
                Some(e.new_price.clone()),
                None,
            ),
        };
        Self {
            block_number,
            log_index,
            listing_id: event.listing_id(),
            event_type: event.event_type(),
            nft_address: standardize_address(nft_address),
            token_id: token_id.clone(),
            seller: standardize_address(seller),
            price,
            buyer,
            marketplace: marketplace.to_string(),
            contract_address: standardize_address(contract_address),
            block_timestamp,
        }
    }
}
