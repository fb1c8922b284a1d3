//! Notifications published by the seller
//!
//! Consumers (console, chat bot, webhooks) receive events over a channel and
//! do their own formatting.

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::catalog::EntrySnapshot;

/// Who bought one of our collectibles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buyer {
    pub id: u64,
    pub name: String,
}

impl Buyer {
    pub fn profile_link(&self) -> String {
        format!("https://www.roblox.com/users/{}/profile", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SellerEvent {
    /// Collectibles of an entry were put on sale
    Sold {
        entry: EntrySnapshot,
        sold: u32,
        price: u64,
    },
    /// Someone bought a listed collectible
    Bought {
        entry: EntrySnapshot,
        serial: u64,
        buyer: Buyer,
        /// Amount credited to us after the marketplace cut
        sold_for: u64,
    },
}

/// Sending half of the event channel with per-kind switches
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: UnboundedSender<SellerEvent>,
    pub on_sale: bool,
    pub on_buy: bool,
}

impl EventSink {
    pub fn channel(on_sale: bool, on_buy: bool) -> (Self, UnboundedReceiver<SellerEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender,
                on_sale,
                on_buy,
            },
            receiver,
        )
    }

    /// Publish `event` if its kind is enabled. A closed channel is ignored.
    pub fn publish(&self, event: SellerEvent) {
        let enabled = match event {
            SellerEvent::Sold { .. } => self.on_sale,
            SellerEvent::Bought { .. } => self.on_buy,
        };
        if enabled && self.sender.send(event).is_err() {
            log::debug!("Event receiver dropped, notification discarded");
        }
    }
}
