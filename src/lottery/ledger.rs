//! Ticket ledger for the active round
//!
//! Maps each player to the ordered list of tickets they submitted and keeps the
//! distinct player set in first-entry order. The ledger is only ever mutated by
//! the round controller, which holds it behind the round lock.

use crate::lottery::types::{PlayerId, Ticket};
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct TicketLedger {
    tickets: HashMap<PlayerId, Vec<Ticket>>,
    players: Vec<PlayerId>,
}

impl TicketLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a ticket, registering its owner on first entry
    pub fn append(&mut self, ticket: Ticket) {
        match self.tickets.get_mut(&ticket.player) {
            Some(list) => list.push(ticket),
            None => {
                self.players.push(ticket.player.clone());
                self.tickets.insert(ticket.player.clone(), vec![ticket]);
            }
        }
    }

    /// Tickets held by `player`, in submission order
    pub fn tickets_of(&self, player: &PlayerId) -> &[Ticket] {
        self.tickets.get(player).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Distinct players in first-entry order
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn ticket_count(&self) -> usize {
        self.tickets.values().map(Vec::len).sum()
    }

    pub fn total_staked(&self) -> u64 {
        self.tickets
            .values()
            .flatten()
            .fold(0u64, |acc, t| acc.saturating_add(t.stake))
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Iterate players with their tickets, in first-entry order
    pub fn entries(&self) -> impl Iterator<Item = (&PlayerId, &[Ticket])> {
        self.players
            .iter()
            .map(move |player| (player, self.tickets_of(player)))
    }

    /// Remove every ticket and player at once, returning what was held
    pub fn take(&mut self) -> TicketLedger {
        std::mem::take(self)
    }
}
