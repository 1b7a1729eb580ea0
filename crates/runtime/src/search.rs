/// Place searches resolve out of order; only the newest may move the
/// reference location.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SearchTicket(u64);

impl SearchTicket {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Applied,
    /// A newer search or a direct location update happened first.
    Superseded,
}

impl SearchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchOutcome::Applied => "applied",
            SearchOutcome::Superseded => "superseded",
        }
    }
}

/// Last-request-wins sequencing.
#[derive(Debug, Default, Clone)]
pub struct SearchSequencer {
    issued: u64,
    /// Tickets at or below this are stale.
    floor: u64,
}

impl SearchSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> SearchTicket {
        self.issued += 1;
        self.floor = self.issued - 1;
        SearchTicket(self.issued)
    }

    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        ticket.0 > self.floor && ticket.0 == self.issued
    }

    /// Marks every outstanding ticket stale.
    pub fn supersede_all(&mut self) {
        self.floor = self.issued;
    }

    /// Consumes `ticket`; `true` if it was still current.
    pub fn complete(&mut self, ticket: SearchTicket) -> bool {
        let current = self.is_current(ticket);
        if current {
            self.floor = self.issued;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::SearchSequencer;

    #[test]
    fn newest_search_wins() {
        let mut seq = SearchSequencer::new();
        let first = seq.begin();
        let second = seq.begin();
        assert!(!seq.complete(first));
        assert!(seq.complete(second));
    }

    #[test]
    fn late_result_of_an_older_search_is_discarded() {
        let mut seq = SearchSequencer::new();
        let first = seq.begin();
        let second = seq.begin();
        assert!(seq.complete(second));
        assert!(!seq.complete(first));
    }

    #[test]
    fn direct_updates_supersede_outstanding_searches() {
        let mut seq = SearchSequencer::new();
        let ticket = seq.begin();
        seq.supersede_all();
        assert!(!seq.is_current(ticket));
        assert!(!seq.complete(ticket));
        let next = seq.begin();
        assert!(seq.complete(next));
    }

    #[test]
    fn a_ticket_applies_once() {
        let mut seq = SearchSequencer::new();
        let ticket = seq.begin();
        assert!(seq.complete(ticket));
        assert!(!seq.complete(ticket));
        assert_eq!(ticket.sequence(), 1);
    }
}
