use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::broadcast;

use crate::application::engagement::EngagementResult;
use crate::domain::entities::PostId;

type Flights = Arc<DashMap<PostId, broadcast::Sender<EngagementResult>>>;

/// Tracks posts that currently have an aggregation running.
///
/// Claims are sharded per key, so posts never contend with each other. The
/// first claimant of a post becomes the leader and every later claimant
/// subscribes to the leader's outcome until the leader's [`FlightGuard`] is
/// completed or dropped.
#[derive(Default, Clone)]
pub struct InFlightAggregations {
    flights: Flights,
}

pub enum Claim {
    /// This caller runs the aggregation. The receiver gets the outcome the
    /// guard publishes, like any follower's.
    Leader {
        guard: FlightGuard,
        receiver: broadcast::Receiver<EngagementResult>,
    },
    Follower(broadcast::Receiver<EngagementResult>),
}

impl InFlightAggregations {
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    pub fn claim(&self, id: &PostId) -> Claim {
        match self.flights.entry(id.clone()) {
            Entry::Vacant(vacant) => {
                let (sender, receiver) = broadcast::channel(1);
                vacant.insert(sender);
                Claim::Leader {
                    guard: FlightGuard {
                        id: id.clone(),
                        flights: Arc::clone(&self.flights),
                        released: false,
                    },
                    receiver,
                }
            }
            // Subscribing under the shard lock orders this before the leader's removal.
            Entry::Occupied(occupied) => Claim::Follower(occupied.get().subscribe()),
        }
    }

    pub fn is_in_flight(&self, id: &PostId) -> bool {
        self.flights.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }
}

/// Exclusive claim on a post's aggregation.
///
/// Dropping the guard without completing it (a panic in the aggregation task)
/// releases the claim and closes the channel, so followers stop waiting.
pub struct FlightGuard {
    id: PostId,
    flights: Flights,
    released: bool,
}

impl FlightGuard {
    pub fn post_id(&self) -> &PostId {
        &self.id
    }

    /// Release the claim and hand `result` to everyone subscribed to it.
    pub fn complete(mut self, result: EngagementResult) {
        self.released = true;
        if let Some((_id, sender)) = self.flights.remove(&self.id) {
            let _ = sender.send(result);
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if !self.released {
            self.flights.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leader(claim: Claim) -> (FlightGuard, broadcast::Receiver<EngagementResult>) {
        match claim {
            Claim::Leader { guard, receiver } => (guard, receiver),
            Claim::Follower(_) => panic!("expected leader claim"),
        }
    }

    fn follower(claim: Claim) -> broadcast::Receiver<EngagementResult> {
        match claim {
            Claim::Follower(receiver) => receiver,
            Claim::Leader { .. } => panic!("expected follower claim"),
        }
    }

    #[tokio::test]
    async fn second_claim_follows_the_first() {
        let flights = InFlightAggregations::new();
        let id = PostId::new("42");

        let (guard, mut leader_rx) = leader(flights.claim(&id));
        let mut follower_rx = follower(flights.claim(&id));
        assert!(flights.is_in_flight(&id));

        let result = EngagementResult::NoEngagement { id: id.clone() };
        guard.complete(result.clone());

        assert_eq!(leader_rx.recv().await.expect("leader outcome"), result);
        assert_eq!(follower_rx.recv().await.expect("follower outcome"), result);
        assert!(!flights.is_in_flight(&id));
    }

    #[test]
    fn distinct_posts_claim_independently() {
        let flights = InFlightAggregations::new();
        let _first = leader(flights.claim(&PostId::new("1")));
        let _second = leader(flights.claim(&PostId::new("2")));
        assert_eq!(flights.len(), 2);
    }

    #[tokio::test]
    async fn dropped_guard_releases_claim_and_closes_channel() {
        let flights = InFlightAggregations::new();
        let id = PostId::new("7");

        let (guard, _leader_rx) = leader(flights.claim(&id));
        let mut follower_rx = follower(flights.claim(&id));
        drop(guard);

        assert!(flights.is_empty());
        assert!(follower_rx.recv().await.is_err());
        // The next caller starts a fresh flight.
        let _again = leader(flights.claim(&id));
    }

    #[test]
    fn completed_guard_does_not_release_a_newer_claim() {
        let flights = InFlightAggregations::new();
        let id = PostId::new("9");

        let (first, _rx) = leader(flights.claim(&id));
        first.complete(EngagementResult::NoEngagement { id: id.clone() });

        let (_second, _rx2) = leader(flights.claim(&id));
        assert!(flights.is_in_flight(&id));
    }
}
