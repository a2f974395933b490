//! Sealed-bid fare auction: resolves one allocation round.
//!
//! Each round repeats until nothing more can be assigned:
//! 1. every remaining fare picks its lowest bid (ties: earliest stamp, then lowest taxi id);
//! 2. a taxi picked by several fares keeps only its best one (lowest cost, then
//!    earliest stamp, then lowest fare id);
//! 3. those pairs are assigned, and their taxis and fares leave the round.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::bidding::Bid;
use crate::ecs::{FareId, TaxiId, TaxiState};
use crate::error::{StaleBidError, StaleReason};
use crate::fares::FareBoard;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub fare: FareId,
    pub taxi: TaxiId,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundResolution {
    /// In the order they were decided.
    pub assignments: Vec<Assignment>,
    /// Taxis that bid but won nothing, ascending.
    pub losers: Vec<TaxiId>,
    /// Number of selection passes the round needed.
    pub passes: u32,
}

fn fare_preference(a: &Bid, b: &Bid) -> Ordering {
    a.cost
        .total_cmp(&b.cost)
        .then_with(|| a.stamp.cmp(&b.stamp))
        .then_with(|| a.taxi.cmp(&b.taxi))
}

fn taxi_preference(a: &Bid, b: &Bid) -> Ordering {
    a.cost
        .total_cmp(&b.cost)
        .then_with(|| a.stamp.cmp(&b.stamp))
        .then_with(|| a.fare.cmp(&b.fare))
}

pub fn resolve_round(bids: &[Bid]) -> RoundResolution {
    let bidders: BTreeSet<TaxiId> = bids.iter().map(|b| b.taxi).collect();
    let mut remaining: Vec<&Bid> = bids.iter().filter(|b| b.cost.is_finite()).collect();
    let mut resolution = RoundResolution::default();
    let mut won: BTreeSet<TaxiId> = BTreeSet::new();

    while !remaining.is_empty() {
        resolution.passes += 1;

        let mut best_for_fare: BTreeMap<FareId, &Bid> = BTreeMap::new();
        for &bid in &remaining {
            best_for_fare
                .entry(bid.fare)
                .and_modify(|best| {
                    if fare_preference(bid, *best) == Ordering::Less {
                        *best = bid;
                    }
                })
                .or_insert(bid);
        }

        let mut pick_for_taxi: BTreeMap<TaxiId, &Bid> = BTreeMap::new();
        for &bid in best_for_fare.values() {
            pick_for_taxi
                .entry(bid.taxi)
                .and_modify(|pick| {
                    if taxi_preference(bid, *pick) == Ordering::Less {
                        *pick = bid;
                    }
                })
                .or_insert(bid);
        }

        let mut closed_fares = BTreeSet::new();
        for (taxi, bid) in pick_for_taxi {
            resolution.assignments.push(Assignment {
                fare: bid.fare,
                taxi,
                cost: bid.cost,
            });
            won.insert(taxi);
            closed_fares.insert(bid.fare);
        }
        remaining.retain(|b| !won.contains(&b.taxi) && !closed_fares.contains(&b.fare));
    }

    resolution.losers = bidders.difference(&won).copied().collect();
    resolution
}

/// Splits bids into those still valid against the fare board and taxi states,
/// and stale ones naming a fare that is no longer Open or a taxi that is no
/// longer bidding.
pub fn validate_bids<F>(bids: Vec<Bid>, board: &FareBoard, taxi_state: F) -> (Vec<Bid>, Vec<StaleBidError>)
where
    F: Fn(TaxiId) -> Option<TaxiState>,
{
    let mut valid = Vec::with_capacity(bids.len());
    let mut stale = Vec::new();
    for bid in bids {
        let reason = match (board.get(bid.fare), taxi_state(bid.taxi)) {
            (None, _) => Some(StaleReason::UnknownFare),
            (Some(fare), _) if !fare.is_open() => Some(StaleReason::FareNotOpen),
            (_, None) => Some(StaleReason::UnknownTaxi),
            (_, Some(TaxiState::Idle | TaxiState::Bidding)) => None,
            (_, Some(_)) => Some(StaleReason::TaxiNotBidding),
        };
        match reason {
            Some(reason) => stale.push(StaleBidError {
                taxi: bid.taxi,
                fare: bid.fare,
                reason,
            }),
            None => valid.push(bid),
        }
    }
    (valid, stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidding::BidStamp;
    use crate::ecs::NodeId;

    fn bid(taxi: u32, fare: u64, cost: f64, seq: u32) -> Bid {
        Bid {
            taxi: TaxiId(taxi),
            fare: FareId(fare),
            cost,
            stamp: BidStamp { tick: 1, seq },
        }
    }

    #[test]
    fn lowest_cost_wins() {
        let r = resolve_round(&[bid(1, 0, 3.0, 0), bid(2, 0, 4.0, 1)]);
        assert_eq!(
            r.assignments,
            vec![Assignment {
                fare: FareId(0),
                taxi: TaxiId(1),
                cost: 3.0
            }]
        );
        assert_eq!(r.losers, vec![TaxiId(2)]);
    }

    #[test]
    fn ties_go_to_earliest_stamp_then_lowest_taxi() {
        let r = resolve_round(&[bid(5, 0, 2.0, 0), bid(3, 0, 2.0, 1)]);
        assert_eq!(r.assignments[0].taxi, TaxiId(5));

        let same_stamp = [
            Bid {
                stamp: BidStamp { tick: 1, seq: 0 },
                ..bid(7, 0, 2.0, 0)
            },
            Bid {
                stamp: BidStamp { tick: 1, seq: 0 },
                ..bid(4, 0, 2.0, 0)
            },
        ];
        assert_eq!(resolve_round(&same_stamp).assignments[0].taxi, TaxiId(4));
    }

    #[test]
    fn taxi_best_on_two_fares_takes_one_and_other_fare_reruns() {
        // Taxi 1 is best for both fares; it keeps fare 1 (cheaper), fare 0 goes to taxi 2.
        let bids = [
            bid(1, 0, 2.0, 0),
            bid(1, 1, 1.0, 1),
            bid(2, 0, 5.0, 2),
            bid(2, 1, 6.0, 3),
        ];
        let r = resolve_round(&bids);
        assert_eq!(r.passes, 2);
        let pairs: Vec<(FareId, TaxiId)> = r.assignments.iter().map(|a| (a.fare, a.taxi)).collect();
        assert_eq!(pairs, vec![(FareId(1), TaxiId(1)), (FareId(0), TaxiId(2))]);
        assert!(r.losers.is_empty());
    }

    #[test]
    fn multi_win_tie_prefers_lowest_fare_id() {
        let bids = [bid(1, 4, 2.0, 0), bid(1, 3, 2.0, 0)];
        let r = resolve_round(&bids);
        assert_eq!(r.assignments.len(), 1);
        assert_eq!(r.assignments[0].fare, FareId(3));
    }

    #[test]
    fn never_double_books() {
        let mut bids = Vec::new();
        let mut seq = 0;
        for taxi in 0..6 {
            for fare in 0..4 {
                bids.push(bid(taxi, fare, ((taxi * 7 + fare as u32 * 3) % 5) as f64, seq));
                seq += 1;
            }
        }
        let r = resolve_round(&bids);
        let taxis: BTreeSet<_> = r.assignments.iter().map(|a| a.taxi).collect();
        let fares: BTreeSet<_> = r.assignments.iter().map(|a| a.fare).collect();
        assert_eq!(taxis.len(), r.assignments.len());
        assert_eq!(fares.len(), r.assignments.len());
        assert_eq!(r.assignments.len(), 4);
        assert_eq!(r.losers.len(), 2);
    }

    #[test]
    fn empty_round_assigns_nothing() {
        let r = resolve_round(&[]);
        assert!(r.assignments.is_empty());
        assert_eq!(r.passes, 0);
    }

    #[test]
    fn stale_bids_are_separated() {
        let mut board = FareBoard::default();
        let open = board.create(NodeId(0), NodeId(1), 1.0, 1.0, 0);
        let taken = board.create(NodeId(1), NodeId(0), 1.0, 1.0, 0);
        board.assign(taken, TaxiId(9), 0).expect("assign");

        let bids = vec![
            bid(1, open.0, 1.0, 0),
            bid(1, taken.0, 1.0, 1),
            bid(2, open.0, 1.0, 2),
            bid(3, 99, 1.0, 3),
        ];
        let (valid, stale) = validate_bids(bids, &board, |taxi| match taxi.0 {
            1 => Some(TaxiState::Bidding),
            2 => Some(TaxiState::Transporting),
            3 => Some(TaxiState::Idle),
            _ => None,
        });
        assert_eq!(valid.len(), 1);
        let reasons: Vec<StaleReason> = stale.iter().map(|s| s.reason).collect();
        assert_eq!(
            reasons,
            vec![
                StaleReason::FareNotOpen,
                StaleReason::TaxiNotBidding,
                StaleReason::UnknownFare
            ]
        );
    }
}
