use std::collections::BTreeMap;

use annota_types::models::{CategoryId, PairKey, StudyId};
use tracing::{debug, warn};

use crate::catalog::{Thresholds, VoteSet};
use crate::error::ConfigurationError;

/// Vote counts per category for one (post, question).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: BTreeMap<CategoryId, u32>,
    total: u32,
}

impl Tally {
    pub fn add(&mut self, category_id: CategoryId) {
        *self.counts.entry(category_id).or_default() += 1;
        self.total += 1;
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Highest count and every category that reaches it.
    fn leaders(&self) -> (u32, Vec<CategoryId>) {
        let top = self.counts.values().copied().max().unwrap_or(0);
        let leaders = self
            .counts
            .iter()
            .filter(|(_, n)| **n == top)
            .map(|(c, _)| *c)
            .collect();
        (top, leaders)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Resolved {
        category_id: CategoryId,
        agreement_percent: f64,
    },
    BelowQuorum {
        required: u32,
    },
    /// Two or more categories share the top count.
    Tied {
        top_count: u32,
        categories: Vec<CategoryId>,
    },
    InsufficientAgreement {
        category_id: CategoryId,
        agreement_percent: f64,
        required: u32,
    },
    Unconfigured,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Resolved { .. } => "resolved",
            Verdict::BelowQuorum { .. } => "below_quorum",
            Verdict::Tied { .. } => "tied",
            Verdict::InsufficientAgreement { .. } => "insufficient_agreement",
            Verdict::Unconfigured => "unconfigured",
        }
    }
}

/// Apply the quorum, tie and agreement rules to one tally.
pub fn decide(tally: &Tally, thresholds: Option<&Thresholds>) -> Verdict {
    let Some(thresholds) = thresholds else {
        return Verdict::Unconfigured;
    };

    let total = tally.total();
    if total == 0 || total < thresholds.min_votes {
        return Verdict::BelowQuorum {
            required: thresholds.min_votes,
        };
    }

    let (top, leaders) = tally.leaders();
    if leaders.len() > 1 {
        return Verdict::Tied {
            top_count: top,
            categories: leaders,
        };
    }
    let category_id = leaders[0];
    let agreement_percent = top as f64 * 100.0 / total as f64;

    // top / total >= percent / 100, compared without rounding
    if u64::from(top) * 100 >= u64::from(thresholds.agreement_percent) * u64::from(total) {
        Verdict::Resolved {
            category_id,
            agreement_percent,
        }
    } else {
        Verdict::InsufficientAgreement {
            category_id,
            agreement_percent,
            required: thresholds.agreement_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    pub study_id: StudyId,
    pub tally: Tally,
    pub verdict: Verdict,
}

impl Consensus {
    pub fn total_votes(&self) -> u32 {
        self.tally.total()
    }

    pub fn resolved_category(&self) -> Option<CategoryId> {
        match self.verdict {
            Verdict::Resolved { category_id, .. } => Some(category_id),
            _ => None,
        }
    }
}

/// Consensus for every (post, question) that has at least one vote in scope.
#[derive(Debug, Clone, Default)]
pub struct ConsensusMap {
    entries: BTreeMap<PairKey, Consensus>,
    issues: BTreeMap<StudyId, ConfigurationError>,
}

impl ConsensusMap {
    pub fn get(&self, pair: &PairKey) -> Option<&Consensus> {
        self.entries.get(pair)
    }

    /// Ground truth for a pair, `None` when unresolved or never voted on.
    pub fn resolved(&self, pair: &PairKey) -> Option<CategoryId> {
        self.entries.get(pair).and_then(Consensus::resolved_category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &Consensus)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries
            .values()
            .filter(|c| c.resolved_category().is_some())
            .count()
    }

    /// Studies whose pairs could not be resolved because of their settings.
    pub fn issues(&self) -> &BTreeMap<StudyId, ConfigurationError> {
        &self.issues
    }
}

/// Resolve every pair in the vote set. One pass to tally, one pass to decide.
pub fn resolve_consensus(votes: &VoteSet) -> ConsensusMap {
    let mut tallies: BTreeMap<PairKey, (StudyId, Tally)> = BTreeMap::new();
    for v in votes.votes() {
        tallies
            .entry(v.vote.pair())
            .or_insert_with(|| (v.study_id, Tally::default()))
            .1
            .add(v.vote.category_id);
    }

    let mut map = ConsensusMap::default();
    for (pair, (study_id, tally)) in tallies {
        let thresholds = match votes.catalog().thresholds(study_id) {
            Some(Ok(t)) => Some(t),
            Some(Err(e)) => {
                if !map.issues.contains_key(&study_id) {
                    warn!("Consensus disabled for study {}: {}", study_id, e);
                    map.issues.insert(study_id, e.clone());
                }
                None
            }
            None => None,
        };

        let verdict = decide(&tally, thresholds);
        map.entries.insert(
            pair,
            Consensus {
                study_id,
                tally,
                verdict,
            },
        );
    }

    debug!(
        "Resolved {} of {} pairs ({} votes, {} excluded)",
        map.resolved_count(),
        map.len(),
        votes.votes().len(),
        votes.excluded().len()
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::SnapshotBuilder;

    fn tally(counts: &[(CategoryId, u32)]) -> Tally {
        let mut t = Tally::default();
        for (c, n) in counts {
            for _ in 0..*n {
                t.add(*c);
            }
        }
        t
    }

    const T_3_60: Thresholds = Thresholds {
        min_votes: 3,
        agreement_percent: 60,
    };

    #[test]
    fn unanimous_quorum_resolves() {
        let v = decide(&tally(&[(1, 3)]), Some(&T_3_60));
        assert_eq!(
            v,
            Verdict::Resolved {
                category_id: 1,
                agreement_percent: 100.0
            }
        );
    }

    #[test]
    fn below_quorum_never_resolves() {
        // 100% agreement, but only two votes
        let v = decide(&tally(&[(1, 2)]), Some(&T_3_60));
        assert_eq!(v, Verdict::BelowQuorum { required: 3 });
    }

    #[test]
    fn ties_never_resolve() {
        let t = Thresholds {
            min_votes: 1,
            agreement_percent: 0,
        };
        let v = decide(&tally(&[(1, 2), (2, 2)]), Some(&t));
        assert_eq!(
            v,
            Verdict::Tied {
                top_count: 2,
                categories: vec![1, 2]
            }
        );
    }

    #[test]
    fn boundaries_are_inclusive() {
        // total == quorum and agreement == threshold exactly
        let t = Thresholds {
            min_votes: 5,
            agreement_percent: 60,
        };
        let v = decide(&tally(&[(1, 3), (2, 1), (3, 1)]), Some(&t));
        assert_eq!(v.label(), "resolved");

        let t = Thresholds {
            min_votes: 4,
            agreement_percent: 75,
        };
        assert_eq!(decide(&tally(&[(1, 3), (2, 1)]), Some(&t)).label(), "resolved");
        assert_eq!(decide(&tally(&[(1, 2), (2, 1)]), Some(&t)).label(), "below_quorum");
    }

    #[test]
    fn agreement_just_below_threshold_fails() {
        // 2/3 = 66.67% < 67%
        let t = Thresholds {
            min_votes: 3,
            agreement_percent: 67,
        };
        match decide(&tally(&[(1, 2), (2, 1)]), Some(&t)) {
            Verdict::InsufficientAgreement {
                category_id,
                agreement_percent,
                required,
            } => {
                assert_eq!(category_id, 1);
                assert!((agreement_percent - 66.666).abs() < 0.01);
                assert_eq!(required, 67);
            }
            other => panic!("unexpected verdict {:?}", other),
        }
    }

    #[test]
    fn missing_thresholds_leave_pairs_unresolved() {
        let mut b = SnapshotBuilder::new();
        let study = b.study_with(None, Some(60));
        let post = b.post(study);
        let q = b.question(study);
        let c = b.category(q);
        for _ in 0..5 {
            let u = b.user();
            b.vote(u, post, q, c);
        }

        let map = resolve_consensus(&VoteSet::build(b.build()));
        let pair = PairKey {
            post_id: post,
            question_id: q,
        };
        assert_eq!(map.get(&pair).unwrap().verdict, Verdict::Unconfigured);
        assert_eq!(map.resolved(&pair), None);
        assert_eq!(
            map.issues().get(&study),
            Some(&ConfigurationError::MissingQuorum { study_id: study })
        );
    }

    #[test]
    fn each_study_uses_its_own_thresholds() {
        let mut b = SnapshotBuilder::new();
        let strict = b.study(3, 60);
        let loose = b.study(1, 50);
        let p1 = b.post(strict);
        let q1 = b.question(strict);
        let c1 = b.category(q1);
        let p2 = b.post(loose);
        let q2 = b.question(loose);
        let c2 = b.category(q2);

        let u = b.user();
        b.vote(u, p1, q1, c1);
        b.vote(u, p2, q2, c2);

        let map = resolve_consensus(&VoteSet::build(b.build()));
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.resolved(&PairKey {
                post_id: p1,
                question_id: q1
            }),
            None
        );
        assert_eq!(
            map.resolved(&PairKey {
                post_id: p2,
                question_id: q2
            }),
            Some(c2)
        );
        assert!(map.issues().is_empty());
    }

    #[test]
    fn empty_vote_set_has_no_entries() {
        let map = resolve_consensus(&VoteSet::default());
        assert!(map.is_empty());
        assert_eq!(map.resolved_count(), 0);
    }
}
