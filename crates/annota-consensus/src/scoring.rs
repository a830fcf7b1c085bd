use std::collections::BTreeMap;

use annota_types::models::{PairKey, StudyId, UserId};

use crate::catalog::{AttributedVote, VoteSet};
use crate::fraction::Fraction;
use crate::resolver::ConsensusMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotatorFilter {
    All,
    Only(UserId),
}

impl AnnotatorFilter {
    fn admits(self, user_id: UserId) -> bool {
        match self {
            AnnotatorFilter::All => true,
            AnnotatorFilter::Only(id) => id == user_id,
        }
    }
}

/// Validation totals of one annotator over some scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatorScore {
    pub user_id: UserId,
    /// Distinct (post, question) pairs the annotator voted on.
    pub pairs: u32,
    validated: Fraction,
}

impl AnnotatorScore {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            pairs: 0,
            validated: Fraction::zero(),
        }
    }

    pub fn validated_exact(&self) -> Fraction {
        self.validated.clone()
    }

    pub fn not_validated_exact(&self) -> Fraction {
        Fraction::whole(u64::from(self.pairs)).saturating_sub(&self.validated)
    }

    pub fn validated(&self) -> f64 {
        self.validated.to_f64()
    }

    pub fn not_validated(&self) -> f64 {
        self.not_validated_exact().to_f64()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyScore {
    pub study_id: StudyId,
    pub score: AnnotatorScore,
}

/// One annotator's rows on one pair.
#[derive(Debug, Default, Clone, Copy)]
struct PairVotes {
    total: u32,
    correct: u32,
}

impl PairVotes {
    /// Share of the annotator's rows that match ground truth, in [0, 1].
    fn weight(self) -> Fraction {
        Fraction::new(u64::from(self.correct), u64::from(self.total))
    }
}

/// Group vote rows under `key`, then per pair count how many agree with the
/// resolved category. Votes for which `key` returns `None` are skipped.
fn tally_by<K: Ord>(
    votes: &VoteSet,
    consensus: &ConsensusMap,
    key: impl Fn(&AttributedVote) -> Option<K>,
) -> BTreeMap<K, BTreeMap<PairKey, PairVotes>> {
    let mut out: BTreeMap<K, BTreeMap<PairKey, PairVotes>> = BTreeMap::new();
    for v in votes.votes() {
        let Some(k) = key(v) else { continue };
        let pair = v.vote.pair();
        let entry = out.entry(k).or_default().entry(pair).or_default();
        entry.total += 1;
        if consensus.resolved(&pair) == Some(v.vote.category_id) {
            entry.correct += 1;
        }
    }
    out
}

fn fold(user_id: UserId, pairs: &BTreeMap<PairKey, PairVotes>) -> AnnotatorScore {
    let validated = pairs
        .values()
        .fold(Fraction::zero(), |acc, p| acc + p.weight());
    AnnotatorScore {
        user_id,
        pairs: pairs.len() as u32,
        validated,
    }
}

/// One row per annotator with at least one vote in the set, ordered by user id.
pub fn compute_scores(
    votes: &VoteSet,
    consensus: &ConsensusMap,
    filter: AnnotatorFilter,
) -> Vec<AnnotatorScore> {
    tally_by(votes, consensus, |v| {
        filter.admits(v.vote.user_id).then_some(v.vote.user_id)
    })
    .iter()
    .map(|(user_id, pairs)| fold(*user_id, pairs))
    .collect()
}

/// Like `compute_scores` for a single annotator, but always returns a row:
/// zeros when the annotator has no votes in the set.
pub fn score_annotator(votes: &VoteSet, consensus: &ConsensusMap, user_id: UserId) -> AnnotatorScore {
    compute_scores(votes, consensus, AnnotatorFilter::Only(user_id))
        .pop()
        .unwrap_or_else(|| AnnotatorScore::empty(user_id))
}

/// Per-study breakdown of one annotator's score, ordered by study id.
pub fn score_by_study(votes: &VoteSet, consensus: &ConsensusMap, user_id: UserId) -> Vec<StudyScore> {
    tally_by(votes, consensus, |v| {
        (v.vote.user_id == user_id).then_some(v.study_id)
    })
    .iter()
    .map(|(study_id, pairs)| StudyScore {
        study_id: *study_id,
        score: fold(user_id, pairs),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve_consensus;
    use crate::testutil::SnapshotBuilder;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::{HashMap, HashSet};

    struct Fixture {
        b: SnapshotBuilder,
        post: i64,
        question: i64,
        c1: i64,
        c2: i64,
    }

    fn fixture(min_votes: i64, percent: i64) -> Fixture {
        let mut b = SnapshotBuilder::new();
        let study = b.study(min_votes, percent);
        let post = b.post(study);
        let question = b.question(study);
        let c1 = b.category(question);
        let c2 = b.category(question);
        Fixture {
            b,
            post,
            question,
            c1,
            c2,
        }
    }

    fn run(f: Fixture) -> HashMap<UserId, AnnotatorScore> {
        let set = VoteSet::build(f.b.build());
        let consensus = resolve_consensus(&set);
        compute_scores(&set, &consensus, AnnotatorFilter::All)
            .into_iter()
            .map(|s| (s.user_id, s))
            .collect()
    }

    #[test]
    fn unanimous_votes_validate_everyone() {
        let mut f = fixture(3, 60);
        let users: Vec<_> = (0..3).map(|_| f.b.user()).collect();
        for u in &users {
            f.b.vote(*u, f.post, f.question, f.c1);
        }

        let scores = run(f);
        for u in &users {
            assert_eq!(scores[u].validated(), 1.0);
            assert_eq!(scores[u].not_validated(), 0.0);
        }
    }

    #[test]
    fn minority_voter_is_not_validated() {
        let mut f = fixture(3, 60);
        let (u1, u2, u3) = (f.b.user(), f.b.user(), f.b.user());
        f.b.vote(u1, f.post, f.question, f.c1);
        f.b.vote(u2, f.post, f.question, f.c1);
        f.b.vote(u3, f.post, f.question, f.c2);

        let scores = run(f);
        assert_eq!(scores[&u1].validated(), 1.0);
        assert_eq!(scores[&u2].validated(), 1.0);
        assert_eq!(scores[&u3].validated(), 0.0);
        assert_eq!(scores[&u3].not_validated(), 1.0);
    }

    #[test]
    fn tied_pair_validates_nobody() {
        let mut f = fixture(3, 60);
        let users: Vec<_> = (0..4).map(|_| f.b.user()).collect();
        for (i, u) in users.iter().enumerate() {
            let c = if i % 2 == 0 { f.c1 } else { f.c2 };
            f.b.vote(*u, f.post, f.question, c);
        }

        let scores = run(f);
        assert_eq!(scores.len(), 4);
        for s in scores.values() {
            assert_eq!((s.validated(), s.not_validated()), (0.0, 1.0));
        }
    }

    #[test]
    fn pair_below_quorum_validates_nobody() {
        let mut f = fixture(3, 60);
        let (u1, u2) = (f.b.user(), f.b.user());
        f.b.vote(u1, f.post, f.question, f.c1);
        f.b.vote(u2, f.post, f.question, f.c1);

        let scores = run(f);
        assert_eq!(scores[&u1].not_validated(), 1.0);
        assert_eq!(scores[&u2].not_validated(), 1.0);
    }

    #[test]
    fn multi_select_votes_are_weighted() {
        let mut f = fixture(2, 50);
        let c3 = f.b.category(f.question);
        let (u1, u2, u3) = (f.b.user(), f.b.user(), f.b.user());
        f.b.vote(u1, f.post, f.question, f.c1);
        f.b.vote(u2, f.post, f.question, f.c1);
        // three rows on the same pair, one matching
        f.b.vote(u3, f.post, f.question, f.c1);
        f.b.vote(u3, f.post, f.question, f.c2);
        f.b.vote(u3, f.post, f.question, c3);

        let scores = run(f);
        let s3 = &scores[&u3];
        assert_eq!(s3.pairs, 1);
        assert_eq!(s3.validated_exact(), Fraction::new(1, 3));
        assert_eq!(s3.not_validated_exact(), Fraction::new(2, 3));
        assert_eq!(scores[&u1].validated(), 1.0);
    }

    #[test]
    fn wide_multi_select_totals_stay_exact() {
        // One pair per prime below 110, each with that many checked boxes.
        let primes: Vec<usize> = (2..110).filter(|n| (2..*n).all(|d| n % d != 0)).collect();
        assert_eq!(primes.len(), 29);

        let mut b = SnapshotBuilder::new();
        let study = b.study(1, 0);
        let question = b.question(study);
        let cats: Vec<_> = (0..110).map(|_| b.category(question)).collect();
        let (wide, single) = (b.user(), b.user());
        for &p in &primes {
            let post = b.post(study);
            for &c in &cats[..p] {
                b.vote(wide, post, question, c);
            }
            b.vote(single, post, question, cats[0]);
        }

        let set = VoteSet::build(b.build());
        let consensus = resolve_consensus(&set);
        assert_eq!(consensus.resolved_count(), 29);

        let s = score_annotator(&set, &consensus, wide);
        assert_eq!(s.pairs, 29);
        assert_eq!(
            s.validated_exact() + s.not_validated_exact(),
            Fraction::whole(29)
        );
        let expected: f64 = primes.iter().map(|&p| 1.0 / p as f64).sum();
        assert!((s.validated() - expected).abs() < 1e-9);
        assert!((s.validated() + s.not_validated() - 29.0).abs() < 1e-9);
        assert_eq!(score_annotator(&set, &consensus, single).validated(), 29.0);
    }

    #[test]
    fn unknown_annotator_gets_zero_row() {
        let mut f = fixture(1, 50);
        let u = f.b.user();
        f.b.vote(u, f.post, f.question, f.c1);
        let stranger = f.b.user();

        let set = VoteSet::build(f.b.build());
        let consensus = resolve_consensus(&set);
        let s = score_annotator(&set, &consensus, stranger);
        assert_eq!(s, AnnotatorScore::empty(stranger));
        assert_eq!((s.validated(), s.not_validated()), (0.0, 0.0));

        assert_eq!(score_annotator(&set, &consensus, u).validated(), 1.0);
    }

    #[test]
    fn breakdown_by_study() {
        let mut b = SnapshotBuilder::new();
        let s1 = b.study(1, 50);
        let s2 = b.study(2, 50);
        let p1 = b.post(s1);
        let q1 = b.question(s1);
        let c1 = b.category(q1);
        let p2 = b.post(s2);
        let q2 = b.question(s2);
        let c2 = b.category(q2);
        let u = b.user();
        b.vote(u, p1, q1, c1);
        b.vote(u, p2, q2, c2);

        let set = VoteSet::build(b.build());
        let consensus = resolve_consensus(&set);
        let rows = score_by_study(&set, &consensus, u);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].study_id, s1);
        assert_eq!(rows[0].score.validated(), 1.0);
        assert_eq!(rows[1].study_id, s2);
        assert_eq!(rows[1].score.not_validated(), 1.0);
    }

    #[test]
    fn scores_are_conserved_for_random_vote_sets() {
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..200 {
            let mut b = SnapshotBuilder::new();
            let mut pairs = Vec::new();
            for _ in 0..rng.random_range(1..3) {
                let study = b.study(rng.random_range(1..5), rng.random_range(0..=100));
                for _ in 0..rng.random_range(1..4) {
                    let post = b.post(study);
                    let question = b.question(study);
                    let cats: Vec<_> = (0..rng.random_range(1..5)).map(|_| b.category(question)).collect();
                    pairs.push((post, question, cats));
                }
            }
            let users: Vec<_> = (0..rng.random_range(1..8)).map(|_| b.user()).collect();

            let mut voted: HashMap<UserId, HashSet<(i64, i64)>> = HashMap::new();
            for _ in 0..rng.random_range(0..60) {
                let u = users[rng.random_range(0..users.len())];
                let (post, question, cats) = &pairs[rng.random_range(0..pairs.len())];
                let c = cats[rng.random_range(0..cats.len())];
                b.vote(u, *post, *question, c);
                voted.entry(u).or_default().insert((*post, *question));
            }

            let set = VoteSet::build(b.build());
            let consensus = resolve_consensus(&set);
            let scores = compute_scores(&set, &consensus, AnnotatorFilter::All);
            assert_eq!(scores.len(), voted.len());

            for s in scores {
                let expected = voted[&s.user_id].len() as u32;
                assert_eq!(s.pairs, expected);
                assert_eq!(
                    s.validated_exact() + s.not_validated_exact(),
                    Fraction::whole(u64::from(expected))
                );
                assert!(s.validated() >= 0.0 && s.not_validated() >= 0.0);
                assert!((s.validated() + s.not_validated() - f64::from(expected)).abs() < 1e-9);
            }
        }
    }
}
