//! Annota consensus engine
//!
//! Turns raw per-annotator classification votes into ground-truth labels and
//! per-annotator validation scores:
//!
//! - `catalog`: attributes each vote to its study and drops orphaned votes
//! - `resolver`: quorum + agreement consensus per (post, question)
//! - `scoring`: weighted validated / not-validated totals per annotator
//! - `anonymize`: pseudonymous projection of score rows for a given viewer
//!
//! Everything here is pure and recomputed per request from a `Snapshot`.

pub mod anonymize;
pub mod catalog;
pub mod error;
pub mod fraction;
pub mod resolver;
pub mod scoring;

pub use anonymize::{DisplayRow, NamedScore, Viewer, anonymize};
pub use catalog::{AttributedVote, Catalog, Thresholds, VoteSet};
pub use error::{ConfigurationError, IntegrityIssue};
pub use fraction::Fraction;
pub use resolver::{Consensus, ConsensusMap, Verdict, resolve_consensus};
pub use scoring::{AnnotatorFilter, AnnotatorScore, StudyScore, compute_scores, score_annotator, score_by_study};

#[cfg(test)]
pub(crate) mod testutil;
