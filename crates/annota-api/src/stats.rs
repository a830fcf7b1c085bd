use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{debug, warn};

use annota_consensus::{
    AnnotatorFilter, NamedScore, Viewer, VoteSet, anonymize, compute_scores, resolve_consensus,
    score_annotator, score_by_study,
};
use annota_types::api::{
    Claims, ConsensusResponse, ConsensusRow, GeneralStatsRow, StatsQuery, StudyIssue,
    StudyStatsResponse, UserStatsResponse,
};
use annota_types::models::Scope;

use crate::{AppState, blocking};

/// Caller's own validated / not-validated totals, globally or for one study.
pub async fn user_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let scope = Scope::from_study(query.study_id);
    let user_id = claims.sub;

    let score = blocking(&state, move |st| {
        let votes = VoteSet::build(st.db.snapshot_for_annotator(scope, &user_id.to_string())?);
        let consensus = resolve_consensus(&votes);
        Ok(score_annotator(&votes, &consensus, user_id))
    })
    .await?;

    debug!(
        "Stats for {} in {}: {} of {} pairs validated",
        claims.username,
        scope,
        score.validated_exact(),
        score.pairs
    );

    Ok(Json(UserStatsResponse {
        validated: score.validated(),
        not_validated: score.not_validated(),
    }))
}

/// Caller's totals broken down per study.
pub async fn user_study_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let user_id = claims.sub;

    let rows = blocking(&state, move |st| {
        let votes = VoteSet::build(st.db.snapshot_for_annotator(Scope::Global, &user_id.to_string())?);
        let consensus = resolve_consensus(&votes);
        Ok(score_by_study(&votes, &consensus, user_id))
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| StudyStatsResponse {
                study_id: r.study_id,
                validated: r.score.validated(),
                not_validated: r.score.not_validated(),
            })
            .collect::<Vec<_>>(),
    ))
}

/// Every annotator with at least one vote in scope.
///
/// Investigators and admins see real usernames for everyone. Other callers
/// see their own username, pseudonyms for the rest, and only annotators they
/// share a study with.
pub async fn general_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let scope = Scope::from_study(query.study_id);
    let viewer = Viewer {
        identity: claims.username.clone(),
        privileged: claims.role.is_privileged(),
    };
    let caller_id = claims.sub.to_string();

    let rows = blocking(&state, move |st| {
        let votes = VoteSet::build(st.db.snapshot(scope)?);
        let consensus = resolve_consensus(&votes);
        let scores = compute_scores(&votes, &consensus, AnnotatorFilter::All);

        let ids: Vec<_> = scores.iter().map(|s| s.user_id).collect();
        let names = st.db.usernames(&ids)?;
        let named: Vec<NamedScore> = scores
            .into_iter()
            .filter_map(|s| match names.get(&s.user_id) {
                Some(name) => Some(NamedScore {
                    annotator: name.clone(),
                    validated: s.validated(),
                    not_validated: s.not_validated(),
                }),
                None => {
                    warn!("Dropping score of unknown user {}", s.user_id);
                    None
                }
            })
            .collect();

        let co_members = if viewer.privileged {
            None
        } else {
            Some(st.db.co_members(&caller_id)?)
        };
        Ok(anonymize(named, &viewer, co_members.as_ref()))
    })
    .await?;

    Ok(Json(
        rows.into_iter()
            .map(|r| GeneralStatsRow {
                anonymized_user: r.display_label,
                validated: round2(r.validated),
                not_validated: round2(r.not_validated),
            })
            .collect::<Vec<_>>(),
    ))
}

/// Ground truth per (post, question). Investigators and admins only.
pub async fn consensus(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    if !claims.role.is_privileged() {
        return Err(StatusCode::FORBIDDEN);
    }
    let scope = Scope::from_study(query.study_id);

    let response = blocking(&state, move |st| {
        let votes = VoteSet::build(st.db.snapshot(scope)?);
        let consensus = resolve_consensus(&votes);
        let pairs = consensus
            .iter()
            .map(|(pair, c)| ConsensusRow {
                post_id: pair.post_id,
                question_id: pair.question_id,
                category_id: c.resolved_category(),
                total_votes: c.total_votes(),
                verdict: c.verdict.label().to_string(),
            })
            .collect();
        let unconfigured_studies = consensus
            .issues()
            .iter()
            .map(|(study_id, issue)| StudyIssue {
                study_id: *study_id,
                message: issue.to_string(),
            })
            .collect();
        Ok(ConsensusResponse {
            pairs,
            unconfigured_studies,
        })
    })
    .await?;

    if !response.unconfigured_studies.is_empty() {
        warn!(
            "Consensus for {} requested by {}: {} studies lack usable thresholds",
            scope,
            claims.username,
            response.unconfigured_studies.len()
        );
    }

    Ok(Json(response))
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(2.0 / 3.0), 0.67);
        assert_eq!(round2(1.0 / 3.0), 0.33);
        assert_eq!(round2(4.0), 4.0);
    }
}
