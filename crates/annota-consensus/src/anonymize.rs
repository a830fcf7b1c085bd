use std::collections::{BTreeSet, HashMap, HashSet};

/// Score row keyed by a real annotator identity (username).
#[derive(Debug, Clone, PartialEq)]
pub struct NamedScore {
    pub annotator: String,
    pub validated: f64,
    pub not_validated: f64,
}

/// Who is looking at the rows.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub identity: String,
    pub privileged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub display_label: String,
    pub validated: f64,
    pub not_validated: f64,
}

pub fn pseudonym(rank: usize) -> String {
    format!("Annotator {}", rank)
}

/// Project score rows for `viewer`.
///
/// Privileged viewers see every real identity and are never filtered. Anyone
/// else only sees themselves plus the identities in `co_members` (when
/// given), and every identity but their own is replaced by `Annotator N`,
/// N being the 1-based position in the sorted set of visible identities.
/// Rows come back in that same order.
pub fn anonymize(
    rows: Vec<NamedScore>,
    viewer: &Viewer,
    co_members: Option<&HashSet<String>>,
) -> Vec<DisplayRow> {
    let mut rows: Vec<NamedScore> = match co_members {
        Some(members) if !viewer.privileged => rows
            .into_iter()
            .filter(|r| r.annotator == viewer.identity || members.contains(&r.annotator))
            .collect(),
        _ => rows,
    };

    let identities: BTreeSet<&str> = rows.iter().map(|r| r.annotator.as_str()).collect();
    let rank: HashMap<String, usize> = identities
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id.to_string(), i + 1))
        .collect();

    rows.sort_by(|a, b| a.annotator.cmp(&b.annotator));
    rows.into_iter()
        .map(|r| {
            let display_label = if viewer.privileged || r.annotator == viewer.identity {
                r.annotator
            } else {
                pseudonym(rank[&r.annotator])
            };
            DisplayRow {
                display_label,
                validated: r.validated,
                not_validated: r.not_validated,
            }
        })
        .collect()
}
