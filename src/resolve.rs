use std::collections::{HashMap, HashSet};

use crate::model::{
    FootnoteDefinition, FootnoteMarker, ResolvedFootnote, Warning, WarningKind,
};

/// Pair markers with definitions: by exact label equality for labeled
/// entries, by positional order for unlabeled ones. Unpairable items are
/// reported as warnings and left untouched in the output — never guessed
/// at, never silently dropped. Deterministic for identical input.
pub(crate) fn resolve(
    markers: Vec<FootnoteMarker>,
    definitions: Vec<FootnoteDefinition>,
) -> (Vec<ResolvedFootnote>, Vec<Warning>) {
    let mut resolved = Vec::new();
    let mut warnings = Vec::new();

    // Definitions per label, in document order.
    let mut defs_by_label: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, def) in definitions.iter().enumerate() {
        if let Some(label) = def.label.as_deref() {
            defs_by_label.entry(label).or_default().push(i);
        }
    }

    let mut def_matched = vec![false; definitions.len()];
    let mut seen_marker_labels: HashSet<&str> = HashSet::new();

    for marker in &markers {
        let Some(label) = marker.label.as_deref() else {
            continue;
        };
        if !seen_marker_labels.insert(label) {
            warnings.push(Warning::new(
                WarningKind::DuplicateLabel,
                Some(label),
                format!("multiple markers labeled {label}; only the first is resolved"),
            ));
            continue;
        }
        match defs_by_label.get(label).map(|v| v[0]) {
            Some(di) => {
                def_matched[di] = true;
                resolved.push(ResolvedFootnote {
                    marker: marker.clone(),
                    definition: definitions[di].clone(),
                    display_label: label.to_string(),
                });
            }
            None => warnings.push(Warning::new(
                WarningKind::UnresolvedReference,
                Some(label),
                format!("no footnote definition labeled {label}"),
            )),
        }
    }

    let mut seen_def_labels: HashSet<&str> = HashSet::new();
    for (i, def) in definitions.iter().enumerate() {
        let Some(label) = def.label.as_deref() else {
            continue;
        };
        if !seen_def_labels.insert(label) {
            warnings.push(Warning::new(
                WarningKind::DuplicateLabel,
                Some(label),
                format!("multiple definitions labeled {label}; extras left in place"),
            ));
            continue;
        }
        if !def_matched[i] {
            warnings.push(Warning::new(
                WarningKind::OrphanDefinition,
                Some(label),
                format!("footnote definition labeled {label} has no matching reference"),
            ));
        }
    }

    // Label-free entries pair positionally: k-th marker with k-th
    // definition. The surplus side is excluded from substitution.
    let unlabeled_markers: Vec<&FootnoteMarker> =
        markers.iter().filter(|m| m.label.is_none()).collect();
    let unlabeled_defs: Vec<&FootnoteDefinition> =
        definitions.iter().filter(|d| d.label.is_none()).collect();
    let paired = unlabeled_markers.len().min(unlabeled_defs.len());
    for k in 0..paired {
        resolved.push(ResolvedFootnote {
            marker: unlabeled_markers[k].clone(),
            definition: unlabeled_defs[k].clone(),
            display_label: (k + 1).to_string(),
        });
    }
    for _ in unlabeled_markers.iter().skip(paired) {
        warnings.push(Warning::new(
            WarningKind::CountMismatch,
            None,
            "unlabeled marker without a positional definition".to_string(),
        ));
    }
    for _ in unlabeled_defs.iter().skip(paired) {
        warnings.push(Warning::new(
            WarningKind::CountMismatch,
            None,
            "unlabeled definition without a positional marker".to_string(),
        ));
    }

    resolved.sort_by_key(|r| (r.marker.block, r.marker.run));
    log::debug!(
        "resolved {} of {} markers against {} definitions ({} warnings)",
        resolved.len(),
        markers.len(),
        definitions.len(),
        warnings.len()
    );
    (resolved, warnings)
}
