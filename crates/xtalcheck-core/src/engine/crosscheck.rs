use super::CancelToken;
use crate::domain::{CheckError, CheckResult, MatchVerdict, VerdictKind};
use crate::matcher::{ComparatorVerdict, StructureComparator};
use crate::sink::VerdictSink;
use crate::store::{GroupResolver, RecordStore, Resolution};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct CrossCheckOptions {
    /// Bound the grouping query to a prefix of the group population; `None`
    /// scans the whole store.
    pub scan_limit: Option<usize>,
    /// Memoize NotFound lookups for the duration of the run.
    pub cache_missing: bool,
    pub cancel: CancelToken,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossCheckSummary {
    pub batches: usize,
    pub comparisons: usize,
    pub matches: usize,
    pub skipped_pairs: usize,
    pub cancelled: bool,
}

/// Full-population cross-checker: compares the canonical structures of every
/// pair of groups that share a composition signature.
///
/// All collaborators are injected, so tests can substitute a fake store, a
/// scripted comparator, and a recording sink.
pub struct CrossChecker<'a, S: RecordStore, M: StructureComparator> {
    store: &'a S,
    matcher: &'a M,
    sink: &'a mut dyn VerdictSink,
}

impl<'a, S: RecordStore, M: StructureComparator> CrossChecker<'a, S, M> {
    pub fn new(store: &'a S, matcher: &'a M, sink: &'a mut dyn VerdictSink) -> Self {
        Self {
            store,
            matcher,
            sink,
        }
    }

    pub fn run(&mut self, options: &CrossCheckOptions) -> CheckResult<CrossCheckSummary> {
        // The grouping query is the one store operation allowed to kill the
        // run; everything past this point degrades per id or per pair.
        let batches = self
            .store
            .duplicate_composition_batches(options.scan_limit)
            .map_err(CheckError::from)?;

        self.sink
            .open()
            .map_err(|error| CheckError::sink("SINK.OPEN", error.to_string()))?;

        let mut resolver = GroupResolver::new(self.store, options.cache_missing);
        let mut summary = CrossCheckSummary {
            batches: batches.len(),
            ..CrossCheckSummary::default()
        };

        'batches: for batch in &batches {
            if options.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            debug!(
                composition = %batch.composition,
                groups = batch.group_ids.len(),
                "processing composition batch"
            );

            let ids = &batch.group_ids;
            for (index, primary_id) in ids.iter().enumerate().take(ids.len().saturating_sub(1)) {
                let remaining = ids.len() - index - 1;
                let primary = match resolver.resolve(*primary_id) {
                    Resolution::Found(group) => group,
                    Resolution::NotFound => {
                        summary.skipped_pairs += remaining;
                        continue;
                    }
                };

                for secondary_id in &ids[index + 1..] {
                    if options.cancel.is_cancelled() {
                        summary.cancelled = true;
                        break 'batches;
                    }

                    let secondary = match resolver.resolve(*secondary_id) {
                        Resolution::Found(group) => group,
                        Resolution::NotFound => {
                            summary.skipped_pairs += 1;
                            continue;
                        }
                    };

                    let outcome = match self
                        .matcher
                        .compare(&primary.canonical_structure, &secondary.canonical_structure)
                    {
                        Ok(outcome) => outcome,
                        Err(error) => {
                            warn!(
                                primary = %primary_id,
                                secondary = %secondary_id,
                                error = %error,
                                "comparator failure; skipping pair"
                            );
                            summary.skipped_pairs += 1;
                            continue;
                        }
                    };
                    summary.comparisons += 1;

                    let verdict = MatchVerdict {
                        primary: *primary_id,
                        secondary: *secondary_id,
                        kind: match outcome {
                            ComparatorVerdict::Match => VerdictKind::Match,
                            ComparatorVerdict::NoMatch => VerdictKind::NoMatch,
                            ComparatorVerdict::Incomparable => VerdictKind::Incomparable,
                        },
                        primary_key: primary.canonical_key.clone(),
                        secondary_key: secondary.canonical_key.clone(),
                    };
                    if verdict.kind.is_match() {
                        summary.matches += 1;
                    }
                    if let Err(error) = self.sink.write_verdict(&verdict) {
                        warn!(error = %error, "verdict write failed; continuing");
                    }
                }
            }
        }

        info!(
            batches = summary.batches,
            comparisons = summary.comparisons,
            matches = summary.matches,
            skipped_pairs = summary.skipped_pairs,
            cached_groups = resolver.cached_groups(),
            "cross-check run finished"
        );
        if let Err(error) = self.sink.close() {
            warn!(error = %error, "sink close failed");
        }
        Ok(summary)
    }
}
