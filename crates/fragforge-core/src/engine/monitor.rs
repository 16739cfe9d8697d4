use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

const COUNTER_COUNT: usize = 44;

/// Named counters describing what happened while generating candidates.
///
/// Attempt counters are increased when an attempt starts; `Failed*` counters record where an
/// attempt stopped. A failed attempt increases its most specific counter as well as the
/// general one of its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterId {
    NewCandidateAttempts,

    XoverAttempts,
    XoverParentSearch,
    FailedXoverAttempts,
    FailedXoverAttemptsFindParents,
    FailedXoverAttemptsPerform,
    FailedXoverAttemptsSetupRings,
    FailedXoverAttemptsEval,
    FailedXoverAttemptsForbiddenEnds,

    MutAttempts,
    MutParentSearch,
    FailedMutAttempts,
    FailedMutAttemptsPerform,
    FailedMutAttemptsPerformNoMutSite,
    FailedMutAttemptsPerformNoOwner,
    FailedMutAttemptsPerformBadMutType,
    FailedMutAttemptsPerformNoChangeBranch,
    FailedMutAttemptsPerformNoChangeLink,
    FailedMutAttemptsPerformNoChangeLinkFind,
    FailedMutAttemptsPerformNoChangeLinkEdit,
    FailedMutAttemptsPerformNoDelLinkFindParent,
    FailedMutAttemptsPerformNoDelLinkEdit,
    FailedMutAttemptsPerformNoDeleteChain,
    FailedMutAttemptsPerformNoAddLink,
    FailedMutAttemptsPerformNoAddLinkFind,
    FailedMutAttemptsPerformNoAddLinkEdit,
    FailedMutAttemptsPerformNoExtend,
    FailedMutAttemptsPerformNoDelete,
    FailedMutAttemptsSetupRings,
    FailedMutAttemptsEval,
    FailedMutAttemptsForbiddenEnds,

    BuildAnewAttempts,
    FailedBuildAttempts,
    FailedBuildAttemptsGraphBuild,
    FailedBuildAttemptsEval,
    FailedBuildAttemptsSetupRings,
    FailedBuildAttemptsForbiddenEnds,

    ManualAddAttempts,
    FailedManualAddAttempts,
    FailedManualAddAttemptsEval,

    FitnessEvals,
    FailedFitnessEvals,
    DuplicatePreFitness,
    FailedDuplicatePreFitnessDetection,
}

impl CounterId {
    pub const ALL: [CounterId; COUNTER_COUNT] = [
        CounterId::NewCandidateAttempts,
        CounterId::XoverAttempts,
        CounterId::XoverParentSearch,
        CounterId::FailedXoverAttempts,
        CounterId::FailedXoverAttemptsFindParents,
        CounterId::FailedXoverAttemptsPerform,
        CounterId::FailedXoverAttemptsSetupRings,
        CounterId::FailedXoverAttemptsEval,
        CounterId::FailedXoverAttemptsForbiddenEnds,
        CounterId::MutAttempts,
        CounterId::MutParentSearch,
        CounterId::FailedMutAttempts,
        CounterId::FailedMutAttemptsPerform,
        CounterId::FailedMutAttemptsPerformNoMutSite,
        CounterId::FailedMutAttemptsPerformNoOwner,
        CounterId::FailedMutAttemptsPerformBadMutType,
        CounterId::FailedMutAttemptsPerformNoChangeBranch,
        CounterId::FailedMutAttemptsPerformNoChangeLink,
        CounterId::FailedMutAttemptsPerformNoChangeLinkFind,
        CounterId::FailedMutAttemptsPerformNoChangeLinkEdit,
        CounterId::FailedMutAttemptsPerformNoDelLinkFindParent,
        CounterId::FailedMutAttemptsPerformNoDelLinkEdit,
        CounterId::FailedMutAttemptsPerformNoDeleteChain,
        CounterId::FailedMutAttemptsPerformNoAddLink,
        CounterId::FailedMutAttemptsPerformNoAddLinkFind,
        CounterId::FailedMutAttemptsPerformNoAddLinkEdit,
        CounterId::FailedMutAttemptsPerformNoExtend,
        CounterId::FailedMutAttemptsPerformNoDelete,
        CounterId::FailedMutAttemptsSetupRings,
        CounterId::FailedMutAttemptsEval,
        CounterId::FailedMutAttemptsForbiddenEnds,
        CounterId::BuildAnewAttempts,
        CounterId::FailedBuildAttempts,
        CounterId::FailedBuildAttemptsGraphBuild,
        CounterId::FailedBuildAttemptsEval,
        CounterId::FailedBuildAttemptsSetupRings,
        CounterId::FailedBuildAttemptsForbiddenEnds,
        CounterId::ManualAddAttempts,
        CounterId::FailedManualAddAttempts,
        CounterId::FailedManualAddAttemptsEval,
        CounterId::FitnessEvals,
        CounterId::FailedFitnessEvals,
        CounterId::DuplicatePreFitness,
        CounterId::FailedDuplicatePreFitnessDetection,
    ];

    /// Column name used in monitor reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewCandidateAttempts => "NEWCANDIDATEATTEMPTS",
            Self::XoverAttempts => "XOVERATTEMPTS",
            Self::XoverParentSearch => "XOVERPARENTSEARCH",
            Self::FailedXoverAttempts => "FAILEDXOVERATTEMPTS",
            Self::FailedXoverAttemptsFindParents => "FAILEDXOVERATTEMPTS_FINDPARENTS",
            Self::FailedXoverAttemptsPerform => "FAILEDXOVERATTEMPTS_PERFORM",
            Self::FailedXoverAttemptsSetupRings => "FAILEDXOVERATTEMPTS_SETUPRINGS",
            Self::FailedXoverAttemptsEval => "FAILEDXOVERATTEMPTS_EVAL",
            Self::FailedXoverAttemptsForbiddenEnds => "FAILEDXOVERATTEMPTS_FORBENDS",
            Self::MutAttempts => "MUTATTEMPTS",
            Self::MutParentSearch => "MUTPARENTSEARCH",
            Self::FailedMutAttempts => "FAILEDMUTATTEMTS",
            Self::FailedMutAttemptsPerform => "FAILEDMUTATTEMTS_PERFORM",
            Self::FailedMutAttemptsPerformNoMutSite => "FAILEDMUTATTEMTS_PERFORM_NOMUTSITE",
            Self::FailedMutAttemptsPerformNoOwner => "FAILEDMUTATTEMTS_PERFORM_NOOWNER",
            Self::FailedMutAttemptsPerformBadMutType => "FAILEDMUTATTEMTS_PERFORM_BADMUTTYPE",
            Self::FailedMutAttemptsPerformNoChangeBranch => {
                "FAILEDMUTATTEMTS_PERFORM_NOCHANGEBRANCH"
            }
            Self::FailedMutAttemptsPerformNoChangeLink => "FAILEDMUTATTEMTS_PERFORM_NOCHANGELINK",
            Self::FailedMutAttemptsPerformNoChangeLinkFind => {
                "FAILEDMUTATTEMTS_PERFORM_NOCHANGELINK_FIND"
            }
            Self::FailedMutAttemptsPerformNoChangeLinkEdit => {
                "FAILEDMUTATTEMTS_PERFORM_NOCHANGELINK_EDIT"
            }
            Self::FailedMutAttemptsPerformNoDelLinkFindParent => {
                "FAILEDMUTATTEMTS_PERFORM_NODELLINK_FINDPARENT"
            }
            Self::FailedMutAttemptsPerformNoDelLinkEdit => "FAILEDMUTATTEMTS_PERFORM_NODELLINK_EDIT",
            Self::FailedMutAttemptsPerformNoDeleteChain => "FAILEDMUTATTEMTS_PERFORM_NODELETECHAIN",
            Self::FailedMutAttemptsPerformNoAddLink => "FAILEDMUTATTEMTS_PERFORM_NOADDLINK",
            Self::FailedMutAttemptsPerformNoAddLinkFind => "FAILEDMUTATTEMTS_PERFORM_NOADDLINK_FIND",
            Self::FailedMutAttemptsPerformNoAddLinkEdit => "FAILEDMUTATTEMTS_PERFORM_NOADDLINK_EDIT",
            Self::FailedMutAttemptsPerformNoExtend => "FAILEDMUTATTEMTS_PERFORM_NOEXTEND",
            Self::FailedMutAttemptsPerformNoDelete => "FAILEDMUTATTEMTS_PERFORM_NODELETE",
            Self::FailedMutAttemptsSetupRings => "FAILEDMUTATTEMTS_SETUPRINGS",
            Self::FailedMutAttemptsEval => "FAILEDMUTATTEMTS_EVAL",
            Self::FailedMutAttemptsForbiddenEnds => "FAILEDMUTATTEMTS_FORBENDS",
            Self::BuildAnewAttempts => "BUILDANEWATTEMPTS",
            Self::FailedBuildAttempts => "FAILEDBUILDATTEMPTS",
            Self::FailedBuildAttemptsGraphBuild => "FAILEDBUILDATTEMPTS_GRAPHBUILD",
            Self::FailedBuildAttemptsEval => "FAILEDBUILDATTEMPTS_EVAL",
            Self::FailedBuildAttemptsSetupRings => "FAILEDBUILDATTEMPTS_SETUPRINGS",
            Self::FailedBuildAttemptsForbiddenEnds => "FAILEDBUILDATTEMPTS_FORBIDENDS",
            Self::ManualAddAttempts => "MANUALADDATTEMPTS",
            Self::FailedManualAddAttempts => "FAILEDMANUALADDATTEMPTS",
            Self::FailedManualAddAttemptsEval => "FAILEDMANUALADDATTEMPTS_EVAL",
            Self::FitnessEvals => "FITNESSEVALS",
            Self::FailedFitnessEvals => "FAILEDFITNESSEVALS",
            Self::DuplicatePreFitness => "DUPLICATEPREFITNESS",
            Self::FailedDuplicatePreFitnessDetection => "FAILEDDUPLICATEPREFITNESSDETECTION",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for CounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Thread-safe set of counters for one phase of a run, typically one generation.
#[derive(Debug)]
pub struct Monitor {
    name: String,
    generation: usize,
    counters: [AtomicU64; COUNTER_COUNT],
}

impl Monitor {
    pub fn new(name: impl Into<String>, generation: usize) -> Self {
        Self {
            name: name.into(),
            generation,
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    #[inline]
    pub fn increase(&self, id: CounterId) {
        self.increase_by(id, 1);
    }

    #[inline]
    pub fn increase_by(&self, id: CounterId, value: u64) {
        self.counters[id.index()].fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, id: CounterId) -> u64 {
        self.counters[id.index()].load(Ordering::Relaxed)
    }

    /// Adds every counter of `other` to this monitor.
    pub fn absorb(&self, other: &Monitor) {
        for id in CounterId::ALL {
            self.increase_by(id, other.get(id));
        }
    }

    /// Column names of a monitor report.
    pub fn header() -> Vec<String> {
        ["RecordType", "MonitorName", "Generation"]
            .into_iter()
            .map(str::to_string)
            .chain(CounterId::ALL.iter().map(|id| id.name().to_string()))
            .collect()
    }

    /// One report row, tagged with `record_type` (e.g. `SUMMARY`).
    pub fn record(&self, record_type: &str) -> Vec<String> {
        [
            record_type.to_string(),
            self.name.clone(),
            self.generation.to_string(),
        ]
        .into_iter()
        .chain(CounterId::ALL.iter().map(|&id| self.get(id).to_string()))
        .collect()
    }

    /// Writes a space-separated report row, preceded by the header if requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying writer fails.
    pub fn write_report<W: Write>(
        &self,
        writer: W,
        record_type: &str,
        with_header: bool,
    ) -> Result<(), csv::Error> {
        let mut csv = csv::WriterBuilder::new()
            .delimiter(b' ')
            .has_headers(false)
            .from_writer(writer);
        if with_header {
            csv.write_record(Self::header())?;
        }
        csv.write_record(self.record(record_type))?;
        csv.flush()?;
        Ok(())
    }
}
