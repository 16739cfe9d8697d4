use super::config::GaConfig;
use super::monitor::Monitor;
use super::progress::ProgressReporter;
use crate::core::library::fragment_space::FragmentSpace;
use crate::core::library::ring_closures::RingClosuresArchive;
use crate::core::models::ids::IdGenerator;

/// Everything a genetic operator needs besides the graphs it works on.
///
/// All members are shared references, so a context is `Copy` and can be handed to every worker
/// of a parallel generation.
#[derive(Clone, Copy)]
pub struct GaContext<'a> {
    pub space: &'a FragmentSpace,
    pub archive: &'a RingClosuresArchive,
    pub config: &'a GaConfig,
    pub ids: &'a IdGenerator,
    pub monitor: &'a Monitor,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a> GaContext<'a> {
    pub fn new(
        space: &'a FragmentSpace,
        archive: &'a RingClosuresArchive,
        config: &'a GaConfig,
        ids: &'a IdGenerator,
        monitor: &'a Monitor,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            space,
            archive,
            config,
            ids,
            monitor,
            reporter,
        }
    }

    /// The same context, counting events on `monitor` instead.
    pub fn with_monitor<'b>(&self, monitor: &'b Monitor) -> GaContext<'b>
    where
        'a: 'b,
    {
        GaContext {
            space: self.space,
            archive: self.archive,
            config: self.config,
            ids: self.ids,
            monitor,
            reporter: self.reporter,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::*;
    use super::*;
    use crate::engine::monitor::CounterId;

    #[test]
    fn with_monitor_redirects_counting_only() {
        let harness = Harness::new(default_config());
        let ctx = harness.ctx();
        let other = Monitor::new("other", 1);
        let redirected = ctx.with_monitor(&other);
        redirected.monitor.increase(CounterId::NewCandidateAttempts);
        assert_eq!(other.get(CounterId::NewCandidateAttempts), 1);
        assert_eq!(harness.monitor.get(CounterId::NewCandidateAttempts), 0);
        assert_eq!(redirected.config.population_size, 10);
    }
}
