use crate::common::types::Verbosity;
use crate::config::CheckConfig;
use crate::posix::identity::Identity;
use crate::posix::mounts::MountTable;
use crate::probe::Probe;

/// Everything one invocation needs, loaded once and passed by reference.
///
/// Resolved segments borrow their mount records from `mounts`, so a
/// `ResolvedChain` cannot outlive the context it came from.
pub struct Context {
    pub identity: Identity,
    pub mounts: MountTable,
    pub config: CheckConfig,
    pub verbosity: Verbosity,
    probe: Box<dyn Probe>,
}

impl Context {
    pub fn new(identity: Identity, mounts: MountTable, config: CheckConfig, probe: Box<dyn Probe>) -> Self {
        Self {
            identity,
            mounts,
            config,
            verbosity: Verbosity::default(),
            probe,
        }
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn probe(&self) -> &dyn Probe {
        self.probe.as_ref()
    }
}
