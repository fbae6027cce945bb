use std::num::NonZero;

use many_cpus::SystemHardware;

#[cfg_attr(test, mockall::automock)]
pub(crate) trait HardwareInfoClient {
    /// How many processors the current process is allowed to use.
    fn processor_count(&self) -> NonZero<usize>;
}

#[derive(Debug)]
pub(crate) struct HardwareInfoClientImpl;

impl HardwareInfoClient for HardwareInfoClientImpl {
    #[cfg_attr(test, mutants::skip)] // Trivial fn, result depends on the machine - skip mutating.
    fn processor_count(&self) -> NonZero<usize> {
        NonZero::new(SystemHardware::current().processors().len())
            .expect("the default processor set of a process is never empty")
    }
}
