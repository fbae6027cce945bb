use std::fmt;
use std::num::NonZero;
use std::sync::Arc;

use new_zealand::nz;

use crate::{HandleFactory, HandlePool, HardwareInfoClient, HardwareInfoClientFacade};

/// How many alive handles a pool permits per processor available to the process, unless
/// configured otherwise via [`HandlePoolBuilder::max_alive_handles()`].
pub const DEFAULT_HANDLES_PER_PROCESSOR: NonZero<usize> = nz!(4);

/// Builder for creating an instance of [`HandlePool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`HandlePool::new()`] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// # use handle_pool::{BoxedError, HandleFactory, Slot};
/// # struct Connector;
/// # impl HandleFactory for Connector {
/// #     type Handle = ();
/// #     fn generate(&self, _slot: Slot) -> Result<(), BoxedError> { Ok(()) }
/// #     fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool { true }
/// # }
/// use handle_pool::HandlePool;
///
/// let pool = HandlePool::<_, 2>::builder("/data/main.db", Connector)
///     .max_alive_handles(NonZero::new(16).unwrap())
///     .build();
///
/// assert_eq!(pool.max_alive_handles().get(), 16);
/// ```
#[must_use]
pub struct HandlePoolBuilder<F: HandleFactory, const SLOTS: usize> {
    path: Arc<str>,
    factory: F,
    max_alive_handles: Option<NonZero<usize>>,
    hardware_info: HardwareInfoClientFacade,
}

impl<F: HandleFactory, const SLOTS: usize> HandlePoolBuilder<F, SLOTS> {
    pub(crate) fn new(path: Arc<str>, factory: F) -> Self {
        Self {
            path,
            factory,
            max_alive_handles: None,
            hardware_info: HardwareInfoClientFacade::real(),
        }
    }

    /// Sets the maximum number of handles that may be alive at the same time, counted across
    /// all slots.
    ///
    /// By default this is [`DEFAULT_HANDLES_PER_PROCESSOR`] times the number of processors
    /// available to the process. The limit is fixed for the lifetime of the pool.
    pub fn max_alive_handles(mut self, max: NonZero<usize>) -> Self {
        self.max_alive_handles = Some(max);
        self
    }

    #[cfg(test)]
    pub(crate) fn hardware_info(mut self, hardware_info: HardwareInfoClientFacade) -> Self {
        self.hardware_info = hardware_info;
        self
    }

    /// Builds the handle pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if `SLOTS` is zero.
    #[must_use]
    pub fn build(self) -> HandlePool<F, SLOTS> {
        let max_alive_handles = self.max_alive_handles.unwrap_or_else(|| {
            self.hardware_info
                .processor_count()
                .saturating_mul(DEFAULT_HANDLES_PER_PROCESSOR)
        });

        HandlePool::new_inner(self.path, self.factory, max_alive_handles)
    }
}

impl<F: HandleFactory, const SLOTS: usize> fmt::Debug for HandlePoolBuilder<F, SLOTS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlePoolBuilder")
            .field("path", &self.path)
            .field(
                "factory_type",
                &format_args!("{}", std::any::type_name::<F>()),
            )
            .field("slots", &SLOTS)
            .field("max_alive_handles", &self.max_alive_handles)
            .field("hardware_info", &self.hardware_info)
            .finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{BoxedError, MockHardwareInfoClient, Slot};

    struct Unit;

    impl HandleFactory for Unit {
        type Handle = ();

        fn generate(&self, _slot: Slot) -> Result<(), BoxedError> {
            Ok(())
        }

        fn will_reuse(&self, _slot: Slot, _handle: &()) -> bool {
            true
        }
    }

    fn hardware_with_processors(count: NonZero<usize>) -> HardwareInfoClientFacade {
        let mut mock = MockHardwareInfoClient::new();
        mock.expect_processor_count()
            .times(1)
            .return_const(count);

        HardwareInfoClientFacade::from_mock(mock)
    }

    #[test]
    fn default_limit_scales_with_processors() {
        let pool = HandlePool::<_, 1>::builder("unit", Unit)
            .hardware_info(hardware_with_processors(nz!(3)))
            .build();

        assert_eq!(pool.max_alive_handles().get(), 12);
    }

    #[test]
    fn default_limit_saturates() {
        let pool = HandlePool::<_, 1>::builder("unit", Unit)
            .hardware_info(hardware_with_processors(NonZero::new(usize::MAX).unwrap()))
            .build();

        assert_eq!(pool.max_alive_handles().get(), usize::MAX);
    }

    #[test]
    fn explicit_limit_skips_hardware_query() {
        let mut mock = MockHardwareInfoClient::new();
        mock.expect_processor_count().never();

        let pool = HandlePool::<_, 1>::builder("unit", Unit)
            .hardware_info(HardwareInfoClientFacade::from_mock(mock))
            .max_alive_handles(nz!(2))
            .build();

        assert_eq!(pool.max_alive_handles().get(), 2);
    }

    #[test]
    fn debug_shows_configuration() {
        let builder = HandlePool::<_, 2>::builder("unit", Unit).max_alive_handles(nz!(5));

        let debug = format!("{builder:?}");

        assert!(debug.contains("unit"));
        assert!(debug.contains("slots: 2"));
        assert!(debug.contains("Unit"));
    }
}
