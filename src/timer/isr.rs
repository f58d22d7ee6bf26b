use crate::driver::{CecDriver, SendError};
use crate::engine::CecBus;
use crate::frame::CecFrame;
use crate::timer::AlarmScheduler;
use core::cell::RefCell;
use core::convert::Infallible;
use core::fmt;
use critical_section::Mutex;
use embedded_hal::digital::OutputPin;

/// Used to initialize the global static [`CecDriver`] for use with
/// `critical_section`.
///
/// # Returns
/// * An empty mutable ref-cell
///
/// # Example
/// ```rust
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// use picocec::driver::CecDriver;
/// use picocec::timer::{AlarmScheduler, global_cec_driver_init};
/// # use embedded_hal_mock::eh1::digital::Mock as Pin;
///
/// #[derive(Debug)]
/// struct Alarm;
/// impl AlarmScheduler for Alarm {
///     fn schedule_at(&mut self, _deadline_us: u64) {}
/// }
///
/// static CEC_DRIVER: Mutex<RefCell<Option<CecDriver<Pin, Alarm>>>> =
///     global_cec_driver_init::<Pin, Alarm>();
/// ```
pub const fn global_cec_driver_init<P: OutputPin, A: AlarmScheduler>()
-> Mutex<RefCell<Option<CecDriver<P, A>>>> {
    Mutex::new(RefCell::new(None))
}

/// Places a fresh driver into the global singleton.
///
/// # Arguments
/// * The global static [`CecDriver`] cell
/// * The CEC line pin (open-drain semantics: `set_low` asserts)
/// * The single-shot alarm the driver arms its deadlines through
pub fn global_cec_driver_setup<P: OutputPin, A: AlarmScheduler>(
    global_driver: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
    pin: P,
    alarm: A,
) {
    critical_section::with(|cs| {
        let _ = global_driver
            .borrow(cs)
            .replace(Some(CecDriver::new(pin, alarm)));
    });
}

/// GPIO edge-change ISR body: forwards one edge to the global driver.
///
/// Call with a monotonic microsecond timestamp and the line level
/// after the edge. Both edges must be reported, including the ones the
/// driver causes itself.
pub fn cec_edge_interrupt<P: OutputPin, A: AlarmScheduler>(
    global_driver: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
    now_us: u64,
    line_low: bool,
) {
    critical_section::with(|cs| {
        if let Some(driver) = global_driver.borrow(cs).borrow_mut().as_mut() {
            driver.on_edge(now_us, line_low);
        }
    });
}

/// Alarm ISR body: dispatches due deadlines on the global driver.
pub fn cec_alarm_interrupt<P: OutputPin, A: AlarmScheduler>(
    global_driver: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
    now_us: u64,
) {
    critical_section::with(|cs| {
        if let Some(driver) = global_driver.borrow(cs).borrow_mut().as_mut() {
            driver.on_alarm(now_us);
        }
    });
}

/// Non-blocking send through the global driver.
///
/// Starts the transmission on the first call and reports progress on
/// subsequent ones, so it composes with `nb::block!`:
///
/// ```rust,ignore
/// nb::block!(send_via_cec(&CEC_DRIVER, &frame, timer.now_us()))?;
/// ```
///
/// # Returns
/// - `Ok(())` once the frame was acknowledged
/// - `Err(nb::Error::WouldBlock)` while in flight
/// - `Err(nb::Error::Other(_))` after retries are exhausted, or with
///   [`SendError::Busy`] when the driver was never set up
pub fn send_via_cec<P: OutputPin, A: AlarmScheduler>(
    global_driver: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
    frame: &CecFrame,
    now_us: u64,
) -> nb::Result<(), SendError> {
    critical_section::with(|cs| {
        let mut guard = global_driver.borrow(cs).borrow_mut();
        let Some(driver) = guard.as_mut() else {
            return Err(nb::Error::Other(SendError::Busy));
        };
        if !driver.sending() {
            driver.begin_send(frame, now_us).map_err(nb::Error::Other)?;
        }
        driver.send_status()
    })
}

/// Non-blocking receive from the global driver. Blocks never; pair
/// with `nb::block!` (or a WFI loop) on the engine task.
pub fn recv_via_cec<P: OutputPin, A: AlarmScheduler>(
    global_driver: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
) -> nb::Result<CecFrame, Infallible> {
    critical_section::with(|cs| {
        let mut guard = global_driver.borrow(cs).borrow_mut();
        guard
            .as_mut()
            .and_then(CecDriver::poll_recv)
            .ok_or(nb::Error::WouldBlock)
    })
}

/// Programs the acknowledgment filter of the global driver.
pub fn set_cec_address<P: OutputPin, A: AlarmScheduler>(
    global_driver: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
    la: u8,
) {
    critical_section::with(|cs| {
        if let Some(driver) = global_driver.borrow(cs).borrow_mut().as_mut() {
            driver.set_logical_address(la);
        }
    });
}

/// [`CecBus`] implementation over the global driver for the protocol
/// engine task.
///
/// `now` supplies monotonic microsecond timestamps (on RP2040-class
/// hardware, a read of the system timer). While a send is in flight
/// the bus also drives [`cec_alarm_interrupt`] from task context, so
/// free-time waits make progress even on platforms whose alarm glue
/// only re-arms from interrupt returns.
pub struct IsrBus<P, A, F>
where
    P: OutputPin + 'static,
    A: AlarmScheduler + 'static,
    F: FnMut() -> u64,
{
    global: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>,
    now: F,
}

impl<P, A, F> IsrBus<P, A, F>
where
    P: OutputPin + 'static,
    A: AlarmScheduler + 'static,
    F: FnMut() -> u64,
{
    /// Wraps the global driver and a clock.
    pub fn new(global: &'static Mutex<RefCell<Option<CecDriver<P, A>>>>, now: F) -> Self {
        Self { global, now }
    }
}

impl<P, A, F> fmt::Debug for IsrBus<P, A, F>
where
    P: OutputPin + 'static,
    A: AlarmScheduler + 'static,
    F: FnMut() -> u64,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsrBus").finish_non_exhaustive()
    }
}

impl<P, A, F> CecBus for IsrBus<P, A, F>
where
    P: OutputPin + 'static,
    A: AlarmScheduler + 'static,
    F: FnMut() -> u64,
{
    fn send(&mut self, frame: &CecFrame) -> Result<(), SendError> {
        loop {
            match send_via_cec(self.global, frame, (self.now)()) {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {
                    cec_alarm_interrupt(self.global, (self.now)());
                }
            }
        }
    }

    fn recv(&mut self) -> nb::Result<CecFrame, Infallible> {
        recv_via_cec(self.global)
    }

    fn set_address(&mut self, la: u8) {
        set_cec_address(self.global, la);
    }
}
