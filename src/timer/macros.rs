/// Declares a static global `CEC_DRIVER` instance protected by a
/// `critical_section` mutex.
///
/// This creates the `static` singleton the ISR macros operate on,
/// suitable for environments where the edge ISR, the alarm ISR and the
/// engine task all need safe access to the shared driver state.
///
/// # Arguments
/// - `$pin`: the concrete type of the CEC line pin (must implement
///   `OutputPin`)
/// - `$alarm`: the concrete type of the alarm (must implement
///   [`AlarmScheduler`](crate::timer::AlarmScheduler))
///
/// # Example
/// ```rust,ignore
/// init_cec_driver!(MyLinePin, MyAlarm);
/// ```
#[macro_export]
macro_rules! init_cec_driver {
    ( $pin:ty, $alarm:ty ) => {
        pub static CEC_DRIVER: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::driver::CecDriver<$pin, $alarm>>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

/// Initializes the global `CEC_DRIVER` singleton with a new driver.
///
/// # Arguments
/// - `$pin`: the CEC line pin value
/// - `$alarm`: the alarm value
///
/// # Example
/// ```rust,ignore
/// fn main() {
///     setup_cec_driver!(pin, alarm);
/// }
/// ```
///
/// # Notes
/// - Requires `init_cec_driver!` to have been used earlier.
/// - Safe to call from `main()` before interrupts are enabled.
#[macro_export]
macro_rules! setup_cec_driver {
    ( $pin:expr, $alarm:expr ) => {
        $crate::timer::global_cec_driver_setup(&CEC_DRIVER, $pin, $alarm);
    };
}

/// Forwards one GPIO edge to the global `CEC_DRIVER`.
///
/// Invoke from the edge-change interrupt with a microsecond timestamp
/// and the line level after the edge. Both edges must be reported.
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn IO_IRQ_BANK0() {
///     let now = timer_us();
///     cec_edge_isr!(now, cec_line_is_low());
/// }
/// ```
#[macro_export]
macro_rules! cec_edge_isr {
    ( $now_us:expr, $line_low:expr ) => {
        $crate::timer::cec_edge_interrupt(&CEC_DRIVER, $now_us, $line_low);
    };
}

/// Dispatches due alarm deadlines on the global `CEC_DRIVER`.
///
/// Invoke from the single-shot alarm interrupt the driver arms through
/// its [`AlarmScheduler`](crate::timer::AlarmScheduler).
///
/// # Example
/// ```rust,ignore
/// #[interrupt]
/// fn TIMER_IRQ_0() {
///     cec_alarm_isr!(timer_us());
/// }
/// ```
#[macro_export]
macro_rules! cec_alarm_isr {
    ( $now_us:expr ) => {
        $crate::timer::cec_alarm_interrupt(&CEC_DRIVER, $now_us);
    };
}
