#![no_main]
#![no_std]

use defmt::println;
use defmt_rtt as _;
use panic_probe as _;

use usb_device::{bus::UsbBusAllocator, prelude::*};
use usbd_serial::SerialPort;

mod actuator;
mod led;
mod setup;

use actuator::HalActuator;
use led::GpioLedBank;
use triplate_core::actuator::{Actuator, Axis};
use triplate_core::console::{CommandEntry, Console, ConsoleWriter, PollOutcome};
use triplate_core::controllers;
use triplate_core::dispatcher::Dispatcher;
use triplate_core::kinematics::Kinematics;
use triplate_core::bus::{BusError, BusTransfer, Notify, SharedBus};
use triplate_core::sensors::joystick::JoystickZero;
use triplate_core::sensors::{joystick, touch, JoystickSample};

use hal::usb::{UsbBus, UsbBusType};

/// Console command ids the dispatcher maps handler bodies onto, mirroring
/// the original's one-registration-per-command-string table. Grounded on
/// `balance_pid.c`/`balance_human.c`/`balance.c`'s `CMD_RegisterCommand`
/// call sites (spec §6).
mod cmd_id {
    pub const PID: u16 = 0;
    pub const PIDK: u16 = 1;
    pub const KP: u16 = 2;
    pub const KI: u16 = 3;
    pub const KD: u16 = 4;
    pub const HUMAN: u16 = 5;
    pub const HUMANK: u16 = 6;
    pub const HUMANDFS: u16 = 7;
    pub const HUMANI: u16 = 8;
    pub const NNTEST: u16 = 9;
    pub const FUZZY: u16 = 10;
    pub const TOUCH: u16 = 11;
    pub const DVBALANCE: u16 = 12;
    pub const HELP: u16 = 13;
    pub const OSF: u16 = 14;
    pub const DFS: u16 = 15;
    pub const PIDI: u16 = 16;
    pub const RESET: u16 = 17;
    pub const LED: u16 = 18;
    pub const XY: u16 = 19;
    pub const ABC: u16 = 20;
    pub const SERVO: u16 = 21;
    pub const SERVO_ZERO: u16 = 22;
    pub const STREAM: u16 = 23;
    // `unlock` has no registered-table entry: while locked, `Console`
    // intercepts bytes before they ever reach the line editor/command
    // lookup (mirroring `Handler_Locked`), so it is never looked up here.
    pub const LOCK: u16 = 24;
}

/// A console-requested mode switch; set by `console_task`, applied by
/// `dispatcher_task` on its next cycle since only it owns the LED bank.
/// `Pid`/`Human` are also button-reachable (spec §4.6) — forcing them from
/// the console just jumps the gun on the next button edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ForcedMode {
    Pid,
    Human,
    Nn,
    #[cfg(feature = "fuzzy")]
    Fuzzy,
}

/// Parse a decimal unsigned integer from an argument byte slice, mirroring
/// the original's argv-to-integer command parameters. Returns `None` on any
/// non-digit byte or an empty slice.
fn parse_u16(bytes: &[u8]) -> Option<u16> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        value = value * 10 + (b - b'0') as u32;
    }
    u16::try_from(value).ok()
}

// Three distinct priority levels across the spawned software tasks below
// (1: console_task; 2: dispatcher_task/joystick_scan; 3: actuator_enable/
// actuator_disable_then_reset) need one free interrupt apiece to dispatch on.
#[rtic::app(device = hal::pac, peripherals = true, dispatchers = [EXTI9_5, EXTI0, EXTI1])]
mod app {
    use super::*;
    use rtic_monotonics::fugit::MillisDurationU64;
    use rtic_monotonics::systick::Systick;
    use rtic_monotonics::Monotonic;

    /// Ball-position ping-pong buffer: single writer (the touch UART RX
    /// task), multiple readers (the dispatcher) — see
    /// [`triplate_core::sensors::touch::BallBuffer`]'s safety comment.
    static BALL_BUFFER: touch::BallBuffer = touch::BallBuffer::new();

    #[shared]
    struct Shared {
        dispatcher: Dispatcher,
        kinematics: Kinematics,
        console: Console,
        joystick_sample: JoystickSample,
        /// The operator-settable zero reference `joystick_scan` subtracts
        /// from each raw reading before publishing `joystick_sample`, and
        /// that entering Human mode re-captures (spec §4.1/§4.5's
        /// `joystick_zero_set()`).
        joystick_zero: JoystickZero,
        stream_active: bool,
        forced_mode: Option<ForcedMode>,
        telemetry_frame: heapless::Vec<u8, 64>,
        /// Shared (not `#[local]`) because `console_task`'s `servo`/`xy`/`abc`
        /// commands and `actuator_enable`/`actuator_disable_then_reset`'s
        /// stagger sequences all drive the actuator, alongside
        /// `dispatcher_task`'s own per-cycle output.
        actuator: HalActuator,
        /// Shared for the same reason: `console_task`'s `led` command and
        /// `dispatcher_task`'s mode/target indicators both drive the bank.
        leds: GpioLedBank,
    }

    #[local]
    struct Local {
        joystick_bus: hal::i2c::I2c<hal::pac::I2C1>,
        touch_uart: hal::usart::Usart<hal::pac::USART2>,
        usb_serial: SerialPort<'static, UsbBusType>,
        usb_dev: UsbDevice<'static, UsbBusType>,
        frame_parser: touch::FrameParser,
        console_tx_buf: heapless::Vec<u8, 256>,
    }

    #[init(local = [usb_bus: Option<UsbBusAllocator<UsbBusType>> = None])]
    fn init(cx: init::Context) -> (Shared, Local) {
        let dp = cx.device;

        let clock_cfg = setup::clock_config();
        clock_cfg.setup().unwrap();

        Systick::start(cx.core.SYST, 170_000_000, rtic_monotonics::create_systick_token!());

        println!("triplate-fw init");

        let mut leds = setup::setup_leds(&dp);
        let actuator_timer = setup::setup_actuator_timer(dp.TIM2, &clock_cfg);
        let actuator = HalActuator::new(actuator_timer);

        let (joystick_bus, touch_uart) = setup::setup_busses(dp.I2C1, dp.USART2, &clock_cfg);

        let usb = hal::usb::Peripheral { regs: dp.USB };
        *cx.local.usb_bus = Some(UsbBusAllocator::new(UsbBus::new(usb)));
        let usb_bus = cx.local.usb_bus.as_ref().unwrap();
        let usb_serial = SerialPort::new(usb_bus);
        let usb_dev = UsbDeviceBuilder::new(usb_bus, UsbVidPid(0x16c0, 0x27dd))
            .device_class(usbd_serial::USB_CLASS_CDC)
            .build();

        let mut console = Console::new();
        console.register("pid", cmd_id::PID);
        console.register("pidk", cmd_id::PIDK);
        console.register("kp", cmd_id::KP);
        console.register("ki", cmd_id::KI);
        console.register("kd", cmd_id::KD);
        console.register("human", cmd_id::HUMAN);
        console.register("humank", cmd_id::HUMANK);
        console.register("humandfs", cmd_id::HUMANDFS);
        console.register("humani", cmd_id::HUMANI);
        console.register("nntest", cmd_id::NNTEST);
        #[cfg(feature = "fuzzy")]
        console.register("fuzzy", cmd_id::FUZZY);
        console.register("touch", cmd_id::TOUCH);
        console.register("dvbalance", cmd_id::DVBALANCE);
        console.register("?", cmd_id::HELP);
        console.register("osf", cmd_id::OSF);
        console.register("dfs", cmd_id::DFS);
        console.register("pidi", cmd_id::PIDI);
        console.register("reset", cmd_id::RESET);
        console.register("led", cmd_id::LED);
        console.register("xy", cmd_id::XY);
        console.register("abc", cmd_id::ABC);
        console.register("servo", cmd_id::SERVO);
        console.register("servo-zero", cmd_id::SERVO_ZERO);
        console.register("stream", cmd_id::STREAM);
        console.register("lock", cmd_id::LOCK);

        let dispatcher = Dispatcher::new();
        dispatcher.activate_target_led(&mut leds);

        actuator_enable::spawn().ok();
        dispatcher_task::spawn().ok();
        joystick_scan::spawn().ok();
        console_task::spawn().ok();

        (
            Shared {
                dispatcher,
                kinematics: Kinematics::default(),
                console,
                joystick_sample: JoystickSample::default(),
                joystick_zero: JoystickZero::new(),
                stream_active: false,
                forced_mode: None,
                telemetry_frame: heapless::Vec::new(),
                actuator,
                leds,
            },
            Local {
                joystick_bus,
                touch_uart,
                usb_serial,
                usb_dev,
                frame_parser: touch::FrameParser::new(),
                console_tx_buf: heapless::Vec::new(),
            },
        )
    }

    /// One-shot actuator bring-up: zero and stagger-enable all three
    /// servos before any balancer mode can command them (spec §4.8). Locks
    /// the shared actuator only for each individual step, never across the
    /// stagger delay, so `dispatcher_task`/`console_task` are never blocked
    /// waiting on this one-shot sequence.
    #[task(priority = 3, shared = [actuator])]
    async fn actuator_enable(mut cx: actuator_enable::Context) {
        actuator::enable_sequence(|step| cx.shared.actuator.lock(|actuator| step(actuator))).await;
    }

    /// One-shot actuator park-down ahead of the `reset` command's software
    /// reboot: the mirror image of `actuator_enable`'s stagger-zero sequence,
    /// so the servos never see a simultaneous large move on either side of a
    /// reset (spec §4.8's inrush-current rationale applies equally here).
    #[task(priority = 3, shared = [actuator])]
    async fn actuator_disable_then_reset(mut cx: actuator_disable_then_reset::Context) {
        actuator::disable_sequence(|step| cx.shared.actuator.lock(|actuator| step(actuator))).await;
        cortex_m::peripheral::SCB::sys_reset();
    }

    /// 100 Hz balancer dispatcher: mode arbitration, target cycling, the
    /// active control law, kinematics, and telemetry streaming (spec §5).
    #[task(
        priority = 2,
        shared = [dispatcher, kinematics, joystick_sample, joystick_zero, stream_active, forced_mode, telemetry_frame, actuator, leds],
    )]
    async fn dispatcher_task(mut cx: dispatcher_task::Context) {
        #[cfg(feature = "print-status")]
        const PRINT_STATUS_RATIO: u32 = 100; // once a second, at the 100 Hz cycle rate
        #[cfg(feature = "print-status")]
        let mut loop_i: u32 = 0;

        let mut next_wake = Systick::now();
        loop {
            next_wake += MillisDurationU64::from_ticks(10);
            Systick::delay_until(next_wake).await;

            let ball = BALL_BUFFER.load();
            let joystick = cx.shared.joystick_sample.lock(|j| *j);
            let streaming = cx.shared.stream_active.lock(|s| *s);

            #[cfg(feature = "print-status")]
            {
                loop_i = loop_i.wrapping_add(1);
                if loop_i % PRINT_STATUS_RATIO == 0 {
                    println!(
                        "\nball: x={} y={} detected={}\njoystick: x={} y={} c={} z={}",
                        ball.x,
                        ball.y,
                        ball.detected,
                        joystick.x,
                        joystick.y,
                        joystick.button_c,
                        joystick.button_z,
                    );
                }
            }

            let forced = cx.shared.forced_mode.lock(|m| m.take());
            if let Some(forced) = forced {
                cx.shared.leds.lock(|leds| {
                    cx.shared.dispatcher.lock(|dispatcher| match forced {
                        // Pid keeps the persistent tuning, so it goes through
                        // its own entry point rather than a bare `new()`.
                        ForcedMode::Pid => dispatcher.force_pid_mode(leds),
                        ForcedMode::Human => {
                            // Console-forced entry into Human mode zeroes the
                            // joystick the same way the debounced Z-button
                            // path does (spec §4.5's `joystick_zero_set()`).
                            cx.shared.joystick_zero.lock(|zero| zero.set(joystick));
                            dispatcher.force_mode(
                                controllers::BalancerInterface::Human(controllers::human::HumanState::new()),
                                leds,
                            )
                        }
                        ForcedMode::Nn => dispatcher.force_mode(
                            controllers::BalancerInterface::Nn(controllers::nn::NnState::new()),
                            leds,
                        ),
                        #[cfg(feature = "fuzzy")]
                        ForcedMode::Fuzzy => dispatcher.force_mode(
                            controllers::BalancerInterface::Fuzzy(controllers::fuzzy::FuzzyState::new()),
                            leds,
                        ),
                    });
                });
            }

            let mut frame_buf = heapless::Vec::<u8, 64>::new();
            cx.shared.dispatcher.lock(|dispatcher| {
                dispatcher.set_streaming(streaming);
                cx.shared.kinematics.lock(|kinematics| {
                    cx.shared.actuator.lock(|actuator| {
                        cx.shared.leds.lock(|leds| {
                            cx.shared.joystick_zero.lock(|zero| {
                                dispatcher.run_cycle(
                                    joystick,
                                    ball,
                                    actuator,
                                    kinematics,
                                    leds,
                                    || (Systick::now().ticks() & 0xFFFF_FFFF) as usize,
                                    |frame| {
                                        let _ = frame_buf.extend_from_slice(frame);
                                    },
                                    |sample| zero.set(sample),
                                );
                            });
                        });
                    });
                });
            });

            if !frame_buf.is_empty() {
                cx.shared.telemetry_frame.lock(|shared_frame| {
                    *shared_frame = frame_buf;
                });
            }
        }
    }

    /// 200 Hz joystick scanner: runs the bus write/pause/read cycle and
    /// publishes the latest sample for the dispatcher (spec §4.2/§5).
    #[task(priority = 2, shared = [joystick_sample, joystick_zero], local = [joystick_bus])]
    async fn joystick_scan(mut cx: joystick_scan::Context) {
        struct HalBus<'a>(&'a mut hal::i2c::I2c<hal::pac::I2C1>);
        impl BusTransfer for HalBus<'_> {
            fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), BusError> {
                self.0.write(addr, bytes).map_err(|_| BusError::Nack)
            }
            fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<(), BusError> {
                self.0.read(addr, buf).map_err(|_| BusError::Nack)
            }
        }

        /// `stm32-hal2`'s I2C transfers block until the peripheral
        /// completes or NACKs, so by the time `SharedBus::transact` calls
        /// `wait` the transfer has already resolved — there is no separate
        /// completion interrupt left to race against. This always signals
        /// immediately; `BusError::Timeout` stays reachable (and is
        /// exercised against a genuine timeout path) in the host-side
        /// `core::bus` property-9 tests.
        struct BlockingBusNotify;
        impl Notify for BlockingBusNotify {
            fn wait(&mut self, _timeout_ms: u32) -> bool {
                true
            }
        }

        {
            let bus = HalBus(cx.local.joystick_bus);
            let mut bus = SharedBus::new(bus, BlockingBusNotify, 5);
            let _ = joystick::send_config_sequence(&mut bus, || cortex_m::asm::delay(1_700));
        }

        let mut next_wake = Systick::now();
        loop {
            next_wake += MillisDurationU64::from_ticks(5);
            Systick::delay_until(next_wake).await;

            let bus = HalBus(cx.local.joystick_bus);
            let mut bus = SharedBus::new(bus, BlockingBusNotify, 5);
            let zero = cx.shared.joystick_zero.lock(|zero| *zero);
            match joystick::scan_once(&mut bus, || cortex_m::asm::delay(1_700), &zero) {
                Ok(joystick::ScanOutcome::Sample(sample)) => {
                    cx.shared.joystick_sample.lock(|j| *j = sample);
                }
                Ok(joystick::ScanOutcome::CableError) => {
                    let _ = joystick::send_config_sequence(&mut bus, || cortex_m::asm::delay(1_700));
                }
                Err(_) => {}
            }
        }
    }

    /// Touch-panel UART RX: feeds each received byte into the frame parser
    /// and publishes completed samples into [`BALL_BUFFER`] (spec §4.1).
    #[task(binds = USART2, priority = 4, local = [touch_uart, frame_parser])]
    fn touch_rx(cx: touch_rx::Context) {
        while let Ok(byte) = cx.local.touch_uart.read() {
            if let Some(sample) = cx.local.frame_parser.feed(byte) {
                BALL_BUFFER.publish(sample);
            }
        }
    }

    /// Console poll, 10ms cadence: drains USB-CDC RX, runs the line editor,
    /// dispatches completed commands, and flushes any pending telemetry
    /// frame alongside the console's own output (spec §6).
    #[task(
        priority = 1,
        shared = [console, dispatcher, kinematics, actuator, leds, stream_active, forced_mode, telemetry_frame],
        local = [usb_serial, usb_dev, console_tx_buf],
    )]
    async fn console_task(mut cx: console_task::Context) {
        let mut next_wake = Systick::now();
        loop {
            next_wake += MillisDurationU64::from_ticks(10);
            Systick::delay_until(next_wake).await;

            let usb_active = cx.local.usb_dev.poll(&mut [cx.local.usb_serial]);

            if usb_active {
                let mut rx = [0u8; 64];
                if let Ok(count) = cx.local.usb_serial.read(&mut rx) {
                    for &byte in &rx[..count] {
                        let outcome = cx.shared.console.lock(|console| {
                            let mut writer = UsbWriter(cx.local.console_tx_buf);
                            console.feed_byte(byte, &mut writer)
                        });

                        if outcome == PollOutcome::Execute {
                            run_command(&mut cx);
                        }
                    }
                }
            }

            // `stream`'s periodic repeat-fire, per spec §6: re-run the last
            // executed command every `period_ms` until an ESC byte arrives
            // (handled inside `Console::feed_byte` itself).
            let repeat = cx.shared.console.lock(|console| console.tick_stream(10));
            if let Some(entry) = repeat {
                run_command_entry(&mut cx, entry);
            }

            let pending_telemetry = cx.shared.telemetry_frame.lock(|frame| {
                if frame.is_empty() {
                    None
                } else {
                    let taken = frame.clone();
                    frame.clear();
                    Some(taken)
                }
            });
            if let Some(telemetry) = pending_telemetry {
                let _ = cx.local.console_tx_buf.extend_from_slice(&telemetry);
            }

            if !cx.local.console_tx_buf.is_empty() {
                let _ = cx.local.usb_serial.write(cx.local.console_tx_buf);
                cx.local.console_tx_buf.clear();
            }
        }
    }

    /// `heapless`-buffer-backed [`ConsoleWriter`] for both the character
    /// echo path and command-handler output.
    struct UsbWriter<'a>(&'a mut heapless::Vec<u8, 256>);
    impl ConsoleWriter for UsbWriter<'_> {
        fn write(&mut self, bytes: &[u8]) -> usize {
            let mut n = 0;
            for &b in bytes {
                if self.0.push(b).is_err() {
                    break;
                }
                n += 1;
            }
            n
        }
    }

    /// Read argument `index` of the just-committed line as a `u16`, writing
    /// a usage error to `out` and returning `None` if it's missing or isn't
    /// a plain decimal integer.
    fn read_arg_u16(console: &Console, index: u8, out: &mut impl ConsoleWriter) -> Option<u16> {
        let mut buf = [0u8; 8];
        let n = console.arg(index, &mut buf);
        match parse_u16(&buf[..n]) {
            Some(v) => Some(v),
            None => {
                console.print_string("usage: expected a decimal integer argument\r\n", true, out);
                None
            }
        }
    }

    /// Print a signed `i16`, mirroring `CMD_PrintDecimal_S32`: a leading `-`
    /// for negatives, then the unsigned magnitude via [`Console::print_decimal_u32`].
    fn print_signed(console: &Console, value: i16, out: &mut impl ConsoleWriter) {
        if value < 0 {
            out.write(b"-");
        }
        console.print_decimal_u32(value.unsigned_abs() as u32, true, 1, out);
    }

    /// Look up and run the just-committed command line, mirroring
    /// `CMD_Task`'s `CMD_STATE_EXECUTE` handler. Records the matched entry as
    /// the `stream` repeat target, mirroring `Handler_Execute`'s
    /// `s_previous_command` bookkeeping (nulled for commands that must not
    /// themselves be repeated).
    fn run_command(cx: &mut console_task::Context) {
        let entry = cx.shared.console.lock(|console| console.lookup_committed());

        if let Some(entry) = entry {
            run_command_entry(cx, entry);
            let repeatable = !matches!(entry.id, cmd_id::HELP | cmd_id::LOCK | cmd_id::STREAM);
            cx.shared.console.lock(|console| {
                console.set_last_executed(if repeatable { Some(entry) } else { None });
            });
        } else {
            let mut writer = UsbWriter(cx.local.console_tx_buf);
            cx.shared
                .console
                .lock(|console| console.print_string("unrecognized command\r\n", true, &mut writer));
        }

        cx.shared.console.lock(|console| console.command_done());
    }

    /// Run one matched command entry, used both for a freshly committed line
    /// and for `stream`'s periodic repeat-fire.
    fn run_command_entry(cx: &mut console_task::Context, entry: CommandEntry) {
        let mut writer = UsbWriter(cx.local.console_tx_buf);

        match entry.id {
                cmd_id::PID => {
                    cx.shared.forced_mode.lock(|m| *m = Some(ForcedMode::Pid));
                }
                cmd_id::HUMAN => {
                    cx.shared.forced_mode.lock(|m| *m = Some(ForcedMode::Human));
                }
                cmd_id::NNTEST => {
                    cx.shared.forced_mode.lock(|m| *m = Some(ForcedMode::Nn));
                }
                #[cfg(feature = "fuzzy")]
                cmd_id::FUZZY => {
                    cx.shared.forced_mode.lock(|m| *m = Some(ForcedMode::Fuzzy));
                }
                cmd_id::DVBALANCE => {
                    cx.shared.stream_active.lock(|s| *s = !*s);
                }
                cmd_id::PIDK => {
                    let (kp, ki, kd) = cx.shared.console.lock(|console| {
                        let kp = read_arg_u16(console, 1, &mut writer);
                        let ki = read_arg_u16(console, 2, &mut writer);
                        let kd = read_arg_u16(console, 3, &mut writer);
                        (kp, ki, kd)
                    });
                    if let (Some(kp), Some(ki), Some(kd)) = (kp, ki, kd) {
                        cx.shared.dispatcher.lock(|d| {
                            let gains = triplate_core::controllers::pid::PidGains { kp, ki, kd, ..d.pid_gains() };
                            d.set_pid_gains(gains);
                        });
                    }
                }
                cmd_id::KP | cmd_id::KI | cmd_id::KD => {
                    let value = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(value) = value {
                        // Held on the dispatcher, not the active controller,
                        // so the edit survives a later mode cycle and still
                        // takes effect (and confirms) even when Pid isn't
                        // the mode currently running.
                        let (label, new_value) = cx.shared.dispatcher.lock(|d| {
                            let mut gains = d.pid_gains();
                            let (label, new_value) = match entry.id {
                                cmd_id::KP => {
                                    gains.kp = value;
                                    ("Kp: 0x", gains.kp)
                                }
                                cmd_id::KI => {
                                    gains.ki = value;
                                    ("Ki: 0x", gains.ki)
                                }
                                cmd_id::KD => {
                                    gains.kd = value;
                                    ("Kd: 0x", gains.kd)
                                }
                                _ => unreachable!(),
                            };
                            d.set_pid_gains(gains);
                            (label, new_value)
                        });
                        cx.shared.console.lock(|console| {
                            console.print_string(label, true, &mut writer);
                            console.print_hex_u16(new_value, &mut writer);
                            console.print_string("\r\n", true, &mut writer);
                        });
                    }
                }
                cmd_id::HUMANDFS => {
                    let value = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(value) = value {
                        cx.shared.dispatcher.lock(|d| {
                            if let Some(human) = d.human_mut() {
                                human.set_delta_filter_size(value as usize);
                            }
                        });
                    }
                }
                cmd_id::HUMANK | cmd_id::HUMANI => {
                    // Human mode's joystick response and integral-enable
                    // thresholds are fixed constants (see
                    // controllers::human), not runtime-tunable gains — only
                    // the delta filter size (humandfs) is settable.
                    cx.shared.console.lock(|console| {
                        console.print_string(
                            "not tunable: human mode has no runtime gain for this command\r\n",
                            true,
                            &mut writer,
                        )
                    });
                }
                cmd_id::TOUCH => {
                    let ball = BALL_BUFFER.load();
                    cx.shared.console.lock(|console| {
                        console.print_string("ball: detected=", true, &mut writer);
                        console.print_decimal_u32(ball.detected as u32, true, 1, &mut writer);
                        console.print_string(" x=", true, &mut writer);
                        print_signed(console, ball.x, &mut writer);
                        console.print_string(" y=", true, &mut writer);
                        print_signed(console, ball.y, &mut writer);
                        console.print_string("\r\n", true, &mut writer);
                    });
                }
                cmd_id::OSF => {
                    let value = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(value) = value {
                        cx.shared.dispatcher.lock(|d| {
                            let gains = triplate_core::controllers::pid::PidGains { output_scale: value, ..d.pid_gains() };
                            d.set_pid_gains(gains);
                        });
                    }
                }
                cmd_id::DFS => {
                    let value = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(value) = value {
                        cx.shared.dispatcher.lock(|d| {
                            let gains = triplate_core::controllers::pid::PidGains {
                                delta_filter_size: value as usize,
                                ..d.pid_gains()
                            };
                            d.set_pid_gains(gains);
                        });
                    }
                }
                cmd_id::PIDI => {
                    let status = cx.shared.dispatcher.lock(|d| {
                        d.pid_mut().map(|pair| {
                            (
                                pair.x.integral_enabled(),
                                pair.x.error_sum(),
                                pair.y.integral_enabled(),
                                pair.y.error_sum(),
                            )
                        })
                    });
                    if let Some((x_on, x_sum, y_on, y_sum)) = status {
                        cx.shared.console.lock(|console| {
                            console.print_string(
                                if x_on { "X: ON " } else { "X: OFF " },
                                true,
                                &mut writer,
                            );
                            print_signed(console, x_sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16, &mut writer);
                            console.print_string(
                                if y_on { "\r\nY: ON " } else { "\r\nY: OFF " },
                                true,
                                &mut writer,
                            );
                            print_signed(console, y_sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16, &mut writer);
                            console.print_string("\r\n", true, &mut writer);
                        });
                    } else {
                        cx.shared.console.lock(|console| {
                            console.print_string("pid mode is not active\r\n", true, &mut writer)
                        });
                    }
                }
                cmd_id::RESET => {
                    cx.shared
                        .console
                        .lock(|console| console.print_string("resetting\r\n", true, &mut writer));
                    let _ = cx.local.usb_serial.write(cx.local.console_tx_buf);
                    cx.local.console_tx_buf.clear();
                    actuator_disable_then_reset::spawn().ok();
                }
                cmd_id::LED => {
                    let value = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(value) = value {
                        cx.shared.leds.lock(|leds| {
                            if value != 0 {
                                leds.set(triplate_core::led::LedId::Status);
                            } else {
                                leds.clear(triplate_core::led::LedId::Status);
                            }
                        });
                    }
                }
                cmd_id::XY => {
                    let (x, y) = cx.shared.console.lock(|console| {
                        (
                            read_arg_u16(console, 1, &mut writer),
                            read_arg_u16(console, 2, &mut writer),
                        )
                    });
                    if let (Some(x), Some(y)) = (x, y) {
                        let (out_x, out_y) = cx.shared.kinematics.lock(|kinematics| {
                            cx.shared.actuator.lock(|actuator| {
                                kinematics.set_xy(actuator, x as i16, y as i16);
                            });
                            kinematics.get_xy()
                        });
                        cx.shared.console.lock(|console| {
                            console.print_string("X: ", true, &mut writer);
                            print_signed(console, out_x, &mut writer);
                            console.print_string(" Y: ", true, &mut writer);
                            print_signed(console, out_y, &mut writer);
                            console.print_string("\r\n", true, &mut writer);
                        });
                    }
                }
                cmd_id::ABC => {
                    let (a, b, c) = cx.shared.console.lock(|console| {
                        (
                            read_arg_u16(console, 1, &mut writer),
                            read_arg_u16(console, 2, &mut writer),
                            read_arg_u16(console, 3, &mut writer),
                        )
                    });
                    if let (Some(a), Some(b), Some(c)) = (a, b, c) {
                        let (out_a, out_b, out_c) = cx.shared.kinematics.lock(|kinematics| {
                            cx.shared.actuator.lock(|actuator| {
                                kinematics.set_abc(actuator, a as i16, b as i16, c as i16);
                            });
                            kinematics.get_abc()
                        });
                        cx.shared.console.lock(|console| {
                            console.print_string("A: ", true, &mut writer);
                            print_signed(console, out_a, &mut writer);
                            console.print_string(" B: ", true, &mut writer);
                            print_signed(console, out_b, &mut writer);
                            console.print_string(" C: ", true, &mut writer);
                            print_signed(console, out_c, &mut writer);
                            console.print_string("\r\n", true, &mut writer);
                        });
                    }
                }
                cmd_id::SERVO => {
                    let argc = cx.shared.console.lock(|console| console.arg_count());
                    let id = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    let Some(axis) = id.and_then(axis_from_id) else {
                        cx.shared.console.lock(|console| {
                            console.print_string("usage: servo <0|1|2> [angle]\r\n", true, &mut writer)
                        });
                        return;
                    };
                    if argc >= 3 {
                        let angle = cx.shared.console.lock(|console| read_arg_u16(console, 2, &mut writer));
                        if let Some(angle) = angle {
                            cx.shared.kinematics.lock(|kinematics| {
                                cx.shared.actuator.lock(|actuator| {
                                    kinematics.set_axis(actuator, axis, angle as i16);
                                });
                            });
                        }
                    }
                    let value = cx.shared.kinematics.lock(|kinematics| kinematics.axis(axis));
                    cx.shared.console.lock(|console| {
                        console.print_string("servo: ", true, &mut writer);
                        print_signed(console, value, &mut writer);
                        console.print_string("\r\n", true, &mut writer);
                    });
                }
                cmd_id::SERVO_ZERO => {
                    let id = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(axis) = id.and_then(axis_from_id) {
                        cx.shared.kinematics.lock(|kinematics| {
                            cx.shared.actuator.lock(|actuator| {
                                kinematics.set_axis(actuator, axis, 0);
                            });
                        });
                    } else {
                        cx.shared.console.lock(|console| {
                            console.print_string("usage: servo-zero <0|1|2>\r\n", true, &mut writer)
                        });
                    }
                }
                cmd_id::STREAM => {
                    let period = cx.shared.console.lock(|console| read_arg_u16(console, 1, &mut writer));
                    if let Some(period) = period {
                        cx.shared.console.lock(|console| console.start_streaming(period));
                    }
                }
                cmd_id::LOCK => {
                    cx.shared.console.lock(|console| {
                        console.lock();
                        console.print_string("LOCKED\r\n", true, &mut writer);
                    });
                }
                cmd_id::HELP => {
                    for name in [
                        "pid", "pidk", "kp", "ki", "kd", "osf", "dfs", "pidi", "human", "humank",
                        "humandfs", "humani", "nntest", "touch", "dvbalance", "reset", "led",
                        "xy", "abc", "servo", "servo-zero", "stream", "lock", "?",
                    ] {
                        writer.write(name.as_bytes());
                        writer.write(b"\r\n");
                    }
                    #[cfg(feature = "fuzzy")]
                    {
                        writer.write(b"fuzzy");
                        writer.write(b"\r\n");
                    }
                }
                _ => {}
        }
    }

    /// Map a console servo id argument (`0`/`1`/`2`) onto an [`Axis`],
    /// mirroring `servo.c`'s `SERVO_ID_t` validation.
    fn axis_from_id(id: u16) -> Option<Axis> {
        match id {
            0 => Some(Axis::A),
            1 => Some(Axis::B),
            2 => Some(Axis::C),
            _ => None,
        }
    }

    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
