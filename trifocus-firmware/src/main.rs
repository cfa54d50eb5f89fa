//! Trifocus - Primary Mirror Stage Firmware
//!
//! Drives the three actuators of a tip/tilt/focus mirror cell from an
//! RP2040 board (pin map below is the SKR Pico's X/Y/Z drivers).
//!
//! Step pulses and home switches run on the highest-priority interrupt
//! executor, the control tick on the next one down, and host comms,
//! flash writes and outputs in thread mode.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::UART0;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_time::Duration;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use trifocus_core::kinematics::Actuator;
use trifocus_core::motion::StageController;
use trifocus_core::persistence::PositionStore;
use trifocus_drivers::{DriverEnable, Fan, LimitSwitch, PulseStepper, StageSteppers, SwitchPolarity};
use trifocus_hal_rp2040::Rp2040FlashStorage;

use crate::channels::PORT;

mod channels;
mod config;
mod stepgen;
mod tasks;

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

/// DIR polarity per actuator (A, B, C); flip one if it homes away from its switch
const INVERT_DIR: [bool; 3] = [false, false, false];

/// Fan PWM wrap value, 25 kHz at the default 125 MHz system clock
const FAN_PWM_TOP: u16 = 4999;

// Static cells for UART buffers (must live forever)
static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

static EXECUTOR_STEP: InterruptExecutor = InterruptExecutor::new();
static EXECUTOR_TICK: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_0() {
    EXECUTOR_STEP.on_interrupt()
}

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_TICK.on_interrupt()
}

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Trifocus firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Configuration and the saved position share the flash partition
    let mut store = PositionStore::new(Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0));
    let config = config::load_stage_config(store.storage_mut()).await;
    let restored = config::load_positions(&mut store, &config.persistence).await;

    let geometry = config.geometry.mirror();
    let default_home_speed = config.homing.default_speed_steps_per_sec;
    let tick_period = Duration::from_micros(u64::from(config.motion.tick_period_us));

    // Step/dir outputs (SKR Pico: X=11/10, Y=6/5, Z=19/28)
    let mut steppers = StageSteppers::new([
        PulseStepper::new(
            Output::new(p.PIN_11, Level::Low),
            Output::new(p.PIN_10, Level::Low),
            INVERT_DIR[0],
        ),
        PulseStepper::new(
            Output::new(p.PIN_6, Level::Low),
            Output::new(p.PIN_5, Level::Low),
            INVERT_DIR[1],
        ),
        PulseStepper::new(
            Output::new(p.PIN_19, Level::Low),
            Output::new(p.PIN_28, Level::Low),
            INVERT_DIR[2],
        ),
    ]);

    let controller = StageController::new(config, restored, &mut steppers);
    stepgen::install(steppers);
    info!("Pulse steppers initialized");

    // Driver enables, active low (SKR Pico: X=12, Y=7, Z=2)
    let enables = [
        DriverEnable::new(Output::new(p.PIN_12, Level::High), true).unwrap_or_else(|e| match e {}),
        DriverEnable::new(Output::new(p.PIN_7, Level::High), true).unwrap_or_else(|e| match e {}),
        DriverEnable::new(Output::new(p.PIN_2, Level::High), true).unwrap_or_else(|e| match e {}),
    ];
    PORT.enable_steppers(true);

    // Home switches, closed to ground (SKR Pico: X-STOP=4, Y-STOP=3, Z-STOP=25)
    let switches = [
        LimitSwitch::new(Input::new(p.PIN_4, Pull::Up), SwitchPolarity::ActiveLow),
        LimitSwitch::new(Input::new(p.PIN_3, Pull::Up), SwitchPolarity::ActiveLow),
        LimitSwitch::new(Input::new(p.PIN_25, Pull::Up), SwitchPolarity::ActiveLow),
    ];

    // Host command link
    let uart_config = UartConfig::default(); // 115200 baud default

    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);

    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, uart_config);
    let uart = uart.into_buffered(Irqs, tx_buf, rx_buf);
    let (tx, rx) = uart.split();

    info!("UART initialized for host commands");

    // Cooling fan on FAN1 (GPIO17, PWM slice 0 channel B)
    let mut pwm_config = PwmConfig::default();
    pwm_config.top = FAN_PWM_TOP;
    let (_, fan_out) = Pwm::new_output_b(p.PWM_SLICE0, p.PIN_17, pwm_config).split();
    let fan = match fan_out.map(Fan::new) {
        Some(Ok(fan)) => Some(fan),
        Some(Err(_)) | None => {
            warn!("Fan output unavailable");
            None
        }
    };

    // Step generation and limit handling preempt everything else
    interrupt::SWI_IRQ_0.set_priority(Priority::P1);
    let step_spawner = EXECUTOR_STEP.start(interrupt::SWI_IRQ_0);
    step_spawner.spawn(tasks::step_task()).unwrap();
    for (actuator, switch) in Actuator::ALL.into_iter().zip(switches) {
        step_spawner.spawn(tasks::limit_task(actuator, switch)).unwrap();
    }

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let tick_spawner = EXECUTOR_TICK.start(interrupt::SWI_IRQ_1);
    tick_spawner
        .spawn(tasks::tick_task(controller, tick_period))
        .unwrap();

    spawner.spawn(tasks::persistence_task(store)).unwrap();
    spawner
        .spawn(tasks::comms_rx_task(rx, geometry, default_home_speed))
        .unwrap();
    spawner.spawn(tasks::comms_tx_task(tx)).unwrap();
    spawner.spawn(tasks::notify_task(enables, fan)).unwrap();
    spawner.spawn(tasks::status_task()).unwrap();

    info!("All tasks spawned, firmware running");

    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}
