//! Shared state and inter-task channels
//!
//! Statics reached from more than one task. The command port and switch
//! levels are lock-free; everything else uses embassy-sync primitives.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use trifocus_core::command::CommandPort;
use trifocus_core::kinematics::StepCounts;
use trifocus_drivers::SwitchLevels;
use trifocus_protocol::Reply;

/// Channel capacity for outgoing replies
const REPLY_CHANNEL_SIZE: usize = 8;

/// Commands in, status out, between the foreground and the control tick
pub static PORT: CommandPort = CommandPort::new();

/// Last level of each limit switch (written by the limit tasks)
pub static SWITCH_LEVELS: SwitchLevels = SwitchLevels::new();

/// Positions to persist (raised by the control tick, latest wins)
pub static SAVE_POSITIONS: Signal<CriticalSectionRawMutex, StepCounts> = Signal::new();

/// Reply lines waiting for the UART
pub static REPLY_CHANNEL: Channel<CriticalSectionRawMutex, Reply, REPLY_CHANNEL_SIZE> =
    Channel::new();
