//! Host command UART tasks
//!
//! The receive task splits the byte stream into lines, parses and
//! dispatches each request, and queues the immediate reply. The transmit
//! task writes queued replies, including completion notices from the
//! notify task.

use defmt::*;
use embassy_rp::uart::{BufferedUartRx, BufferedUartTx};
use embedded_io_async::{Read, Write};

use trifocus_core::command::dispatch;
use trifocus_core::kinematics::MirrorGeometry;
use trifocus_protocol::{LineParser, Reply, Request};

use crate::channels::{PORT, REPLY_CHANNEL};
use crate::stepgen::SharedSteppers;

/// Buffer size for UART receive
const RX_BUF_SIZE: usize = 64;

#[embassy_executor::task]
pub async fn comms_rx_task(
    mut rx: BufferedUartRx,
    geometry: MirrorGeometry,
    default_home_speed: f32,
) {
    info!("Comms RX task started");

    let mut parser = LineParser::new();
    let mut steppers = SharedSteppers;
    let mut buf = [0u8; RX_BUF_SIZE];

    loop {
        let n = match rx.read(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                warn!("UART read error: {:?}", e);
                continue;
            }
        };

        for &byte in &buf[..n] {
            let reply = match parser.feed(byte) {
                Ok(Some(line)) => match Request::parse(&line) {
                    Ok(request) => {
                        trace!("Request: {:?}", request);
                        dispatch(request, &PORT, &mut steppers, &geometry, default_home_speed)
                    }
                    Err(e) => {
                        warn!("Bad request '{}': {:?}", line.as_str(), e);
                        Some(Reply::Error(e.code()))
                    }
                },
                Ok(None) => None,
                Err(e) => {
                    warn!("Line error: {:?}", e);
                    Some(Reply::Error(e.code()))
                }
            };

            if let Some(reply) = reply {
                REPLY_CHANNEL.send(reply).await;
            }
        }
    }
}

#[embassy_executor::task]
pub async fn comms_tx_task(mut tx: BufferedUartTx) {
    info!("Comms TX task started");

    loop {
        let reply = REPLY_CHANNEL.receive().await;

        let Ok(line) = reply.to_line() else {
            warn!("Reply too long to format: {:?}", reply);
            continue;
        };

        if let Err(e) = tx.write_all(line.as_bytes()).await {
            warn!("Failed to send reply: {:?}", e);
            continue;
        }
        if let Err(e) = tx.write_all(b"\r\n").await {
            warn!("Failed to send reply: {:?}", e);
        }
    }
}
