//! Consumes on one connection thread and processes the messages on a pool of worker threads.
//!
//! The connection cannot be shared, so workers send the delivery tags back over a channel and
//! the connection thread acks them between two consume calls. A lost connection is reopened,
//! delivery tags are only valid on the connection they came from. Work and acks are tagged with
//! the session number, leftovers of an earlier session are dropped on both queues.
use anyhow::Result;
use log::{error, info, warn};
use rabbitwire::{Connection, ConnectionOptions, ConsumeResult, Envelope, FieldTable, TableEntry};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

mod config;

fn main() -> Result<()> {
    rabbitwire::setup_logger();

    let (cli, broker) = config::load()?;
    let options = ConnectionOptions::from_url(&broker.url)?;

    let (work_tx, work_rx) = mpsc::channel::<(u32, Envelope)>();
    let (ack_tx, ack_rx) = mpsc::channel::<(u32, u64)>();
    let work_rx = Arc::new(Mutex::new(work_rx));
    let current = Arc::new(AtomicU32::new(0));

    let workers = (0..broker.workers)
        .map(|n| {
            let work_rx = Arc::clone(&work_rx);
            let ack_tx = ack_tx.clone();
            let current = Arc::clone(&current);

            thread::spawn(move || worker(n, work_rx, ack_tx, current))
        })
        .collect::<Vec<_>>();
    drop(ack_tx);

    let mut remaining = cli.count;
    let mut session = 0u32;

    while remaining > 0 {
        session += 1;
        current.store(session, Ordering::SeqCst);

        match consume_session(session, &options, &broker, &work_tx, &ack_rx, &mut remaining) {
            Ok(()) => break,
            Err(e) => {
                warn!("Consuming failed: {e}, reconnecting");
                thread::sleep(Duration::from_secs(1));
            }
        }
    }

    drop(work_tx);

    for w in workers {
        let _ = w.join();
    }

    Ok(())
}

fn consume_session(
    session: u32,
    options: &ConnectionOptions,
    broker: &config::Broker,
    work_tx: &Sender<(u32, Envelope)>,
    ack_rx: &Receiver<(u32, u64)>,
    remaining: &mut u32,
) -> rabbitwire::Result<()> {
    let stale = ack_rx.try_iter().count();
    if stale > 0 {
        info!("Dropped {stale} acks of the previous connection");
    }

    let connection = Connection::open(options)?;
    let channel = connection.open_channel(1)?;

    let queue = channel.queue(&broker.queue);
    queue.declare(false, true, false, false, [TableEntry::new("x-queue-type", "classic")])?;
    queue.bind(&broker.exchange, "#", FieldTable::new())?;

    channel.qos(broker.workers as u16 * 2, 0, false)?;
    queue.consume("", false, false, false, FieldTable::new())?;

    let mut in_flight = 0usize;

    while *remaining > 0 || in_flight > 0 {
        for (from, tag) in ack_rx.try_iter() {
            if from != session {
                // The broker redelivers it on this connection.
                continue;
            }

            channel.ack(tag, false)?;
            in_flight -= 1;
            *remaining = remaining.saturating_sub(1);
        }

        match connection.consume(Duration::from_millis(100))? {
            ConsumeResult::Envelope(envelope) => {
                in_flight += 1;

                if work_tx.send((session, envelope)).is_err() {
                    error!("Workers are gone");
                    return Ok(());
                }
            }
            ConsumeResult::Timeout => (),
            other => info!("Skipping {:?}", other),
        }
    }

    channel.close()?;
    connection.close()
}

fn worker(
    n: usize,
    work_rx: Arc<Mutex<Receiver<(u32, Envelope)>>>,
    ack_tx: Sender<(u32, u64)>,
    current: Arc<AtomicU32>,
) {
    loop {
        let (session, envelope) = match work_rx.lock() {
            Ok(rx) => match rx.recv() {
                Ok(work) => work,
                Err(_) => return,
            },
            Err(_) => return,
        };

        if session != current.load(Ordering::SeqCst) {
            info!("Worker {n} drops delivery {} of a closed connection", envelope.delivery_tag);
            continue;
        }

        info!("Worker {n} got {:?}", envelope.message.body_str());
        thread::sleep(Duration::from_millis(50));

        if ack_tx.send((session, envelope.delivery_tag)).is_err() {
            return;
        }
    }
}
