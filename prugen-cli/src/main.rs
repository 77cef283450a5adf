// In the long run this will hopefully become a convenient CLI command for
// exercising a generator device through whichever platform backends grow
// real implementations (UIO, /dev/mem, remoteproc). For now though it's
// just a small test bed that drives the library crate against its
// simulated firmware and allocator.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use prugen::dma::fake::Allocator;
use prugen::interface::fake::Firmware;
use prugen::waiter::BoundedWaiter;
use prugen::{Session, SessionState, Signal, StreamWrite};

#[derive(Parser)]
#[command(about = "Run a simulated waveform-generation session")]
struct Args {
    /// Allocation unit per ring buffer, in bytes.
    #[arg(long, default_value_t = 4096)]
    unit_size: usize,

    /// Total ring capacity to request, in bytes.
    #[arg(long, default_value_t = 16384)]
    total_size: usize,

    /// Number of sample bytes to stream before stopping.
    #[arg(long, default_value_t = 65536)]
    stream_bytes: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut session =
        Session::new(Allocator::new(), Firmware::new()).context("probing the device")?;
    let (major, minor) = session.firmware_version();
    println!(
        "firmware {}.{}, address table holds {} entries",
        major,
        minor,
        session.max_table_entries()
    );

    session
        .set_unit_size(args.unit_size)
        .context("setting the allocation unit")?;
    session
        .set_total_size(args.total_size)
        .context("sizing the buffer ring")?;
    println!(
        "ring of {} buffers, {} bytes total",
        session.buffers().len(),
        session.total_size()
    );
    for buf in session.buffers() {
        println!("  buffer {}: {} bytes", buf.index(), buf.len());
    }

    let mut cursor = session.start().context("starting generation")?;
    info!("session running");

    // A ramp pattern, chunked the way a caller with a pipe would write it.
    let chunk: Vec<u8> = (0..997).map(|i| (i % 251) as u8).collect();
    let mut streamed = 0;
    'feed: while streamed < args.stream_bytes {
        let mut span = &chunk[..chunk.len().min(args.stream_bytes - streamed)];
        while !span.is_empty() {
            match session.write(&mut cursor, span).context("streaming samples")? {
                StreamWrite::Written(n) => {
                    streamed += n;
                    span = &span[n..];
                }
                StreamWrite::EndOfSession => break 'feed,
            }
        }
    }
    println!("streamed {} bytes, cursor at {:?}", streamed, cursor);

    session.request_stop().context("requesting stop")?;

    // The simulated firmware has no interrupt line, so stand in for the
    // platform glue and deliver the completion by hand.
    session.handle_signal(Signal::Completion);

    let mut waiter = BoundedWaiter::new(1000);
    let status = session.status().clone();
    match status.wait_idle(&mut waiter) {
        Ok(SessionState::Initialized) => println!("session complete"),
        Ok(other) => bail!("session ended in state {:?}", other),
        Err(_) => bail!("timed out waiting for the session to wind down"),
    }
    println!("last error code: {}", status.last_error());

    Ok(())
}
