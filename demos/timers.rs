//! Example: a periodic timer next to a one-shot timer
//!
//! Prints a star every second and stops after ten seconds.
//! Run with `RUST_LOG=vigil=trace` to watch the reactor work.

use std::io::{self, Write};
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use vigil::{Reactor, TimerAction};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut reactor = Reactor::new();

    reactor
        .add_timer(Duration::from_secs(1), |_| {
            print!("*");
            let _ = io::stdout().flush();
            TimerAction::Keep
        })
        .unwrap();

    reactor
        .add_timer(Duration::from_secs(10), |r| {
            println!("\n10 seconds");
            r.quit();
            TimerAction::Remove
        })
        .unwrap();

    reactor.run();
}
