//! Layer 7 HTTP load balancer.
//!
//! Spreads inbound HTTP requests over a fixed pool of backends with round
//! robin or weighted round robin, retries and fails over transparently, and
//! keeps liveness current with periodic TCP probes.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                  LOAD BALANCER                   │
//!                    │                                                  │
//!   Client Request   │  ┌─────────┐    ┌────────────┐    ┌───────────┐  │
//!   ─────────────────┼─▶│  http   │───▶│  dispatch  │───▶│ forwarder │──┼──▶ Backend
//!                    │  │ server  │    │retry/fail- │    │  (hyper)  │  │
//!   ◀────────────────┼──│         │◀───│   over     │◀───│           │◀─┼───
//!                    │  └─────────┘    └─────┬──────┘    └───────────┘  │
//!                    │                       │ next_peer / mark_down    │
//!                    │                       ▼                          │
//!                    │                ┌──────────────┐                  │
//!                    │   health ─────▶│ backend pool │◀───── stats      │
//!                    │  (TCP probe)   │ rr / wrr     │   (rotating file)│
//!                    │                └──────────────┘                  │
//!                    └──────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use layer7_lb::config::Cli;
use layer7_lb::lifecycle::startup;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = startup::start(cli).await {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}
