//! seqtape - deterministic event-sequencing trading core.

fn main() -> anyhow::Result<()> {
    seqtape_runner::run()
}
