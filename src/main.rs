mod cli;

fn main() -> anyhow::Result<()> {
    handctl::logging::init();
    cli::run()
}
