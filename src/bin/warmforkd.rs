use anyhow::Result;

fn main() -> Result<()> {
    warmfork::cli::run()
}
