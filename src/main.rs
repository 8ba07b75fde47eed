fn main() -> anyhow::Result<()> {
    letterboard::cli::run()
}
