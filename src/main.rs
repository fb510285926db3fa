fn main() -> anyhow::Result<()> {
    signaid::run()
}
