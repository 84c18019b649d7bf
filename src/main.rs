fn main() -> anyhow::Result<()> {
    tube_fetch_lib::run()
}
