fn main() -> anyhow::Result<()> {
    payment_daybook_lib::run()
}
