fn main() -> anyhow::Result<()> {
    env_logger::init();

    let status = shell_launcher::builder().run(std::env::args().skip(1))?;
    std::process::exit(status);
}
