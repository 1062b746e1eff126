mod host;
mod http;

fn main() -> anyhow::Result<()> {
    host::run()
}
