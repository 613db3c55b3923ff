use condsql::telemetry;

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();
    condsql::run_translate(std::io::stdin().lock(), std::io::stdout().lock())
}
